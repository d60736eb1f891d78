//! Demo forecast service.
//!
//! Each request makes one outbound call through the `primary` client. With the
//! standard chain that call retries transient failures forever, so a request
//! only returns once the upstream answers.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::client::ClientRegistry;
use crate::transport::{HttpRequest, HttpResponse};
use crate::Result;

pub const PRIMARY_CLIENT: &str = "primary";
pub const FORECAST_DAYS: usize = 5;

const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherForecast {
    /// Days from today, starting at 1.
    pub day_offset: u32,
    pub temperature_c: i32,
    pub temperature_f: i32,
    pub summary: String,
}

impl WeatherForecast {
    pub fn new(day_offset: u32, temperature_c: i32, summary: impl Into<String>) -> Self {
        Self {
            day_offset,
            temperature_c,
            temperature_f: 32 + (temperature_c as f64 / 0.5556) as i32,
            summary: summary.into(),
        }
    }
}

/// Serves forecasts after one policy-wrapped call to the upstream.
#[derive(Debug, Clone)]
pub struct ForecastService {
    registry: ClientRegistry,
    client: String,
}

impl ForecastService {
    pub fn new(registry: ClientRegistry) -> Self {
        Self {
            registry,
            client: PRIMARY_CLIENT.to_string(),
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Five forecasts, returned once the upstream call settles successfully.
    ///
    /// Faults that settle the call (non-transient responses, cancellation,
    /// a failing hook, an unknown client) are returned to the caller.
    pub async fn get(&self) -> Result<Vec<WeatherForecast>> {
        let response = self
            .registry
            .invoke(&self.client, HttpRequest::get(""))
            .await?;
        Ok(self.serve(&response))
    }

    /// Like [`get`](Self::get), but settles as `Cancelled` after `deadline`.
    pub async fn get_with_deadline(&self, deadline: Duration) -> Result<Vec<WeatherForecast>> {
        let response = self
            .registry
            .invoke_with_deadline(&self.client, HttpRequest::get(""), deadline)
            .await?;
        Ok(self.serve(&response))
    }

    fn serve(&self, response: &HttpResponse) -> Vec<WeatherForecast> {
        info!(
            client = self.client.as_str(),
            http_status = response.status,
            bytes = response.body.len(),
            "upstream reachable, serving forecast"
        );
        forecasts_for_body(&response.body)
    }
}

/// Forecasts seeded by an upstream response body.
pub fn forecasts_for_body(body: &[u8]) -> Vec<WeatherForecast> {
    forecasts_from_seed(seed_of(body))
}

/// Derive the forecasts from `seed`; equal seeds give equal forecasts.
pub fn forecasts_from_seed(seed: u64) -> Vec<WeatherForecast> {
    let mut state = seed;
    (1..=FORECAST_DAYS as u32)
        .map(|day| {
            state = splitmix64(state);
            let temperature_c = (state % 75) as i32 - 20;
            let summary = SUMMARIES[((state >> 32) % SUMMARIES.len() as u64) as usize];
            WeatherForecast::new(day, temperature_c, summary)
        })
        .collect()
}

fn seed_of(body: &[u8]) -> u64 {
    // FNV-1a
    body.iter().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ *b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_records_in_range() {
        let forecasts = forecasts_from_seed(42);
        assert_eq!(forecasts.len(), FORECAST_DAYS);
        for (i, f) in forecasts.iter().enumerate() {
            assert_eq!(f.day_offset, i as u32 + 1);
            assert!((-20..55).contains(&f.temperature_c));
            assert!(SUMMARIES.contains(&f.summary.as_str()));
        }
    }

    #[test]
    fn same_seed_same_forecast() {
        assert_eq!(forecasts_from_seed(7), forecasts_from_seed(7));
        assert_ne!(forecasts_from_seed(7), forecasts_from_seed(8));
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(WeatherForecast::new(1, 0, "Cool").temperature_f, 32);
        assert_eq!(WeatherForecast::new(1, 100, "Hot").temperature_f, 211);
    }
}
