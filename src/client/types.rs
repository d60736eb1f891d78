use serde::Serialize;

/// Per-invocation facts, reported whether the call succeeded or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub client: String,
    /// Underlying attempts made; zero when the call failed before any attempt.
    pub attempts: u32,
    pub duration_ms: u128,
    /// Status of the settling response, when there was one.
    pub http_status: Option<u16>,
    pub cancelled: bool,
}

impl CallStats {
    /// Retries performed beyond the first attempt.
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}
