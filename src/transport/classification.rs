//! Fault classification for HTTP responses and transport errors.

use serde::{Deserialize, Serialize};

/// How an attempt's result is classified before any policy sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Transient,
    NonTransient,
}

/// Which response statuses count as transient.
///
/// The default mirrors the usual "transient HTTP error" definition: every 5xx
/// plus 408 Request Timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientStatuses {
    /// Treat every 5xx as transient.
    pub server_errors: bool,
    /// Additional statuses treated as transient (e.g. 408, 429).
    pub codes: Vec<u16>,
}

impl Default for TransientStatuses {
    fn default() -> Self {
        Self {
            server_errors: true,
            codes: vec![408],
        }
    }
}

impl TransientStatuses {
    pub fn with_code(mut self, code: u16) -> Self {
        if !self.codes.contains(&code) {
            self.codes.push(code);
        }
        self
    }

    pub fn is_transient(&self, status: u16) -> bool {
        (self.server_errors && (500..=599).contains(&status)) || self.codes.contains(&status)
    }

    pub fn classify(&self, status: u16) -> StatusClass {
        if self.is_transient(status) {
            StatusClass::Transient
        } else if (200..=399).contains(&status) {
            StatusClass::Success
        } else {
            StatusClass::NonTransient
        }
    }
}

/// Network-level failures (connect, timeout, reset mid-body) are transient;
/// requests that could never have been sent are not.
pub(crate) fn is_transient_reqwest_error(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() {
        return false;
    }
    true
}
