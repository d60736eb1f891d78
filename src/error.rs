use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "clients[0].base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "http_transport", "config_loader")
    pub source: Option<String>,
    /// HTTP status of the response that produced the error, if any
    pub status_code: Option<u16>,
    /// Client-generated request id of the attempt that failed
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Unified error type.
///
/// The first five variants are the fault taxonomy a policy chain reasons about.
/// `Cancelled`, `CallbackFault` and `UnknownClient` are terminal: no policy ever
/// treats them as a retry trigger.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transient fault: {message}{}", format_context(.context))]
    TransientFault {
        message: String,
        context: ErrorContext,
    },

    #[error("Non-transient fault: {message}{}", format_context(.context))]
    NonTransient {
        message: String,
        context: ErrorContext,
    },

    #[error("Unknown client: '{name}' is not registered")]
    UnknownClient { name: String },

    #[error("Invocation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("Policy hook '{hook}' failed on attempt {attempt}: {message}")]
    CallbackFault {
        hook: String,
        attempt: u32,
        message: String,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn transient(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::TransientFault {
            message: msg.into(),
            context,
        }
    }

    pub fn non_transient(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::NonTransient {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// True for faults expected to clear on their own (network, timeout, 5xx).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientFault { .. })
    }

    /// Terminal errors settle the invocation no matter what a policy's
    /// classifier says about them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::Cancelled { .. } | Error::CallbackFault { .. } | Error::UnknownClient { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// HTTP status carried by the error, when it came from a response.
    pub fn status_code(&self) -> Option<u16> {
        self.context().and_then(|c| c.status_code)
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::TransientFault { context, .. }
            | Error::NonTransient { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}
