use std::path::PathBuf;

/// Configuration problems. All of these surface before the first request is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("trait matrix dimension {index} is empty")]
    EmptyTraitDimension { index: usize },

    #[error("temperature {value} is outside the supported range [0.0, 2.0]")]
    TemperatureOutOfRange { value: f64 },

    #[error("unknown rubric '{name}'")]
    UnknownRubric { name: String },

    #[error("duplicate candidate name '{name}'")]
    DuplicateCandidate { name: String },

    #[error("candidate name '{name}' is reserved for the judge reply")]
    ReservedCandidateName { name: String },

    #[error("duplicate scenario name '{name}'")]
    DuplicateScenario { name: String },

    #[error("suite defines no candidates")]
    NoCandidates,

    #[error("suite defines no scenarios")]
    NoScenarios,

    #[error("threshold {value} is outside [0, 10]")]
    InvalidThreshold { value: f64 },

    #[error("trait composition failed for variant '{variant}': {message}")]
    Composer { variant: String, message: String },

    #[error("failed to read suite file {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to parse suite YAML: {message}")]
    Parse { message: String },

    #[error("unsupported suite version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// Non-success HTTP status.
    Status,
    /// Body was not the JSON we expected.
    MalformedBody,
    /// Body parsed but carried no assistant content.
    MissingContent,
    Timeout,
    /// Connection-level failure before a status was received.
    Transport,
}

impl RequestErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestErrorKind::Status => "status",
            RequestErrorKind::MalformedBody => "malformed_body",
            RequestErrorKind::MissingContent => "missing_content",
            RequestErrorKind::Timeout => "timeout",
            RequestErrorKind::Transport => "transport",
        }
    }
}

/// The single failure kind a chat-completion call can produce.
///
/// Callers branch on `kind` when they need to; everything user-visible goes
/// through `message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub provider: Option<String>,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            provider: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn status(provider: &str, status: u16, body: &str) -> Self {
        Self::new(
            RequestErrorKind::Status,
            format!("{} API error (status {}): {}", provider, status, body),
        )
        .with_status(status)
        .with_provider(provider)
    }

    pub fn malformed_body(provider: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            RequestErrorKind::MalformedBody,
            format!("{} API returned a malformed body: {}", provider, detail),
        )
        .with_provider(provider)
    }

    pub fn missing_content(provider: &str) -> Self {
        Self::new(
            RequestErrorKind::MissingContent,
            format!("{} API response missing content", provider),
        )
        .with_provider(provider)
    }

    pub fn timeout(provider: &str, seconds: u64) -> Self {
        Self::new(
            RequestErrorKind::Timeout,
            format!("{} request timed out after {}s", provider, seconds),
        )
        .with_provider(provider)
    }

    pub fn transport(provider: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            RequestErrorKind::Transport,
            format!("{} request failed: {}", provider, detail),
        )
        .with_provider(provider)
    }
}
