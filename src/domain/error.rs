//! Domain error types.

/// Top-level error type for fundingscope.
#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid parameter {key}: {reason}")]
    Configuration { key: String, reason: String },

    #[error("inconsistent data: {reason}")]
    InconsistentData { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unsupported coin: {symbol}")]
    UnsupportedCoin { symbol: String },

    #[error("unknown event: {name}")]
    UnknownEvent { name: String },

    #[error("no funding data for {coin}")]
    NoData { coin: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FundingError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        FundingError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn configuration(key: &str, reason: impl Into<String>) -> Self {
        FundingError::Configuration {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&FundingError> for std::process::ExitCode {
    fn from(err: &FundingError) -> Self {
        let code: u8 = match err {
            FundingError::Io(_) | FundingError::DataSource { .. } => 1,
            FundingError::Configuration { .. }
            | FundingError::ConfigParse { .. }
            | FundingError::ConfigMissing { .. }
            | FundingError::ConfigInvalid { .. } => 2,
            FundingError::InvalidInput { .. } | FundingError::InconsistentData { .. } => 3,
            FundingError::UnsupportedCoin { .. }
            | FundingError::UnknownEvent { .. }
            | FundingError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
