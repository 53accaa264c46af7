use ponzi_core::{ConfigError, ErrorKind, StockError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Command(_) => 2,
            Self::Config(_) => 3,
            Self::Stock(error) => match error.kind() {
                ErrorKind::BadRequest => 2,
                ErrorKind::Cancelled => 130,
                ErrorKind::CacheIo => 10,
                _ => 1,
            },
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_errors_map_by_kind() {
        assert_eq!(
            CliError::from(StockError::bad_request("bad symbol")).exit_code(),
            2
        );
        assert_eq!(CliError::from(StockError::upstream("500")).exit_code(), 1);
        assert_eq!(CliError::from(StockError::cancelled()).exit_code(), 130);
    }

    #[test]
    fn validation_errors_are_usage_errors() {
        assert_eq!(
            CliError::from(ValidationError::EmptySymbol).exit_code(),
            2
        );
    }
}
