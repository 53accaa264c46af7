use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Validation errors raised while parsing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid range '{value}', expected one of 1d, 2y")]
    InvalidRange { value: String },
    #[error("unknown quote source '{value}'")]
    UnknownSource { value: String },
}

/// Error classification shared by the fetcher, caches, planner and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid symbol, unsupported range or missing field. No I/O was done.
    BadRequest,
    /// Non-2xx status or transport failure talking to the upstream.
    Upstream,
    /// Upstream or transport payload could not be decoded.
    MalformedResponse,
    /// A date or time field could not be parsed.
    MalformedDate,
    /// The upstream omitted a requested symbol.
    NotFound,
    /// Reading or writing a cache snapshot failed.
    CacheIo,
    /// The call was cancelled before it completed.
    Cancelled,
}

impl ErrorKind {
    pub const ALL: [Self; 7] = [
        Self::BadRequest,
        Self::Upstream,
        Self::MalformedResponse,
        Self::MalformedDate,
        Self::NotFound,
        Self::CacheIo,
        Self::Cancelled,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest => "stock.bad_request",
            Self::Upstream => "stock.upstream",
            Self::MalformedResponse => "stock.malformed_response",
            Self::MalformedDate => "stock.malformed_date",
            Self::NotFound => "stock.not_found",
            Self::CacheIo => "stock.cache_io",
            Self::Cancelled => "stock.cancelled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

/// Structured error returned by every core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockError {
    kind: ErrorKind,
    message: String,
}

impl StockError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn malformed_date(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDate, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn cache_io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CacheIo, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Display for StockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for StockError {}

impl From<ValidationError> for StockError {
    fn from(value: ValidationError) -> Self {
        Self::bad_request(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_round_trip_through_from_code() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("stock.unknown"), None);
    }

    #[test]
    fn validation_errors_become_bad_requests() {
        let error = StockError::from(ValidationError::EmptySymbol);
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.to_string(), "symbol cannot be empty (stock.bad_request)");
    }
}
