//! Failures of the individual pipeline stages.
use {
    crate::BoxError,
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// The queried URL could not be retrieved.
#[derive(Debug)]
pub struct FetchError {
    /// The URL that was requested.
    pub url: String,

    /// What went wrong.
    pub reason: String,

    /// The underlying error, if any.
    pub source: Option<BoxError>,
}

impl FetchError {
    /// Create a new `FetchError` without an underlying cause.
    pub fn new<U: Display, R: Into<String>>(url: U, reason: R) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a new `FetchError` wrapping an underlying cause.
    pub fn with_source<U, R, E>(url: U, reason: R, source: E) -> Self
    where
        U: Display,
        R: Into<String>,
        E: Into<BoxError>,
    {
        Self {
            url: url.to_string(),
            reason: reason.into(),
            source: Some(source.into()),
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Failed to fetch {}: {}", self.url, self.reason)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// The fetched content could not be interpreted as an NFe consultation page.
#[derive(Debug)]
pub struct ParseError {
    /// The URL the content was fetched from.
    pub url: String,

    /// What could not be extracted.
    pub reason: String,
}

impl ParseError {
    /// Create a new `ParseError`.
    pub fn new<U: Display, R: Into<String>>(url: U, reason: R) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Failed to parse NFe from {}: {}", self.url, self.reason)
    }
}

impl Error for ParseError {}

/// The extracted data could not be delivered downstream.
#[derive(Debug)]
pub struct PublishError {
    /// Where the message was being sent.
    pub destination: String,

    /// The underlying error.
    pub source: BoxError,
}

impl PublishError {
    /// Create a new `PublishError` for the given destination.
    pub fn new<D: Into<String>, E: Into<BoxError>>(destination: D, source: E) -> Self {
        Self {
            destination: destination.into(),
            source: source.into(),
        }
    }
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Failed to publish to {}: {}", self.destination, self.source)
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref() as &(dyn Error + 'static))
    }
}

/// Failure of a single record's fetch → extract → publish run.
#[derive(Debug)]
pub enum NfeError {
    /// The document could not be fetched.
    Fetch(FetchError),

    /// The document could not be parsed.
    Parse(ParseError),

    /// The extracted data could not be published.
    Publish(PublishError),

    /// Anything else, such as a panic inside a collaborator.
    Unexpected(String),
}

impl NfeError {
    /// Short name of the stage that failed, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            NfeError::Fetch(_) => "FetchError",
            NfeError::Parse(_) => "ParseError",
            NfeError::Publish(_) => "PublishError",
            NfeError::Unexpected(_) => "Unexpected",
        }
    }
}

impl Display for NfeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NfeError::Fetch(e) => Display::fmt(e, f),
            NfeError::Parse(e) => Display::fmt(e, f),
            NfeError::Publish(e) => Display::fmt(e, f),
            NfeError::Unexpected(message) => write!(f, "Unexpected failure: {message}"),
        }
    }
}

impl Error for NfeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NfeError::Fetch(e) => Some(e),
            NfeError::Parse(e) => Some(e),
            NfeError::Publish(e) => Some(e),
            NfeError::Unexpected(_) => None,
        }
    }
}

impl From<FetchError> for NfeError {
    fn from(e: FetchError) -> Self {
        NfeError::Fetch(e)
    }
}

impl From<ParseError> for NfeError {
    fn from(e: ParseError) -> Self {
        NfeError::Parse(e)
    }
}

impl From<PublishError> for NfeError {
    fn from(e: PublishError) -> Self {
        NfeError::Publish(e)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{FetchError, NfeError, ParseError},
        std::error::Error,
    };

    #[test]
    fn fetch_error_display_includes_cause() {
        let e = FetchError::with_source("https://example.com/a", "request failed", "connection refused");
        assert_eq!(e.to_string(), "Failed to fetch https://example.com/a: request failed: connection refused");
        assert!(e.source().is_some());
    }

    #[test]
    fn nfe_error_kind_and_source() {
        let e: NfeError = ParseError::new("https://example.com/a", "access key not found").into();
        assert_eq!(e.kind(), "ParseError");
        assert_eq!(e.to_string(), "Failed to parse NFe from https://example.com/a: access key not found");
        assert!(e.source().is_some());

        let e = NfeError::Unexpected("boom".to_string());
        assert!(e.source().is_none());
    }
}
