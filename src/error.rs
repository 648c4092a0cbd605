//! Unified error type.

use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error a handler returns when it cannot produce a response.
///
/// This is what the tracing layers record on the server span as
/// `exception.message`. Expected outcomes (404, 422, etc.) belong in the
/// [`Response`](crate::Response), not here.
#[derive(Debug)]
pub struct Error(BoxError);

impl Error {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Self::new(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_inner_message() {
        let err = Error::from(std::io::Error::other("disk on fire"));
        assert_eq!(err.to_string(), "disk on fire");

        assert_eq!(Error::msg("boom").to_string(), "boom");
    }
}
