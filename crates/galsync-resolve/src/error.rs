use galsync_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("authentication rejected by {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ResolveError {
    /// Errors that must abort the whole run instead of degrading to an
    /// empty result.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResolveError::Auth(_) | ResolveError::Config(_) | ResolveError::Core(CoreError::Config(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Collaborator boundary: non-fatal failures become `T::default()` with a
/// warning, fatal ones propagate.
pub fn degrade<T: Default>(result: Result<T>, context: &str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "{context} failed, treating as empty");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ResolveError::Auth("api".into()).is_fatal());
        assert!(ResolveError::Config("missing token".into()).is_fatal());
        assert!(!ResolveError::ApiError("api".into(), "HTTP 500".into()).is_fatal());
        assert!(!ResolveError::Parse("bad".into()).is_fatal());
    }

    #[test]
    fn test_degrade_swallows_transient_errors() {
        let r: Result<Vec<u32>> = Err(ResolveError::ApiError("api".into(), "down".into()));
        assert_eq!(degrade(r, "search").unwrap(), Vec::<u32>::new());

        let r: Result<Vec<u32>> = Err(ResolveError::Auth("api".into()));
        assert!(degrade(r, "search").is_err());

        let r: Result<Vec<u32>> = Ok(vec![1]);
        assert_eq!(degrade(r, "search").unwrap(), vec![1]);
    }
}
