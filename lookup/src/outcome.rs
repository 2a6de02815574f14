use tracing::warn;

use crate::errors::LookupError;

/// Result of an external lookup.
///
/// Callers collapse `NotFound` and `Unavailable` into the same "no data" value,
/// but the distinction is kept here so it can be logged.
#[derive(Debug)]
pub enum LookupOutcome<T> {
    Found(T),
    NotFound,
    Unavailable(LookupError),
}

impl<T> LookupOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Drop the failure detail, keeping only the data
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LookupOutcome<U> {
        match self {
            Self::Found(value) => LookupOutcome::Found(f(value)),
            Self::NotFound => LookupOutcome::NotFound,
            Self::Unavailable(e) => LookupOutcome::Unavailable(e),
        }
    }

    /// Log a failed outcome under `source` and return the data, if any
    pub fn log_failure(self, source: &str) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => {
                warn!(source, "Lookup returned no data");
                None
            }
            Self::Unavailable(e) => {
                warn!(source, error = %e, "Lookup upstream unavailable");
                None
            }
        }
    }
}

impl<T> From<Result<T, LookupError>> for LookupOutcome<T> {
    fn from(result: Result<T, LookupError>) -> Self {
        match result {
            Ok(value) => Self::Found(value),
            Err(e) => Self::Unavailable(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_variant() {
        assert_eq!(LookupOutcome::Found(2).map(|v| v * 2).found(), Some(4));
        assert!(matches!(
            LookupOutcome::<i32>::NotFound.map(|v| v * 2),
            LookupOutcome::NotFound
        ));
        let unavailable: LookupOutcome<i32> =
            LookupOutcome::Unavailable(LookupError::malformed("bad"));
        assert!(matches!(
            unavailable.map(|v| v + 1),
            LookupOutcome::Unavailable(LookupError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_failures_collapse_to_none() {
        assert_eq!(LookupOutcome::<u8>::NotFound.log_failure("test"), None);
        assert_eq!(
            LookupOutcome::<u8>::Unavailable(LookupError::Incomplete("job".into()))
                .log_failure("test"),
            None
        );
        assert_eq!(LookupOutcome::Found(7u8).log_failure("test"), Some(7));
    }

    #[test]
    fn test_from_result() {
        let ok: LookupOutcome<u8> = Ok(1).into();
        assert!(ok.is_found());
        let err: LookupOutcome<u8> = Err(LookupError::malformed("x")).into();
        assert!(!err.is_found());
    }
}
