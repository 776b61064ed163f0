//! Errors returned by cached services.

use layercache_core::CacheError;
use thiserror::Error;

/// Error from an entity service or the cache in front of it.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The underlying service failed.
    #[error("Entity service error: {reason}")]
    Backend { reason: String },

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ServiceError {
    pub fn backend(reason: impl ToString) -> Self {
        Self::Backend {
            reason: reason.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServiceError::NotFound {
            entity_type: "supplier".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "supplier 42 not found");

        let err: ServiceError = CacheError::LockPoisoned.into();
        assert!(err.to_string().starts_with("Cache error"));
    }
}
