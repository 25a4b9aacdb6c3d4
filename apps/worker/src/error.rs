//! Error handling for the Cadence worker
//!
//! A single thiserror hierarchy covers every stage of a playlist run. Each
//! variant knows whether it is retryable, how loudly it should be logged and
//! which pipeline stage raised it.

use cadence_catalog_client::CatalogError;
use cadence_shared_config::ConfigError;
use thiserror::Error;
use uuid::Uuid;

/// Main worker error type
#[derive(Error, Debug)]
pub enum WorkerError {
    // ========== Pipeline Errors ==========
    /// A source playlist could not be read (recovered by the aggregator)
    #[error("failed to fetch source playlist '{playlist_id}': {reason}")]
    SourceFetch { playlist_id: String, reason: String },

    /// An attribute batch lookup failed (recovered by the resolver)
    #[error("attribute lookup failed for {batch_size} ids: {reason}")]
    AttributeLookup { batch_size: usize, reason: String },

    /// Credentials could not be refreshed or validated
    #[error("credentials unusable for user '{user_id}': {reason}")]
    Credential { user_id: String, reason: String },

    /// Replacing or appending playlist contents failed
    #[error("failed to publish playlist '{playlist_id}': {reason}")]
    Publish { playlist_id: String, reason: String },

    /// The playlist description could not be updated
    #[error("failed to update description of playlist '{playlist_id}': {reason}")]
    DescriptionUpdate { playlist_id: String, reason: String },

    /// A source fetch or catalog call exceeded its time budget
    #[error("operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    // ========== Data Access Errors ==========
    /// No job with the requested id exists
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    /// No stored token for the job owner
    #[error("no stored token for user '{0}'")]
    TokenNotFound(String),

    /// Stored job data is malformed
    #[error("invalid job data: {0}")]
    InvalidJobData(String),

    /// Database query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored JSON column could not be decoded
    #[error("job deserialization failed: {0}")]
    JobDeserialization(#[from] serde_json::Error),

    // ========== External Service Errors ==========
    /// Catalog call failed outside a more specific stage
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== On-demand Errors ==========
    /// A single on-demand job run failed
    #[error("job {job_id} failed: {source}")]
    JobFailed {
        job_id: Uuid,
        #[source]
        source: Box<WorkerError>,
    },

    // ========== Internal Errors ==========
    /// Internal worker error (catch-all for unexpected errors)
    #[error("internal worker error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::Timeout { .. } | Self::SourceFetch { .. } => true,
            Self::Catalog(err) => err.is_retryable(),
            Self::JobFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Critical errors that should alert operators
            Self::Configuration(_) | Self::InvalidJobData(_) | Self::JobDeserialization(_) => {
                ErrorSeverity::Critical
            }

            // Errors that abort a job run
            Self::Credential { .. }
            | Self::Publish { .. }
            | Self::Database(_)
            | Self::TokenNotFound(_)
            | Self::Internal(_) => ErrorSeverity::Error,

            Self::JobFailed { source, .. } => source.severity(),

            // Recovered or best-effort failures
            Self::SourceFetch { .. }
            | Self::AttributeLookup { .. }
            | Self::DescriptionUpdate { .. }
            | Self::Timeout { .. }
            | Self::Catalog(_) => ErrorSeverity::Warning,

            Self::JobNotFound(_) => ErrorSeverity::Info,
        }
    }

    /// Pipeline stage this error belongs to, if applicable
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::SourceFetch { .. } | Self::Timeout { .. } => Some("aggregate"),
            Self::AttributeLookup { .. } => Some("resolve"),
            Self::Credential { .. } | Self::TokenNotFound(_) => Some("credentials"),
            Self::Publish { .. } => Some("publish"),
            Self::DescriptionUpdate { .. } => Some("description"),
            Self::JobFailed { source, .. } => source.stage(),
            _ => None,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        let stage = self.stage().unwrap_or("general");
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(
                    error = %self,
                    stage = stage,
                    retryable = self.is_retryable(),
                    "Critical worker error"
                );
            }
            ErrorSeverity::Error => {
                tracing::error!(
                    error = %self,
                    stage = stage,
                    retryable = self.is_retryable(),
                    "Worker error"
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error = %self,
                    stage = stage,
                    retryable = self.is_retryable(),
                    "Worker warning"
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error = %self,
                    stage = stage,
                    retryable = self.is_retryable(),
                    "Worker info"
                );
            }
        }
    }

    /// Create a source fetch error
    pub fn source_fetch(playlist_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceFetch {
            playlist_id: playlist_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a credential error
    pub fn credential(user_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Credential {
            user_id: user_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a publish error
    pub fn publish(playlist_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Publish {
            playlist_id: playlist_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a description update error
    pub fn description_update(playlist_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::DescriptionUpdate {
            playlist_id: playlist_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an error raised while running a single job on demand
    pub fn job_failed(job_id: Uuid, source: WorkerError) -> Self {
        Self::JobFailed {
            job_id,
            source: Box::new(source),
        }
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

// ========== Conversion Implementations ==========

impl From<ConfigError> for WorkerError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<WorkerError>() {
            Ok(worker_err) => worker_err,
            Err(err) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(WorkerError::Timeout { seconds: 30 }.is_retryable());
        assert!(WorkerError::source_fetch("p1", "boom").is_retryable());
        assert!(WorkerError::Catalog(CatalogError::Timeout).is_retryable());
        assert!(!WorkerError::Catalog(CatalogError::NotFound("gone".into())).is_retryable());
        assert!(!WorkerError::credential("u1", "revoked").is_retryable());
        assert!(!WorkerError::JobNotFound(Uuid::nil()).is_retryable());
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(
            WorkerError::Configuration("bad".into()).severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(
            WorkerError::publish("p1", "500").severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            WorkerError::description_update("p1", "403").severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            WorkerError::JobNotFound(Uuid::nil()).severity(),
            ErrorSeverity::Info
        );
    }

    #[test]
    fn test_stage() {
        assert_eq!(WorkerError::source_fetch("p", "x").stage(), Some("aggregate"));
        assert_eq!(WorkerError::credential("u", "x").stage(), Some("credentials"));
        assert_eq!(WorkerError::publish("p", "x").stage(), Some("publish"));
        assert_eq!(WorkerError::Internal("x".into()).stage(), None);
    }

    #[test]
    fn test_job_failed_delegates_to_source() {
        let id = Uuid::new_v4();
        let err = WorkerError::job_failed(id, WorkerError::publish("target", "server error"));

        assert_eq!(err.stage(), Some("publish"));
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert_eq!(
            err.to_string(),
            format!(
                "job {} failed: failed to publish playlist 'target': server error",
                id
            )
        );
    }

    #[test]
    fn test_anyhow_downcast() {
        let anyhow_err = anyhow::Error::new(WorkerError::TokenNotFound("u1".into()));
        let worker_err: WorkerError = anyhow_err.into();
        assert!(matches!(worker_err, WorkerError::TokenNotFound(user) if user == "u1"));

        let other: WorkerError = anyhow::anyhow!("unexpected").into();
        assert!(matches!(other, WorkerError::Internal(_)));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: WorkerError = ConfigError::MissingEnvVar("DATABASE_URL".into()).into();
        assert!(matches!(err, WorkerError::Configuration(_)));
    }
}
