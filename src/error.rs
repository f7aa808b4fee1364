//! Error taxonomy for the review pipeline.
//!
//! Only configuration, input validation, and the remote workflow path can
//! fail. The rule engine, mask engine, segmenter, normalizer, and aggregator
//! are pure transformations and degrade instead of erroring.

/// Errors surfaced by the review pipeline and remote workflow client.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// A required setting (endpoint, API key) is missing. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote workflow endpoint could not be reached. Not auto-retried.
    #[error("network error reaching remote workflow: {reason} ({hint})")]
    Network {
        /// Underlying transport failure.
        reason: String,
        /// Diagnostic hint shown to the caller.
        hint: String,
    },

    /// The remote workflow answered with a non-2xx status. Remaining
    /// segments are not sent.
    #[error("remote workflow rejected request: HTTP {status}: {body}")]
    RemoteRejection {
        /// HTTP status code.
        status: u16,
        /// Response body text, as returned.
        body: String,
    },

    /// A payload failed to parse where degradation is not possible.
    #[error("failed to parse {what}: {detail}")]
    Parse {
        /// What was being parsed (response envelope, stored blob, ...).
        what: String,
        /// Parser diagnostic.
        detail: String,
    },

    /// A required request field was empty or missing. Rejected before any
    /// analysis runs.
    #[error("invalid input: {0}")]
    Input(String),
}
