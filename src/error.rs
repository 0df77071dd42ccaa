use thiserror::Error;

/// Result alias for fallible `rankmap` operations.
pub type Result<T> = std::result::Result<T, RankError>;

/// Errors raised while configuring a [`RankMap`](crate::RankMap).
///
/// Queries never fail: a missing key or score is reported as `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("unknown stamp source `{0}` (expected `sequence` or `wall-clock`)")]
    UnknownStampSource(String),

    #[error("invalid value `{value}` for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("rank map indexes disagree: {0}")]
    Inconsistent(String),
}
