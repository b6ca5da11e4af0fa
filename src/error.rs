//! Error types for the quota engine.
use std::fmt;
use std::time::Duration;

/// Unified error type for configuration, lookup, and back-end failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    /// Lookup fell through every fallback: no bucket serves the identity.
    NoSuchBucket { namespace: String, name: String },
    /// The back-end refused the request by policy.
    Rejected { reason: String },
    /// Tokens could not be made available within the caller's wait budget.
    TimedOut { namespace: String, name: String, max_wait: Duration },
    /// Configuration failed validation at load time.
    InvalidConfig { reason: String },
    /// Unclassified back-end failure.
    Backend { message: String },
}

impl fmt::Display for QuotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchBucket { namespace, name } => {
                write!(f, "no bucket serves {}:{}", namespace, name)
            }
            Self::Rejected { reason } => write!(f, "request rejected: {}", reason),
            Self::TimedOut { namespace, name, max_wait } => {
                write!(
                    f,
                    "tokens not available from {}:{} within {:?}",
                    namespace, name, max_wait
                )
            }
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {}", reason),
            Self::Backend { message } => write!(f, "back-end failure: {}", message),
        }
    }
}

impl std::error::Error for QuotaError {}

impl QuotaError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig { reason: reason.into() }
    }

    /// Check if this error is a failed lookup.
    pub fn is_no_such_bucket(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. })
    }

    /// Check if this error is a policy rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Check if this error is an exhausted wait budget.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Check if this error is a configuration problem.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error is an unclassified back-end failure.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_identity() {
        let err = QuotaError::NoSuchBucket { namespace: "ns".into(), name: "b".into() };
        assert!(format!("{}", err).contains("ns:b"));
    }

    #[test]
    fn timed_out_display_includes_budget() {
        let err = QuotaError::TimedOut {
            namespace: "ns".into(),
            name: "b".into(),
            max_wait: Duration::from_millis(5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ns:b"));
        assert!(msg.contains("5ms"));
    }

    #[test]
    fn predicates_cover_all_variants() {
        assert!(QuotaError::NoSuchBucket { namespace: "n".into(), name: "b".into() }
            .is_no_such_bucket());
        assert!(QuotaError::Rejected { reason: "policy".into() }.is_rejected());
        assert!(QuotaError::TimedOut {
            namespace: "n".into(),
            name: "b".into(),
            max_wait: Duration::ZERO
        }
        .is_timed_out());
        assert!(QuotaError::invalid_config("bad").is_invalid_config());
        assert!(QuotaError::Backend { message: "io".into() }.is_backend());
    }
}
