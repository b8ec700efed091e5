use thiserror::Error;

use crate::constants::KID_PATTERN;

#[derive(Error, Debug)]
pub enum KeySetError {
    #[error("invalid kid `{kid}`: format must match regex {}", KID_PATTERN)]
    InvalidFormat { kid: String },

    #[error("invalid kid `{kid}`: version postfix must be a valid YYYYMMDD date")]
    InvalidDate { kid: String },

    #[error("invalid kid `{kid}`: kid is already in use")]
    DuplicateIdentifier { kid: String },

    #[error(
        "invalid kid `{kid}`: version postfix must be incremental, scope `{scope}` is already at {latest}"
    )]
    NonIncrementalVersion {
        kid: String,
        scope: String,
        latest: String,
    },

    #[error("key set document is corrupt: {message}")]
    CorruptDocument { message: String },

    #[error("key set document `{path}` could not be read")]
    DocumentUnreadable { path: String },

    #[error("key set violates its invariants: {first}")]
    InvalidKeySet { first: String },

    #[error("key generation failed: {message}")]
    KeyGeneration { message: String },

    #[error("keypair for `{kid}` failed the sign/verify round trip")]
    SigningMismatch { kid: String },

    #[error("failed to persist key set to `{path}`")]
    PersistFailure { path: String },

    #[error("key set `{path}` changed since it was loaded (expected {expected}, found {found})")]
    ConcurrentModification {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl KeySetError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptDocument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_name_the_identifier() {
        let err = KeySetError::DuplicateIdentifier {
            kid: "svc-20180101".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid kid `svc-20180101`: kid is already in use"
        );

        let err = KeySetError::NonIncrementalVersion {
            kid: "svc-20171231".into(),
            scope: "svc".into(),
            latest: "svc-20180101".into(),
        };
        assert!(err.to_string().contains("must be incremental"));
        assert!(err.to_string().contains("svc-20180101"));
    }

    #[test]
    fn test_invalid_format_mentions_pattern() {
        let err = KeySetError::InvalidFormat { kid: "nope".into() };
        assert!(err.to_string().contains(KID_PATTERN));
    }
}
