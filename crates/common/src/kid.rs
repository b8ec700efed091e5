//! Key identifier policy.
//!
//! A key identifier (`kid`) is an owner scope followed by an eight digit date
//! version, e.g. `example-python-flask-20180101`. Within a key set every `kid`
//! is unique and, per scope, versions only ever move forward.

use std::fmt;

use chrono::{NaiveDate, Utc};
use error_stack::Report;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{KID_PATTERN, KID_VERSION_SUFFIX_LEN};
use crate::error::KeySetError;

static KID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(KID_PATTERN).expect("kid pattern should be a valid regex"));

/// A key identifier whose shape has been checked against [`KID_PATTERN`].
///
/// The date postfix is *not* checked by [`KeyIdentifier::parse`]; use
/// [`KeyIdentifier::parse_dated`] or [`KeyIdentifier::version_date`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyIdentifier {
    raw: String,
    version: u32,
}

impl KeyIdentifier {
    /// Parses the shape of a candidate identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::InvalidFormat`] unless `candidate` matches [`KID_PATTERN`].
    pub fn parse(candidate: &str) -> Result<Self, Report<KeySetError>> {
        if !KID_REGEX.is_match(candidate) {
            return Err(Report::new(KeySetError::InvalidFormat {
                kid: candidate.to_string(),
            }));
        }

        // The pattern guarantees an ASCII string ending in eight digits.
        let suffix = &candidate[candidate.len() - (KID_VERSION_SUFFIX_LEN - 1)..];
        let version = suffix.parse::<u32>().map_err(|_| {
            Report::new(KeySetError::InvalidFormat {
                kid: candidate.to_string(),
            })
        })?;

        Ok(Self {
            raw: candidate.to_string(),
            version,
        })
    }

    /// Parses a candidate and requires its postfix to be a real calendar date.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::InvalidFormat`] or [`KeySetError::InvalidDate`].
    pub fn parse_dated(candidate: &str) -> Result<Self, Report<KeySetError>> {
        let kid = Self::parse(candidate)?;
        kid.version_date()?;
        Ok(kid)
    }

    /// Builds the identifier for `scope` versioned at `date`.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::InvalidFormat`] if the scope contains characters
    /// outside `[a-zA-Z0-9-]` or is empty.
    pub fn for_date(scope: &str, date: NaiveDate) -> Result<Self, Report<KeySetError>> {
        Self::parse(&format!("{}-{}", scope, date.format("%Y%m%d")))
    }

    /// Builds the identifier for `scope` versioned at today's UTC date.
    ///
    /// # Errors
    ///
    /// See [`KeyIdentifier::for_date`].
    pub fn for_today(scope: &str) -> Result<Self, Report<KeySetError>> {
        Self::for_date(scope, Utc::now().date_naive())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Owner scope, i.e. everything before the `-YYYYMMDD` postfix.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.raw[..self.raw.len() - KID_VERSION_SUFFIX_LEN]
    }

    /// Numeric value of the eight digit postfix.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Interprets the version postfix as a calendar date.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::InvalidDate`] if the postfix is not a real `YYYYMMDD` date.
    pub fn version_date(&self) -> Result<NaiveDate, Report<KeySetError>> {
        let year = (self.version / 10_000) as i32;
        let month = (self.version / 100) % 100;
        let day = self.version % 100;

        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            Report::new(KeySetError::InvalidDate {
                kid: self.raw.clone(),
            })
        })
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Free-function form of [`KeyIdentifier::version_date`].
///
/// # Errors
///
/// Returns [`KeySetError::InvalidDate`] if the postfix is not a real calendar date.
pub fn parse_version_date(kid: &KeyIdentifier) -> Result<NaiveDate, Report<KeySetError>> {
    kid.version_date()
}

/// Checks that `candidate` may join a set already holding `existing`.
///
/// An identifier equal to an existing one is a collision and reported as
/// [`KeySetError::DuplicateIdentifier`]; one whose version does not exceed every
/// version already present in its scope is [`KeySetError::NonIncrementalVersion`].
/// Scopes without prior entries accept any version.
///
/// # Errors
///
/// See above.
pub fn check_successor<'a, I>(candidate: &KeyIdentifier, existing: I) -> Result<(), Report<KeySetError>>
where
    I: IntoIterator<Item = &'a KeyIdentifier>,
{
    let mut latest: Option<&KeyIdentifier> = None;

    for kid in existing {
        if kid == candidate {
            return Err(Report::new(KeySetError::DuplicateIdentifier {
                kid: candidate.to_string(),
            }));
        }
        if kid.scope() == candidate.scope() && latest.is_none_or(|l| kid.version() > l.version()) {
            latest = Some(kid);
        }
    }

    match latest {
        Some(latest) if latest.version() >= candidate.version() => {
            Err(Report::new(KeySetError::NonIncrementalVersion {
                kid: candidate.to_string(),
                scope: candidate.scope().to_string(),
                latest: latest.to_string(),
            }))
        }
        _ => Ok(()),
    }
}

/// Returns `true` iff `candidate` is new and strictly newer than every
/// identifier sharing its scope.
pub fn is_successor<'a, I>(candidate: &KeyIdentifier, existing: I) -> bool
where
    I: IntoIterator<Item = &'a KeyIdentifier>,
{
    check_successor(candidate, existing).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kid(s: &str) -> KeyIdentifier {
        KeyIdentifier::parse(s).expect("test kid should parse")
    }

    #[test]
    fn test_parse_accepts_scoped_identifiers() {
        let id = kid("example-python-flask-20180101");
        assert_eq!(id.scope(), "example-python-flask");
        assert_eq!(id.version(), 20_180_101);
        assert_eq!(id.as_str(), "example-python-flask-20180101");
    }

    #[test]
    fn test_parse_rejects_malformed_identifiers() {
        for candidate in [
            "",
            "20180101",
            "-20180101",
            "svc20180101",
            "svc-2018010",
            "svc-201801011",
            "svc_name-20180101",
            "svc-2018-01-01",
            "svc-20180101\n",
            " svc-20180101",
            "svc-２０１８０１０１",
        ] {
            let err = KeyIdentifier::parse(candidate).expect_err(candidate);
            assert!(
                matches!(err.current_context(), KeySetError::InvalidFormat { .. }),
                "{candidate:?} should be an invalid format"
            );
        }
    }

    #[test]
    fn test_version_date_rejects_impossible_dates() {
        for candidate in ["svc-20180230", "svc-20181301", "svc-20180000", "svc-20190229"] {
            let err = kid(candidate).version_date().expect_err(candidate);
            assert!(matches!(
                err.current_context(),
                KeySetError::InvalidDate { .. }
            ));
        }
    }

    #[test]
    fn test_version_date_accepts_leap_day() {
        let date = parse_version_date(&kid("svc-20200229")).expect("leap day is a real date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 2, 29).expect("valid date"));
    }

    #[test]
    fn test_parse_dated_reports_date_errors() {
        let err = KeyIdentifier::parse_dated("svc-20180230").expect_err("invalid date");
        assert!(matches!(
            err.current_context(),
            KeySetError::InvalidDate { .. }
        ));
        assert!(KeyIdentifier::parse_dated("svc-20180228").is_ok());
    }

    #[test]
    fn test_successor_rules() {
        let existing = [kid("a-20180101"), kid("a-20180601")];

        assert!(!is_successor(&kid("a-20180601"), &existing));
        assert!(!is_successor(&kid("a-20171231"), &existing));
        assert!(!is_successor(&kid("a-20180301"), &existing));
        assert!(is_successor(&kid("a-20180701"), &existing));
        assert!(is_successor(&kid("b-20170101"), &existing));
    }

    #[test]
    fn test_collision_is_not_an_ordering_violation() {
        let existing = [kid("a-20180101"), kid("a-20180601")];

        let err = check_successor(&kid("a-20180601"), &existing).expect_err("duplicate");
        assert!(matches!(
            err.current_context(),
            KeySetError::DuplicateIdentifier { .. }
        ));

        let err = check_successor(&kid("a-20171231"), &existing).expect_err("older");
        match err.current_context() {
            KeySetError::NonIncrementalVersion { scope, latest, .. } => {
                assert_eq!(scope, "a");
                assert_eq!(latest, "a-20180601");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scopes_sharing_a_prefix_are_independent() {
        let existing = [kid("svc-extra-20200101")];
        assert!(is_successor(&kid("svc-20190101"), &existing));
    }

    #[test]
    fn test_empty_set_accepts_anything_well_formed() {
        let existing: [KeyIdentifier; 0] = [];
        assert!(is_successor(&kid("svc-20180101"), &existing));
    }

    #[test]
    fn test_for_date_formats_postfix() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date");
        let id = KeyIdentifier::for_date("billing", date).expect("valid scope");
        assert_eq!(id.as_str(), "billing-20240307");

        assert!(KeyIdentifier::for_date("bad scope", date).is_err());
        assert!(KeyIdentifier::for_date("", date).is_err());
    }
}
