//! Key set invariant checks.
//!
//! Validation is a pure walk over an in-memory document. Each entry is checked
//! against every rule independently and every [`Violation`] is collected in
//! document order; [`KeySetValidator::first_violation`] stops at the first one.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;

use derive_more::Display;

use crate::constants::KEY_TYPE;
use crate::jwk::{rsa_public_key, Field, JwkRecord, KeySet, KeySetDocument, SigningAlgorithm};
use crate::kid::KeyIdentifier;
use crate::settings::Settings;

/// The invariant a [`Violation`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rule {
    #[display("`{_0}` property not found")]
    MissingField(&'static str),
    #[display("`{_0}` value is null")]
    NullField(&'static str),
    #[display("kid has an invalid format")]
    InvalidKidFormat,
    #[display("kid postfix is not a valid date")]
    InvalidKidDate,
    #[display("kid is used by more than one key")]
    DuplicateKid,
    #[display("kid version is older than an earlier key of the same scope")]
    OutOfOrderVersion,
    #[display("kty value is invalid")]
    WrongKeyType,
    #[display("alg value is invalid")]
    WrongAlgorithm,
    #[display("cannot construct public key from `e` and `n`")]
    UnconstructiblePublicKey,
}

/// What a [`Violation`] is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Document,
    /// Entry at `index` in `keys`, named by its `kid` when it has a string one.
    Key { index: usize, kid: Option<String> },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document-level"),
            Self::Key {
                kid: Some(kid), ..
            } => write!(f, "key `{}`", kid),
            Self::Key { index, kid: None } => write!(f, "key #{}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub subject: Subject,
    pub rule: Rule,
}

impl Violation {
    /// The offending `kid`, if the violation is about a key that has one.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        match &self.subject {
            Subject::Key { kid, .. } => kid.as_deref(),
            Subject::Document => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.rule)
    }
}

/// Checks key sets against the structural and semantic invariants of the
/// configured signing algorithm.
#[derive(Debug, Clone, Copy)]
pub struct KeySetValidator {
    algorithm: SigningAlgorithm,
}

impl KeySetValidator {
    #[must_use]
    pub fn new(algorithm: SigningAlgorithm) -> Self {
        Self { algorithm }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.keyset.algorithm)
    }

    /// Reports every violation in `set`.
    ///
    /// # Errors
    ///
    /// Returns all violations, in document order, when any invariant is broken.
    pub fn validate(&self, set: &KeySet) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        let _ = self.walk_keys(set.keys(), &mut |violation| {
            violations.push(violation);
            ControlFlow::Continue(())
        });
        into_result(violations)
    }

    /// Like [`KeySetValidator::validate`], but also reports a missing or `null`
    /// `keys` collection as a document-level violation.
    ///
    /// # Errors
    ///
    /// Returns all violations when any invariant is broken.
    pub fn validate_document(&self, document: &KeySetDocument) -> Result<(), Vec<Violation>> {
        let keys = match &document.keys {
            Field::Present(keys) => keys,
            Field::Missing => return Err(vec![document_violation(Rule::MissingField("keys"))]),
            Field::Null => return Err(vec![document_violation(Rule::NullField("keys"))]),
        };

        let mut violations = Vec::new();
        let _ = self.walk_keys(keys, &mut |violation| {
            violations.push(violation);
            ControlFlow::Continue(())
        });
        into_result(violations)
    }

    /// Returns the first violation in `set`, without checking the rest.
    #[must_use]
    pub fn first_violation(&self, set: &KeySet) -> Option<Violation> {
        let mut first = None;
        let _ = self.walk_keys(set.keys(), &mut |violation| {
            first = Some(violation);
            ControlFlow::Break(())
        });
        first
    }

    fn walk_keys(
        &self,
        keys: &[JwkRecord],
        sink: &mut dyn FnMut(Violation) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for kid in keys.iter().filter_map(JwkRecord::kid) {
            *occurrences.entry(kid).or_default() += 1;
        }

        let mut latest_by_scope: HashMap<String, u32> = HashMap::new();

        for (index, record) in keys.iter().enumerate() {
            let subject = Subject::Key {
                index,
                kid: record.kid().map(str::to_string),
            };
            let mut report = |rule: Rule| {
                sink(Violation {
                    subject: subject.clone(),
                    rule,
                })
            };

            match &record.kid {
                Field::Missing => report(Rule::MissingField("kid"))?,
                Field::Null => report(Rule::NullField("kid"))?,
                Field::Present(raw) => {
                    match KeyIdentifier::parse(raw) {
                        Err(_) => report(Rule::InvalidKidFormat)?,
                        Ok(kid) => {
                            if kid.version_date().is_err() {
                                report(Rule::InvalidKidDate)?;
                            }
                            let latest = latest_by_scope.entry(kid.scope().to_string()).or_default();
                            if kid.version() < *latest {
                                report(Rule::OutOfOrderVersion)?;
                            }
                            *latest = (*latest).max(kid.version());
                        }
                    }
                    if occurrences.get(raw.as_str()).copied().unwrap_or_default() > 1 {
                        report(Rule::DuplicateKid)?;
                    }
                }
            }

            check_exact(&record.kty, "kty", KEY_TYPE, Rule::WrongKeyType, &mut report)?;
            check_exact(
                &record.alg,
                "alg",
                self.algorithm.as_str(),
                Rule::WrongAlgorithm,
                &mut report,
            )?;
            check_present(&record.e, "e", &mut report)?;
            check_present(&record.n, "n", &mut report)?;

            if let (Field::Present(e), Field::Present(n)) = (&record.e, &record.n) {
                if rsa_public_key(e, n).is_err() {
                    report(Rule::UnconstructiblePublicKey)?;
                }
            }
        }

        ControlFlow::Continue(())
    }
}

fn document_violation(rule: Rule) -> Violation {
    Violation {
        subject: Subject::Document,
        rule,
    }
}

fn into_result(violations: Vec<Violation>) -> Result<(), Vec<Violation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_present(
    field: &Field<String>,
    name: &'static str,
    report: &mut impl FnMut(Rule) -> ControlFlow<()>,
) -> ControlFlow<()> {
    match field {
        Field::Missing => report(Rule::MissingField(name)),
        Field::Null => report(Rule::NullField(name)),
        Field::Present(_) => ControlFlow::Continue(()),
    }
}

fn check_exact(
    field: &Field<String>,
    name: &'static str,
    expected: &str,
    wrong: Rule,
    report: &mut impl FnMut(Rule) -> ControlFlow<()>,
) -> ControlFlow<()> {
    match field {
        Field::Present(value) if value != expected => report(wrong),
        _ => check_present(field, name, report),
    }
}
