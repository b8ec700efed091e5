//! Durable storage of the key set document.
//!
//! The repository is the only writer of the document. Writes are whole-file
//! replacements through a temporary file and a rename, guarded by a revision
//! check so that a concurrent registration cannot be silently lost.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::KeySetError;
use crate::jwk::{KeySet, KeySetDocument};
use crate::settings::Settings;

/// Content hash of a key set document as it was read or written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Computes the revision of document bytes, in the format `sha256:<hex>`.
    ///
    /// Line endings are normalized to LF first.
    #[must_use]
    pub fn of(content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(format!("sha256:{}", hex::encode(hasher.finalize())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key set together with the revision it was loaded at.
#[derive(Debug, Clone)]
pub struct LoadedKeySet {
    pub set: KeySet,
    pub revision: Revision,
}

#[derive(Debug, Clone)]
pub struct KeySetRepository {
    path: PathBuf,
}

impl KeySetRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.keyset.path.clone())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw document, tolerating a missing or `null` `keys` member.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::DocumentUnreadable`] if the file cannot be read and
    /// [`KeySetError::CorruptDocument`] if it is not a JSON object of the right shape.
    pub fn read_document(&self) -> Result<(KeySetDocument, Revision), Report<KeySetError>> {
        let bytes = fs::read(&self.path).change_context(KeySetError::DocumentUnreadable {
            path: self.display_path(),
        })?;
        let content = String::from_utf8(bytes)
            .change_context(KeySetError::corrupt("document is not valid UTF-8"))
            .attach(format!("while reading `{}`", self.path.display()))?;

        let document = KeySetDocument::from_json(&content)
            .attach(format!("while reading `{}`", self.path.display()))?;

        Ok((document, Revision::of(&content)))
    }

    /// Loads the key set.
    ///
    /// # Errors
    ///
    /// As [`KeySetRepository::read_document`], and [`KeySetError::CorruptDocument`]
    /// if the document has no `keys` collection.
    pub fn load(&self) -> Result<LoadedKeySet, Report<KeySetError>> {
        let (document, revision) = self.read_document()?;
        let set = document
            .into_key_set()
            .attach(format!("while reading `{}`", self.path.display()))?;

        log::debug!(
            "Loaded {} key(s) from {} at {}",
            set.len(),
            self.path.display(),
            revision
        );

        Ok(LoadedKeySet { set, revision })
    }

    /// Replaces the document with `set`, provided it is still at `expected`.
    ///
    /// Returns the revision of the newly written document.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::ConcurrentModification`] if the document changed
    /// since it was loaded, and [`KeySetError::PersistFailure`] if it cannot be
    /// written. In both cases the document on disk is left as it was.
    pub fn persist(
        &self,
        set: &KeySet,
        expected: &Revision,
    ) -> Result<Revision, Report<KeySetError>> {
        let current = match fs::read_to_string(&self.path) {
            Ok(content) => Revision::of(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Revision("<missing>".into()),
            Err(e) => {
                return Err(Report::new(e).change_context(self.persist_failure()));
            }
        };

        if &current != expected {
            return Err(Report::new(KeySetError::ConcurrentModification {
                path: self.display_path(),
                expected: expected.to_string(),
                found: current.to_string(),
            }));
        }

        let content = to_pretty_json(set)?;
        self.replace(&content)?;

        let revision = Revision::of(&content);
        log::info!(
            "Persisted {} key(s) to {} at {}",
            set.len(),
            self.path.display(),
            revision
        );
        Ok(revision)
    }

    /// Writes `set` as a brand new document.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::PersistFailure`] if the document already exists or
    /// cannot be written.
    pub fn create(&self, set: &KeySet) -> Result<Revision, Report<KeySetError>> {
        let content = to_pretty_json(set)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .change_context_lazy(|| self.persist_failure())?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .change_context_lazy(|| self.persist_failure())?;

        log::info!("Created key set {}", self.path.display());
        Ok(Revision::of(&content))
    }

    fn replace(&self, content: &str) -> Result<(), Report<KeySetError>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)
            .change_context_lazy(|| self.persist_failure())
            .attach("while creating a temporary file")?;

        // Readers of the published key set must keep their access.
        if let Ok(metadata) = fs::metadata(&self.path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .change_context_lazy(|| self.persist_failure())?;
        }

        temp.write_all(content.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .change_context_lazy(|| self.persist_failure())
            .attach("while writing the temporary file")?;

        temp.persist(&self.path)
            .map_err(|e| Report::new(e.error))
            .change_context_lazy(|| self.persist_failure())
            .attach("while renaming the temporary file")?;

        Ok(())
    }

    fn persist_failure(&self) -> KeySetError {
        KeySetError::PersistFailure {
            path: self.display_path(),
        }
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Serializes a key set with four-space indentation and a trailing newline.
///
/// # Errors
///
/// Returns [`KeySetError::PersistFailure`] if serialization fails.
pub fn to_pretty_json(set: &KeySet) -> Result<String, Report<KeySetError>> {
    let document = set.to_document();
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    document
        .serialize(&mut serializer)
        .change_context(KeySetError::PersistFailure {
            path: "<memory>".into(),
        })?;

    let mut json = String::from_utf8(buffer).change_context(KeySetError::PersistFailure {
        path: "<memory>".into(),
    })?;
    json.push('\n');
    Ok(json)
}
