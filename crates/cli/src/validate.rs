//! Key set validation command.

use std::io::Write;

use keyset_common::repository::KeySetRepository;
use keyset_common::settings::Settings;
use keyset_common::validation::KeySetValidator;

use crate::error::CliError;

/// Validates the configured key set, writing one line per violation to `out`.
pub fn validate(settings: &Settings, out: &mut impl Write) -> Result<(), CliError> {
    let repository = KeySetRepository::from_settings(settings);
    let (document, revision) = repository.read_document()?;
    log::debug!("Validating {} at {}", repository.path().display(), revision);

    match KeySetValidator::from_settings(settings).validate_document(&document) {
        Ok(()) => {
            log::info!("{} is valid", repository.path().display());
            Ok(())
        }
        Err(violations) => {
            for violation in &violations {
                writeln!(out, "{}", violation)?;
            }
            Err(CliError::InvalidKeySet {
                path: repository.path().display().to_string(),
                count: violations.len(),
            })
        }
    }
}
