//! Key registration and identifier commands.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::NaiveDate;
use keyset_common::jwk::KeySet;
use keyset_common::kid::{check_successor, KeyIdentifier};
use keyset_common::repository::KeySetRepository;
use keyset_common::settings::Settings;
use keyset_common::workflow::Registrar;
use serde::Serialize;

use crate::error::CliError;
use crate::ListFormat;

/// Registers `kid` and writes the private key PEM to `out`.
pub fn register(settings: &Settings, kid: &str, out: &mut impl Write) -> Result<(), CliError> {
    let registration = Registrar::from_settings(settings).register(kid)?;

    log::info!(
        "Registered {} in {} at {}",
        registration.jwk,
        settings.keyset.path.display(),
        registration.revision
    );
    out.write_all(registration.private_key_pem.as_bytes())?;
    out.flush()?;

    Ok(())
}

/// Creates an empty key set at the configured path.
pub fn init(settings: &Settings, out: &mut impl Write) -> Result<(), CliError> {
    let repository = KeySetRepository::from_settings(settings);
    let revision = repository.create(&KeySet::default())?;

    writeln!(out, "Created empty key set at {}", repository.path().display())?;
    log::debug!("Initial revision: {}", revision);

    Ok(())
}

#[derive(Debug, Serialize)]
struct ListedKey {
    kid: String,
    date: Option<String>,
}

/// Lists well-formed identifiers grouped by scope, oldest version first.
pub fn list(settings: &Settings, format: ListFormat, out: &mut impl Write) -> Result<(), CliError> {
    let loaded = KeySetRepository::from_settings(settings).load()?;

    let mut scopes: BTreeMap<String, Vec<KeyIdentifier>> = BTreeMap::new();
    for kid in loaded.set.identifiers() {
        scopes.entry(kid.scope().to_string()).or_default().push(kid);
    }

    let skipped = loaded.set.len() - scopes.values().map(Vec::len).sum::<usize>();
    if skipped > 0 {
        log::warn!("Skipped {} key(s) without a well-formed kid", skipped);
    }

    let listed: BTreeMap<String, Vec<ListedKey>> = scopes
        .into_iter()
        .map(|(scope, mut kids)| {
            kids.sort_by_key(KeyIdentifier::version);
            let keys = kids
                .iter()
                .map(|kid| ListedKey {
                    kid: kid.to_string(),
                    date: kid
                        .version_date()
                        .ok()
                        .map(|date| date.format("%Y-%m-%d").to_string()),
                })
                .collect();
            (scope, keys)
        })
        .collect();

    match format {
        ListFormat::Text => {
            for (scope, keys) in &listed {
                writeln!(out, "{}", scope)?;
                for key in keys {
                    let date = key.date.as_deref().unwrap_or("invalid date");
                    writeln!(out, "  {}  {}", key.kid, date)?;
                }
            }
        }
        ListFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &listed)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

/// Prints `scope-YYYYMMDD` for `date` (today, UTC, by default) if it would be
/// accepted by `register`.
pub fn suggest(
    settings: &Settings,
    scope: &str,
    date: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let kid = match date {
        Some(date) => KeyIdentifier::for_date(scope, parse_date(date)?)?,
        None => KeyIdentifier::for_today(scope)?,
    };

    let loaded = KeySetRepository::from_settings(settings).load()?;
    let existing: Vec<KeyIdentifier> = loaded.set.identifiers().collect();
    check_successor(&kid, &existing)?;

    writeln!(out, "{}", kid)?;
    Ok(())
}

fn parse_date(date: &str) -> Result<NaiveDate, CliError> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CliError::Argument(format!(
            "date `{}` must be eight digits (YYYYMMDD)",
            date
        )));
    }
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map_err(|e| CliError::Argument(format!("date `{}` is not a calendar date: {}", date, e)))
}
