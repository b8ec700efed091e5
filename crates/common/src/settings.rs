use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::{
    DEFAULT_KEYSET_PATH, DEFAULT_KEY_BITS, DEFAULT_SETTINGS_PATH, ENV_PREFIX, ENV_SEPARATOR,
    MAX_KEY_BITS, MIN_KEY_BITS,
};
use crate::error::KeySetError;
use crate::jwk::SigningAlgorithm;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct KeySetSettings {
    /// Location of the key set document.
    #[serde(default = "default_keyset_path")]
    pub path: PathBuf,
    /// RSA modulus size for newly minted keys.
    #[serde(default = "default_key_bits")]
    #[validate(range(min = MIN_KEY_BITS, max = MAX_KEY_BITS))]
    pub key_bits: usize,
    #[serde(default)]
    pub algorithm: SigningAlgorithm,
}

impl Default for KeySetSettings {
    fn default() -> Self {
        Self {
            path: default_keyset_path(),
            key_bits: default_key_bits(),
            algorithm: SigningAlgorithm::default(),
        }
    }
}

fn default_keyset_path() -> PathBuf {
    PathBuf::from(DEFAULT_KEYSET_PATH)
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub keyset: KeySetSettings,
}

impl Settings {
    /// Loads settings from `path`, or from `keyset.toml` in the working
    /// directory when it exists, then applies `KEYSET__` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Configuration`] if an explicitly given file is
    /// missing, a source cannot be parsed, or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, Report<KeySetError>> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_SETTINGS_PATH, FileFormat::Toml).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(environment())
            .build()
            .change_context(configuration_error("failed to read settings"))?;

        Self::finish(config)
    }

    /// Parses settings from a TOML string, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Configuration`] if the TOML is invalid or the
    /// result fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<KeySetError>> {
        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment())
            .build()
            .change_context(configuration_error("failed to parse settings"))?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, Report<KeySetError>> {
        let settings: Self = config
            .try_deserialize()
            .change_context(configuration_error("failed to deserialize settings"))?;

        settings
            .validate()
            .change_context(configuration_error("settings validation failed"))?;

        Ok(settings)
    }
}

fn environment() -> Environment {
    Environment::default()
        .prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn configuration_error(message: &str) -> KeySetError {
    KeySetError::Configuration {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERRIDES: [&str; 3] = [
        "KEYSET__KEYSET__PATH",
        "KEYSET__KEYSET__KEY_BITS",
        "KEYSET__KEYSET__ALGORITHM",
    ];

    #[test]
    fn test_settings_defaults_from_empty_toml() {
        temp_env::with_vars_unset(OVERRIDES, || {
            let settings = Settings::from_toml("").expect("defaults apply");
            assert_eq!(settings.keyset.path, PathBuf::from("id.json"));
            assert_eq!(settings.keyset.key_bits, 2048);
            assert_eq!(settings.keyset.algorithm, SigningAlgorithm::Rs256);
        });
    }

    #[test]
    fn test_settings_from_valid_toml() {
        let toml_str = r#"
            [keyset]
            path = "/etc/identity/id.json"
            key_bits = 3072
            algorithm = "RS384"
            "#;

        temp_env::with_vars_unset(OVERRIDES, || {
            let settings = Settings::from_toml(toml_str).expect("valid settings");
            assert_eq!(
                settings.keyset.path,
                PathBuf::from("/etc/identity/id.json")
            );
            assert_eq!(settings.keyset.key_bits, 3072);
            assert_eq!(settings.keyset.algorithm, SigningAlgorithm::Rs384);
        });
    }

    #[test]
    fn test_settings_rejects_weak_keys() {
        temp_env::with_vars_unset(OVERRIDES, || {
            let settings = Settings::from_toml("[keyset]\nkey_bits = 1024\n");
            let err = settings.expect_err("1024 bits is below the minimum");
            assert!(matches!(
                err.current_context(),
                KeySetError::Configuration { .. }
            ));

            assert!(Settings::from_toml("[keyset]\nkey_bits = 8192\n").is_err());
        });
    }

    #[test]
    fn test_settings_rejects_unknown_algorithm() {
        temp_env::with_vars_unset(OVERRIDES, || {
            assert!(Settings::from_toml("[keyset]\nalgorithm = \"ES256\"\n").is_err());
            assert!(Settings::from_toml("[keyset]\nalgorithm = \"rs256\"\n").is_err());
        });
    }

    #[test]
    fn test_settings_invalid_toml_syntax() {
        let toml_str = r#"
            [keyset
            path = "id.json"
            "#;

        assert!(
            Settings::from_toml(toml_str).is_err(),
            "Should fail with invalid TOML syntax"
        );
    }

    #[test]
    fn test_settings_extra_fields() {
        let toml_str = r#"
            [keyset]
            path = "id.json"
            extra_field = "should be ignored"
            "#;

        assert!(
            Settings::from_toml(toml_str).is_ok(),
            "Extra fields should be ignored"
        );
    }

    #[test]
    fn test_override_env() {
        let toml_str = r#"
            [keyset]
            path = "id.json"
            "#;

        temp_env::with_vars(
            [
                ("KEYSET__KEYSET__PATH", Some("/srv/keys/id.json")),
                ("KEYSET__KEYSET__KEY_BITS", Some("4096")),
            ],
            || {
                let settings = Settings::from_toml(toml_str).expect("valid settings");
                assert_eq!(settings.keyset.path, PathBuf::from("/srv/keys/id.json"));
                assert_eq!(settings.keyset.key_bits, 4096);
            },
        );
    }

    #[test]
    fn test_load_requires_explicit_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/keyset.toml")))
            .expect_err("missing file");
        assert!(matches!(
            err.current_context(),
            KeySetError::Configuration { .. }
        ));
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("keyset.toml");
        std::fs::write(&path, "[keyset]\npath = \"keys/id.json\"\n").expect("write settings");

        temp_env::with_vars_unset(OVERRIDES, || {
            let settings = Settings::load(Some(&path)).expect("valid settings");
            assert_eq!(settings.keyset.path, PathBuf::from("keys/id.json"));
        });
    }
}
