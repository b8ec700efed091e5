/// Regular expression every key identifier must match: an owner scope, a hyphen
/// and an eight digit `YYYYMMDD` version.
pub const KID_PATTERN: &str = r"^[a-zA-Z0-9-]+-[0-9]{8}$";

/// Length of the `-YYYYMMDD` postfix of a key identifier.
pub const KID_VERSION_SUFFIX_LEN: usize = 9;

/// The only key type the key set carries.
pub const KEY_TYPE: &str = "RSA";

pub const DEFAULT_KEYSET_PATH: &str = "id.json";
pub const DEFAULT_KEY_BITS: usize = 2048;
pub const MIN_KEY_BITS: usize = 2048;
pub const MAX_KEY_BITS: usize = 4096;

/// Settings file picked up from the working directory when present.
pub const DEFAULT_SETTINGS_PATH: &str = "keyset.toml";

/// Environment variable prefix for settings overrides, e.g. `KEYSET__KEYSET__PATH`.
pub const ENV_PREFIX: &str = "KEYSET";
pub const ENV_SEPARATOR: &str = "__";
