//! JSON Web Key and key set document model.
//!
//! The on-disk document is parsed into [`KeySetDocument`] / [`JwkRecord`], where
//! every member is a [`Field`] so that a missing member and an explicit `null`
//! stay distinguishable for the validator. [`JsonWebKey`] is the fully typed
//! public key produced by the minter.

use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use derive_more::Display;
use error_stack::{Report, ResultExt};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::constants::{KEY_TYPE, MIN_KEY_BITS};
use crate::error::KeySetError;
use crate::kid::KeyIdentifier;

/// Base64url decoder that tolerates `=` padding left behind by older tooling.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// RSA PKCS#1 v1.5 signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    #[serde(rename = "RS256")]
    #[display("RS256")]
    Rs256,
    #[serde(rename = "RS384")]
    #[display("RS384")]
    Rs384,
    #[serde(rename = "RS512")]
    #[display("RS512")]
    Rs512,
}

impl SigningAlgorithm {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }

    #[must_use]
    pub fn jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::Rs256 => jsonwebtoken::Algorithm::RS256,
            Self::Rs384 => jsonwebtoken::Algorithm::RS384,
            Self::Rs512 => jsonwebtoken::Algorithm::RS512,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = Report<KeySetError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::Rs256),
            "RS384" => Ok(Self::Rs384),
            "RS512" => Ok(Self::Rs512),
            other => Err(Report::new(KeySetError::Configuration {
                message: format!("unsupported signing algorithm `{}`", other),
            })),
        }
    }
}

/// A document member that may be absent, explicitly `null`, or present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Missing,
    Null,
    Present(T),
}

impl<T> Field<T> {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    #[must_use]
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Missing | Self::Null => None,
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Present(value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Present(value),
            None => Self::Null,
        })
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Present(value) => value.serialize(serializer),
            Self::Missing | Self::Null => serializer.serialize_none(),
        }
    }
}

/// One entry of the `keys` array as stored on disk.
///
/// Members other than the five the key set cares about are kept in `extra` and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JwkRecord {
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub kid: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub kty: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub alg: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub e: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub n: Field<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JwkRecord {
    /// The `kid` member, when present.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_present().map(String::as_str)
    }
}

/// A public RSA signing key ready to be appended to a key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonWebKey {
    pub kid: KeyIdentifier,
    pub alg: SigningAlgorithm,
    /// Public exponent, base64url big-endian without padding.
    pub e: String,
    /// Modulus, base64url big-endian without padding.
    pub n: String,
}

impl JsonWebKey {
    #[must_use]
    pub fn from_public_key(kid: KeyIdentifier, alg: SigningAlgorithm, key: &RsaPublicKey) -> Self {
        Self {
            kid,
            alg,
            e: b64_big_endian(key.e()),
            n: b64_big_endian(key.n()),
        }
    }

    #[must_use]
    pub fn kty(&self) -> &'static str {
        KEY_TYPE
    }

    /// Reconstructs the RSA public key from `e` and `n`.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::CorruptDocument`] if either component does not
    /// decode or the pair is not a usable RSA public key.
    pub fn public_key(&self) -> Result<RsaPublicKey, Report<KeySetError>> {
        rsa_public_key(&self.e, &self.n).attach(format!("while reconstructing `{}`", self.kid))
    }

    #[must_use]
    pub fn to_record(&self) -> JwkRecord {
        JwkRecord {
            kid: Field::Present(self.kid.to_string()),
            kty: Field::Present(KEY_TYPE.to_string()),
            alg: Field::Present(self.alg.to_string()),
            e: Field::Present(self.e.clone()),
            n: Field::Present(self.n.clone()),
            extra: Map::new(),
        }
    }
}

impl From<&JsonWebKey> for JwkRecord {
    fn from(jwk: &JsonWebKey) -> Self {
        jwk.to_record()
    }
}

impl fmt::Display for JsonWebKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.kid, KEY_TYPE, self.alg)
    }
}

/// Encodes an unsigned integer as unpadded base64url of its big-endian bytes.
#[must_use]
pub fn b64_big_endian(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

/// Decodes a base64url JWK component, with or without padding.
///
/// # Errors
///
/// Returns [`KeySetError::CorruptDocument`] if `value` is not base64url.
pub fn decode_component(value: &str) -> Result<Vec<u8>, Report<KeySetError>> {
    URL_SAFE_LENIENT
        .decode(value)
        .change_context(KeySetError::corrupt("JWK component is not base64url"))
}

/// Builds an RSA public key from base64url encoded exponent and modulus.
///
/// # Errors
///
/// Returns [`KeySetError::CorruptDocument`] if decoding fails or the numbers do
/// not form a valid RSA public key.
pub fn rsa_public_key(e: &str, n: &str) -> Result<RsaPublicKey, Report<KeySetError>> {
    let e = decode_component(e).attach("while decoding `e`")?;
    let n = decode_component(n).attach("while decoding `n`")?;

    // An even modulus cannot be a product of two odd primes.
    if n.last().is_none_or(|byte| byte & 1 == 0) {
        return Err(Report::new(KeySetError::corrupt("RSA modulus must be odd")));
    }

    let n = BigUint::from_bytes_be(&n);
    let e = BigUint::from_bytes_be(&e);
    if n.bits() < MIN_KEY_BITS {
        return Err(Report::new(KeySetError::corrupt(format!(
            "RSA modulus has {} bits, at least {} are required",
            n.bits(),
            MIN_KEY_BITS
        ))));
    }
    if e >= n {
        return Err(Report::new(KeySetError::corrupt(
            "RSA exponent must be smaller than the modulus",
        )));
    }

    RsaPublicKey::new(n, e).change_context(KeySetError::corrupt("invalid RSA public key"))
}

/// The raw key set document. `keys` itself may be missing or `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeySetDocument {
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub keys: Field<Vec<JwkRecord>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KeySetDocument {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::CorruptDocument`] if `json` is not a JSON object
    /// or a known member has the wrong type.
    pub fn from_json(json: &str) -> Result<Self, Report<KeySetError>> {
        serde_json::from_str(json).change_context(KeySetError::corrupt("not a valid key set document"))
    }

    /// Requires the `keys` collection to exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::CorruptDocument`] if `keys` is missing or `null`.
    pub fn into_key_set(self) -> Result<KeySet, Report<KeySetError>> {
        match self.keys {
            Field::Present(keys) => Ok(KeySet {
                keys,
                extra: self.extra,
            }),
            Field::Missing => Err(Report::new(KeySetError::corrupt("`keys` property not found"))),
            Field::Null => Err(Report::new(KeySetError::corrupt("`keys` value is null"))),
        }
    }
}

/// A key set whose `keys` collection exists. Entries are kept in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeySet {
    keys: Vec<JwkRecord>,
    extra: Map<String, Value>,
}

impl KeySet {
    #[must_use]
    pub fn new(keys: Vec<JwkRecord>) -> Self {
        Self {
            keys,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn keys(&self) -> &[JwkRecord] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns a new set with `key` appended. Nothing is written.
    #[must_use]
    pub fn append(mut self, key: &JsonWebKey) -> Self {
        self.keys.push(key.to_record());
        self
    }

    /// Every entry whose `kid` is well formed, in document order.
    pub fn identifiers(&self) -> impl Iterator<Item = KeyIdentifier> + '_ {
        self.keys
            .iter()
            .filter_map(JwkRecord::kid)
            .filter_map(|kid| KeyIdentifier::parse(kid).ok())
    }

    /// Looks up an entry by exact `kid` equality.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&JwkRecord> {
        self.keys.iter().find(|record| record.kid() == Some(kid))
    }

    #[must_use]
    pub fn to_document(&self) -> KeySetDocument {
        KeySetDocument {
            keys: Field::Present(self.keys.clone()),
            extra: self.extra.clone(),
        }
    }
}

impl From<KeySet> for KeySetDocument {
    fn from(set: KeySet) -> Self {
        Self {
            keys: Field::Present(set.keys),
            extra: set.extra,
        }
    }
}
