//! Sign/verify round trip for freshly minted keypairs.
//!
//! A token over an empty claim set is signed with the private key and verified
//! with a key rebuilt from the exported `e`/`n`. Any disagreement means the
//! public representation would be useless to verifiers, so it is fatal.

use error_stack::{Report, ResultExt};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

use crate::error::KeySetError;
use crate::jwk::JsonWebKey;

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyClaims {}

/// Proves that `jwk` is the public half of `private_key`.
///
/// # Errors
///
/// Returns [`KeySetError::SigningMismatch`] if signing fails, the exported
/// components cannot be turned into a verification key, or verification fails.
pub fn prove(private_key: &RsaPrivateKey, jwk: &JsonWebKey) -> Result<(), Report<KeySetError>> {
    let mismatch = || KeySetError::SigningMismatch {
        kid: jwk.kid.to_string(),
    };
    let algorithm = jwk.alg.jwt_algorithm();

    let der = private_key
        .to_pkcs1_der()
        .change_context_lazy(mismatch)
        .attach("while encoding the private key")?;
    let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

    let mut header = Header::new(algorithm);
    header.kid = Some(jwk.kid.to_string());
    let token = encode(&header, &EmptyClaims::default(), &encoding_key)
        .change_context_lazy(mismatch)
        .attach("while signing the empty claim set")?;

    let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
        .change_context_lazy(mismatch)
        .attach("while rebuilding the public key from `e` and `n`")?;

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let claims = decode::<EmptyClaims>(&token, &decoding_key, &validation)
        .change_context_lazy(mismatch)
        .attach("while verifying the signature")?
        .claims;

    if claims != EmptyClaims::default() {
        return Err(Report::new(mismatch()).attach("decoded claims differ from the signed claims"));
    }

    log::debug!("Round trip proof passed for {}", jwk.kid);
    Ok(())
}
