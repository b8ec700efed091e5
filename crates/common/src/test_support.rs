#[cfg(test)]
pub mod tests {
    use std::path::PathBuf;

    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use crate::jwk::SigningAlgorithm;
    use crate::keypair::Keypair;
    use crate::kid::KeyIdentifier;

    /// A key set holding one real 2048-bit key, written with padded base64 the
    /// way older tooling did.
    pub const SAMPLE_KEY_SET: &str = r#"{
    "keys": [
        {
            "kid": "example-python-flask-20180101",
            "kty": "RSA",
            "alg": "RS256",
            "e": "AQAB",
            "n": "7jImCZ9C0WYCooEGG2Xc5xxS9UUZPVWsgs0yhYgj6mYfxqS-XvX_Sqot0MCytZNe8loVs7VJgqsefMX8859YYtl2eKwZk3h3KV_YItk2RXJXtDWjBJZ4_K48nNZ6cIWPPxWeIeLArtT-DJXymQItTJBKX3MREMP6Xor6XA5ygzs8OyoZ-6Fgi0Z9M8F5UL5L_Nc9GEmKd5HoDvY2cTnJ7Hpqvym-wNirURX4o-ulJMJX4UzuN9PwNh-dWa3lqFMWz2M-fmNTzssdB9iKG2GpCx4LA7QLeNzbX2Rls92zda8kZZpvolHf0k1Br3uRjicq3gYZFjDcSQ_FVhT9p-78mw=="
        }
    ]
}
"#;

    static TEST_KEYPAIR: Lazy<Keypair> = Lazy::new(|| {
        let kid = KeyIdentifier::parse("test-20240101").expect("valid test kid");
        Keypair::generate(kid, 2048, SigningAlgorithm::Rs256).expect("test keypair generates")
    });

    /// A 2048-bit keypair for `test-20240101`, minted once per test binary.
    pub fn test_keypair() -> &'static Keypair {
        &TEST_KEYPAIR
    }

    /// Writes `content` to `id.json` inside `dir` and returns its path.
    pub fn write_document(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("id.json");
        std::fs::write(&path, content).expect("write key set document");
        path
    }
}
