//! Hex-encoded ed25519 key files.

use anyhow::{Context, Result, bail};
use ballot_core::{Identity, SigningKey};
use rand::rngs::OsRng;
use std::path::Path;

/// Generate a key, write it to `path` and return it. Refuses to overwrite.
pub fn generate(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        bail!("key file {:?} already exists", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let key = SigningKey::generate(&mut OsRng);
    std::fs::write(path, hex::encode(key.to_bytes()))?;
    Ok(key)
}

pub fn load(path: &Path) -> Result<SigningKey> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {:?}", path))?;
    let bytes = hex::decode(content.trim()).context("key file is not hex")?;
    let secret: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("key file must hold 32 bytes, found {}", bytes.len()))?;
    Ok(SigningKey::from_bytes(&secret))
}

pub fn identity(key: &SigningKey) -> Identity {
    Identity::from_public_key(&key.verifying_key())
}
