//! Stored file naming.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Extension of an uploaded file name, lowercased. Anything that is not
/// plain ASCII alphanumerics is dropped.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 16 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Name under which an upload is stored: a hash of `seed` plus a random
/// nonce, followed by the original extension.
pub fn hashed_file_name(seed: &str, original_file_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hex::encode(hasher.finalize());

    match file_extension(original_file_name) {
        Some(ext) => format!("{}.{}", digest, ext),
        None => digest,
    }
}
