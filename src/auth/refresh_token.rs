/// Refresh token fingerprints
///
/// The refresh slot never holds a plaintext token. It holds the SHA-256 hex
/// digest of the token, and every lookup or comparison goes through the
/// same digest, so equality of fingerprints is equality of tokens.

use sha2::{Digest, Sha256};

pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
