use sha2::Digest;
use sha2::Sha256;

/// Number of hex digits written into end markers.
pub const CHECKSUM_LENGTH: usize = 16;

/// Hex digest of `text`, truncated to `length` characters.
pub fn compute_checksum(text: &str, length: usize) -> String {
	let mut hasher = Sha256::new();
	hasher.update(text.as_bytes());
	let mut digest = hex::encode(hasher.finalize());
	digest.truncate(length);

	digest
}
