use blake2::{Blake2b512, Digest};

/// Hex-encoded BLAKE2b-512 digest of a raw webhook body. Stored alongside the idempotency record for auditing.
pub fn payload_hash(payload: &[u8]) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}
