/// Hash several string parts into one hex digest.
///
/// Each part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` differ.
#[must_use]
pub fn blake3_parts(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
