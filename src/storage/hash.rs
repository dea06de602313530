use sha2::{Digest, Sha256};

/// Hex SHA-256 over the given parts, each terminated by a NUL so that
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn compute_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_boundaries_matter() {
        assert_ne!(compute_hash(&["ab", "c"]), compute_hash(&["a", "bc"]));
        assert_eq!(compute_hash(&["x"]).len(), 64);
    }
}
