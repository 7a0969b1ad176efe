//! Password hashing.
//!
//! Stored form is a standard bcrypt string (`$2b$10$...`), so hashes written
//! by other bcrypt implementations verify here too.

use crate::Result;
use anyhow::Context;

/// bcrypt work factor for new hashes.
pub const HASH_COST: u32 = 10;

pub fn hash_password(password: &str) -> Result<String> {
    let hashed = bcrypt::hash(password, HASH_COST).context("hash password")?;
    Ok(hashed)
}

/// False for a wrong password and for anything that is not a bcrypt hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("hunter2").unwrap();
        assert!(stored.starts_with("$2b$10$"));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(
            hash_password("same").unwrap(),
            hash_password("same").unwrap()
        );
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$00$00"));
        assert!(!verify_password("x", "$2b$10$tooshort"));
    }

    #[test]
    fn accepts_hashes_from_other_bcrypt_writers() {
        // `$2a$` prefix as produced by node's bcrypt.
        let stored = bcrypt::hash_with_result("legacy", 4)
            .unwrap()
            .format_for_version(bcrypt::Version::TwoA);
        assert!(stored.starts_with("$2a$04$"));
        assert!(verify_password("legacy", &stored));
    }
}
