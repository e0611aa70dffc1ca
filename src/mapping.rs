use crate::model::SessionToken;
use sha2::{Digest, Sha256};

/// Deterministic storage key for a session token. Raw tokens never reach a backend.
pub fn session_storage_key(token: &SessionToken) -> String {
    hex_sha(&format!("session:{}", token.as_str()))
}

fn hex_sha(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash() {
        let a = session_storage_key(&SessionToken("cookie-a".into()));
        assert_eq!(a, session_storage_key(&SessionToken("cookie-a".into())));
        assert_ne!(a, session_storage_key(&SessionToken("cookie-b".into())));
        assert_eq!(a.len(), 64);
        assert!(!a.contains("cookie"));
    }
}
