//! Token revocation: an in-memory set refreshed by pub/sub broadcasts, with
//! a periodic DB-fallback sweep so a broker that missed a broadcast still
//! converges within `db_fallback_interval_secs`.
//!
//! Every broadcast is HMAC-SHA256 signed with a shared secret; a broker
//! that can't verify the signature drops the message rather than trusting
//! an unauthenticated revocation (which would let an attacker "revoke"
//! poison entries to wedge the cache, but never let a real revocation
//! through a forged unrevoke).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use agentim_domain::trace::TraceEvent;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bound on the in-memory revocation set; once exceeded the oldest entries
/// (by insertion time) are evicted to make room for new ones.
pub const MAX_MEMORY_REVOCATIONS: usize = 10_000;

fn token_hash_prefix(token_hash: &str) -> String {
    token_hash.chars().take(8).collect()
}

struct RevocationEntry {
    revoked_at: Instant,
}

/// Thread-safe store of revoked token hashes (never raw tokens).
pub struct RevocationStore {
    revoked: RwLock<HashMap<String, RevocationEntry>>,
    capacity: usize,
    hmac_secret: Vec<u8>,
}

impl RevocationStore {
    pub fn new(capacity: usize, hmac_secret: Vec<u8>) -> Self {
        Self {
            revoked: RwLock::new(HashMap::new()),
            capacity,
            hmac_secret,
        }
    }

    /// Record a revocation learned locally (e.g. a user-initiated revoke
    /// served by this broker instance, before it fans the broadcast out).
    pub fn revoke_local(&self, token_hash: &str) {
        self.insert(token_hash);
        TraceEvent::TokenRevoked {
            token_hash_prefix: token_hash_prefix(token_hash),
        }
        .emit();
    }

    /// Apply a pub/sub broadcast payload. `signature` must be a valid
    /// HMAC-SHA256 of `token_hash` under the shared secret, hex-encoded.
    /// Returns `true` if the signature verified and the entry was applied.
    pub fn apply_broadcast(&self, token_hash: &str, signature_hex: &str) -> bool {
        if !self.verify_signature(token_hash, signature_hex) {
            tracing::warn!("dropping revocation broadcast with invalid signature");
            return false;
        }
        self.insert(token_hash);
        TraceEvent::TokenRevoked {
            token_hash_prefix: token_hash_prefix(token_hash),
        }
        .emit();
        true
    }

    /// Apply a fallback sweep result fetched from the DB: the full set of
    /// hashes revoked since `since`, already trusted (same process that
    /// owns the DB connection, no signature needed).
    pub fn apply_db_fallback(&self, token_hashes: &[String]) {
        for hash in token_hashes {
            self.insert(hash);
        }
    }

    pub fn is_revoked(&self, token_hash: &str) -> bool {
        let revoked = self.revoked.read().contains_key(token_hash);
        TraceEvent::TokenRevocationChecked {
            token_hash_prefix: token_hash_prefix(token_hash),
            revoked,
            source: "memory".into(),
        }
        .emit();
        revoked
    }

    pub fn sign(&self, token_hash: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_secret).expect("HMAC accepts any key length");
        mac.update(token_hash.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify_signature(&self, token_hash: &str, signature_hex: &str) -> bool {
        let Ok(given) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.hmac_secret).expect("HMAC accepts any key length");
        mac.update(token_hash.as_bytes());
        mac.verify_slice(&given).is_ok()
    }

    fn insert(&self, token_hash: &str) {
        let mut revoked = self.revoked.write();
        if revoked.len() >= self.capacity && !revoked.contains_key(token_hash) {
            if let Some(oldest) = revoked
                .iter()
                .min_by_key(|(_, e)| e.revoked_at)
                .map(|(k, _)| k.clone())
            {
                revoked.remove(&oldest);
            }
        }
        revoked.insert(
            token_hash.to_string(),
            RevocationEntry {
                revoked_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.revoked.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.read().is_empty()
    }
}

/// How often the broker should poll the DB for revocations it may have
/// missed a pub/sub broadcast for.
pub fn db_fallback_interval(config_secs: u64) -> Duration {
    Duration::from_secs(config_secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RevocationStore {
        RevocationStore::new(4, b"test-secret".to_vec())
    }

    #[test]
    fn local_revocation_is_visible() {
        let s = store();
        assert!(!s.is_revoked("h1"));
        s.revoke_local("h1");
        assert!(s.is_revoked("h1"));
    }

    #[test]
    fn broadcast_with_valid_signature_applies() {
        let s = store();
        let sig = s.sign("h1");
        assert!(s.apply_broadcast("h1", &sig));
        assert!(s.is_revoked("h1"));
    }

    #[test]
    fn broadcast_with_bad_signature_is_dropped() {
        let s = store();
        assert!(!s.apply_broadcast("h1", "deadbeef"));
        assert!(!s.is_revoked("h1"));
    }

    #[test]
    fn db_fallback_applies_without_signature() {
        let s = store();
        s.apply_db_fallback(&["h1".into(), "h2".into()]);
        assert!(s.is_revoked("h1"));
        assert!(s.is_revoked("h2"));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let s = store();
        s.revoke_local("h1");
        s.revoke_local("h2");
        s.revoke_local("h3");
        s.revoke_local("h4");
        assert_eq!(s.len(), 4);
        s.revoke_local("h5");
        assert_eq!(s.len(), 4);
        assert!(!s.is_revoked("h1"), "oldest entry should have been evicted");
        assert!(s.is_revoked("h5"));
    }
}
