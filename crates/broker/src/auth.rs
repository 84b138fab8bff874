//! Authentication is an out-of-scope collaborator (JWT issuance lives
//! outside this system); this module only defines the verification
//! contract a concrete issuer's public key/introspection endpoint must
//! satisfy, plus the revocation check every verified token still passes
//! through.

use agentim_domain::error::{Error, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::security::revocation::RevocationStore;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct AuthedIdentity {
    pub user_id: String,
    pub token_hash: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthedIdentity>;
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Verify a bearer token's signature through `verifier`, then reject it
/// if its hash appears in `revocations` — a revoked token must never be
/// accepted even if its signature still validates.
pub async fn authenticate(
    token: &str,
    verifier: &dyn TokenVerifier,
    revocations: &RevocationStore,
) -> Result<AuthedIdentity> {
    let identity = verifier.verify(token).await?;
    if revocations.is_revoked(&identity.token_hash) {
        return Err(Error::Auth("token has been revoked".into()));
    }
    Ok(identity)
}

/// Default verifier for tokens shaped `"<user_id>.<hex hmac-sha256>"`,
/// where the MAC covers `user_id` under a shared secret. Real deployments
/// front this with the issuer's own JWKS-backed verifier; this is the
/// dependency-free default so the broker runs standalone in dev mode.
pub struct SharedSecretVerifier {
    secret: Vec<u8>,
}

impl SharedSecretVerifier {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl TokenVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> Result<AuthedIdentity> {
        let (user_id, mac_hex) = token
            .split_once('.')
            .ok_or_else(|| Error::Auth("malformed token".into()))?;

        let given = hex::decode(mac_hex).map_err(|_| Error::Auth("malformed token signature".into()))?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(user_id.as_bytes());
        mac.verify_slice(&given)
            .map_err(|_| Error::Auth("invalid token signature".into()))?;

        Ok(AuthedIdentity {
            user_id: user_id.to_string(),
            token_hash: hash_token(token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysValid;

    #[async_trait]
    impl TokenVerifier for AlwaysValid {
        async fn verify(&self, token: &str) -> Result<AuthedIdentity> {
            Ok(AuthedIdentity {
                user_id: "u1".into(),
                token_hash: hash_token(token),
            })
        }
    }

    #[tokio::test]
    async fn valid_unrevoked_token_authenticates() {
        let revocations = RevocationStore::new(100, b"secret".to_vec());
        let identity = authenticate("tok", &AlwaysValid, &revocations).await.unwrap();
        assert_eq!(identity.user_id, "u1");
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let revocations = RevocationStore::new(100, b"secret".to_vec());
        revocations.revoke_local(&hash_token("tok"));
        assert!(authenticate("tok", &AlwaysValid, &revocations).await.is_err());
    }

    fn sign(secret: &[u8], user_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(user_id.as_bytes());
        format!("{user_id}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    #[tokio::test]
    async fn shared_secret_verifier_accepts_valid_mac() {
        let verifier = SharedSecretVerifier::new(b"shh".to_vec());
        let token = sign(b"shh", "alice");
        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.user_id, "alice");
    }

    #[tokio::test]
    async fn shared_secret_verifier_rejects_tampered_mac() {
        let verifier = SharedSecretVerifier::new(b"shh".to_vec());
        let token = sign(b"different-secret", "alice");
        assert!(verifier.verify(&token).await.is_err());
    }
}
