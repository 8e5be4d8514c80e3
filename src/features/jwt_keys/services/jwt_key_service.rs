use std::sync::Arc;

use base64::prelude::*;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::core::config::JwtKeyConfig;
use crate::core::error::{AppError, Result};
use crate::features::jwt_keys::models::JwtKey;
use crate::features::jwt_keys::stores::JwtKeyStore;

/// HS256 keys are 256 bits
const SECRET_KEY_BYTES: usize = 32;

const PROBE_SUBJECT: &str = "dailyfeed-batch-key-probe";

/// Result of one rotation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRotationOutcome {
    /// Key id of the primary key created by this run
    pub generated_key_id: Option<String>,
    pub deactivated: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProbeClaims {
    sub: String,
    exp: u64,
}

/// Lifecycle of the JWT signing keys: bootstrap, rotation and expiry
pub struct JwtKeyService {
    store: Arc<dyn JwtKeyStore>,
    config: JwtKeyConfig,
}

impl JwtKeyService {
    pub fn new(store: Arc<dyn JwtKeyStore>, config: JwtKeyConfig) -> Self {
        Self { store, config }
    }

    /// Make sure exactly one primary key exists.
    ///
    /// Duplicate primaries are resolved first by keeping the newest; a key is
    /// generated only when none is left.
    pub async fn initialize_jwt_key(&self) -> Result<Option<JwtKey>> {
        self.fix_duplicate_primary_keys().await?;

        match self.store.find_primary_key().await? {
            Some(existing) => {
                tracing::info!(
                    "Primary JWT key already present: {} (expires at {})",
                    existing.key_id,
                    existing.expires_at
                );
                Ok(None)
            }
            None => {
                tracing::warn!("No primary JWT key found, generating one");
                self.generate_new_primary_key().await.map(Some)
            }
        }
    }

    /// Replace the primary key once it is older than the rotation period,
    /// then deactivate keys past their expiry
    pub async fn rotate_keys_if_needed(&self) -> Result<KeyRotationOutcome> {
        let mut outcome = KeyRotationOutcome::default();

        let Some(current) = self.store.find_primary_key().await? else {
            tracing::warn!("No primary JWT key found during rotation, generating one");
            let key = self.generate_new_primary_key().await?;
            outcome.generated_key_id = Some(key.key_id);
            return Ok(outcome);
        };

        let now = Utc::now();
        if current.is_rotation_due(self.config.rotation_hours, now) {
            tracing::info!(
                "Key rotation triggered: current key is {} hours old (threshold: {} hours)",
                current.age_hours(now),
                self.config.rotation_hours
            );
            let key = self.generate_new_primary_key().await?;
            outcome.generated_key_id = Some(key.key_id);
        } else {
            tracing::debug!(
                "Current key is still valid (created {} hours ago, rotation at {} hours)",
                current.age_hours(now),
                self.config.rotation_hours
            );
        }

        outcome.deactivated = self.cleanup_expired_keys().await?;
        Ok(outcome)
    }

    async fn fix_duplicate_primary_keys(&self) -> Result<()> {
        let mut primaries = self.store.find_all_primary_keys().await?;
        if primaries.len() <= 1 {
            return Ok(());
        }

        tracing::warn!(
            "Found {} primary JWT keys, keeping only the newest",
            primaries.len()
        );

        primaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let demoted: Vec<JwtKey> = primaries
            .into_iter()
            .skip(1)
            .map(|mut key| {
                key.demote();
                tracing::info!("Demoted duplicate primary key: {}", key.key_id);
                key
            })
            .collect();

        self.store.update_all(&demoted).await
    }

    async fn generate_new_primary_key(&self) -> Result<JwtKey> {
        let demoted: Vec<JwtKey> = self
            .store
            .find_all_primary_keys()
            .await?
            .into_iter()
            .map(|mut key| {
                key.demote();
                tracing::info!("Demoted existing primary key: {} to regular key", key.key_id);
                key
            })
            .collect();

        let key = JwtKey::new_key(
            generate_secret(),
            self.config.rotation_hours,
            self.config.grace_period_hours,
        );
        verify_signing_key(&key)?;

        self.store.save_rotation(&demoted, &key).await?;

        tracing::info!(
            "New primary key generated with ID: {} (will expire at: {})",
            key.key_id,
            key.expires_at
        );
        Ok(key)
    }

    async fn cleanup_expired_keys(&self) -> Result<usize> {
        let mut expired = self.store.find_expired_keys(Utc::now()).await?;
        if expired.is_empty() {
            tracing::debug!("No expired keys to clean up");
            return Ok(0);
        }

        for key in &mut expired {
            key.deactivate();
            tracing::info!(
                "Deactivated expired key: {} (expired at: {})",
                key.key_id,
                key.expires_at
            );
        }

        self.store.update_all(&expired).await?;
        tracing::info!("Cleaned up {} expired keys", expired.len());
        Ok(expired.len())
    }
}

/// Base64 of fresh random key bytes
fn generate_secret() -> String {
    let bytes: [u8; SECRET_KEY_BYTES] = rand::random();
    BASE64_STANDARD.encode(bytes)
}

/// Sign and verify a short-lived probe token with `key`
fn verify_signing_key(key: &JwtKey) -> Result<()> {
    let secret = BASE64_STANDARD
        .decode(&key.secret_key)
        .map_err(|e| AppError::Internal(format!("JWT key {} is not base64: {}", key.key_id, e)))?;

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(key.key_id.clone());
    let claims = ProbeClaims {
        sub: PROBE_SUBJECT.to_string(),
        exp: (Utc::now().timestamp() + 60) as u64,
    };

    let token = encode(&header, &claims, &EncodingKey::from_secret(&secret))
        .map_err(|e| AppError::Internal(format!("JWT key {} cannot sign: {}", key.key_id, e)))?;
    let decoded = decode::<ProbeClaims>(
        &token,
        &DecodingKey::from_secret(&secret),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| AppError::Internal(format!("JWT key {} cannot verify: {}", key.key_id, e)))?;

    if decoded.claims.sub != PROBE_SUBJECT {
        return Err(AppError::Internal(format!(
            "JWT key {} produced a mismatching probe token",
            key.key_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::jwt_keys::stores::InMemoryJwtKeyStore;
    use chrono::Duration;

    fn service(store: Arc<InMemoryJwtKeyStore>) -> JwtKeyService {
        JwtKeyService::new(store, JwtKeyConfig::default())
    }

    fn key_created_hours_ago(hours: i64) -> JwtKey {
        let mut key = JwtKey::new_key(generate_secret(), 24, 48);
        key.created_at = Utc::now() - Duration::hours(hours);
        key.expires_at = key.created_at + Duration::hours(72);
        key
    }

    #[test]
    fn test_generated_secret_is_256_bits() {
        let secret = generate_secret();
        assert_eq!(BASE64_STANDARD.decode(secret).unwrap().len(), 32);
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn test_verify_signing_key_rejects_non_base64() {
        let key = JwtKey::new_key("not base64!".to_string(), 24, 48);
        assert!(verify_signing_key(&key).is_err());
    }

    #[tokio::test]
    async fn test_initialize_generates_when_empty() {
        let store = Arc::new(InMemoryJwtKeyStore::new());
        let generated = service(store.clone()).initialize_jwt_key().await.unwrap();

        let keys = store.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_primary && keys[0].is_active);
        assert_eq!(generated.map(|k| k.key_id), Some(keys[0].key_id.clone()));
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_primary() {
        let existing = key_created_hours_ago(1);
        let store = Arc::new(InMemoryJwtKeyStore::with_keys(vec![existing.clone()]));

        let generated = service(store.clone()).initialize_jwt_key().await.unwrap();

        assert!(generated.is_none());
        assert_eq!(store.keys(), vec![existing]);
    }

    #[tokio::test]
    async fn test_initialize_demotes_duplicate_primaries() {
        let older = key_created_hours_ago(5);
        let newer = key_created_hours_ago(1);
        let store = Arc::new(InMemoryJwtKeyStore::with_keys(vec![
            older.clone(),
            newer.clone(),
        ]));

        service(store.clone()).initialize_jwt_key().await.unwrap();

        let keys = store.keys();
        assert_eq!(keys.len(), 2);
        let primaries: Vec<_> = keys.iter().filter(|k| k.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, newer.id);
        assert!(keys.iter().all(|k| k.is_active));
    }

    #[tokio::test]
    async fn test_rotation_skipped_for_fresh_key() {
        let store = Arc::new(InMemoryJwtKeyStore::with_keys(vec![key_created_hours_ago(2)]));

        let outcome = service(store.clone()).rotate_keys_if_needed().await.unwrap();

        assert_eq!(outcome, KeyRotationOutcome::default());
        assert_eq!(store.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_replaces_old_primary_and_deactivates_expired() {
        let current = key_created_hours_ago(30);
        let mut expired = key_created_hours_ago(100);
        expired.is_primary = false;
        let store = Arc::new(InMemoryJwtKeyStore::with_keys(vec![
            current.clone(),
            expired.clone(),
        ]));

        let outcome = service(store.clone()).rotate_keys_if_needed().await.unwrap();

        assert!(outcome.generated_key_id.is_some());
        assert_eq!(outcome.deactivated, 1);

        let keys = store.keys();
        assert_eq!(keys.len(), 3);
        let old = keys.iter().find(|k| k.id == current.id).unwrap();
        assert!(!old.is_primary && old.is_active);
        let gone = keys.iter().find(|k| k.id == expired.id).unwrap();
        assert!(!gone.is_active);
        let fresh = keys
            .iter()
            .find(|k| Some(&k.key_id) == outcome.generated_key_id.as_ref())
            .unwrap();
        assert!(fresh.is_primary && fresh.is_active);
    }

    #[tokio::test]
    async fn test_rotation_without_primary_generates_and_returns() {
        let store = Arc::new(InMemoryJwtKeyStore::new());

        let outcome = service(store.clone()).rotate_keys_if_needed().await.unwrap();

        assert!(outcome.generated_key_id.is_some());
        assert_eq!(outcome.deactivated, 0);
        assert_eq!(store.keys().len(), 1);
    }
}
