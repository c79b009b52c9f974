//! Process-local identity keystore.
//!
//! An ECDSA P-256 keypair is generated on first start and persisted as
//! PKCS#8 PEM at `{data_dir}/identity.key` with owner-only permissions;
//! subsequent starts load it. Signatures are raw R‖S (64 bytes for P-256),
//! hex-encoded, so clients can verify without an ASN.1 parser.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity key not initialized")]
    NotInitialized,
    #[error("Failed to read/write identity key: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid identity key material: {0}")]
    KeyMaterial(String),
}

/// The only process-wide singleton in the system. Loaded once, read many
/// times; signing takes the read half of the lock.
pub struct IdentityStore {
    path: PathBuf,
    key: RwLock<Option<SigningKey>>,
}

impl IdentityStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("identity.key"),
            key: RwLock::new(None),
        }
    }

    /// Load the key from disk, generating and persisting one if absent.
    pub async fn init(&self) -> Result<(), IdentityError> {
        let key = if self.path.exists() {
            let pem = std::fs::read_to_string(&self.path)?;
            SigningKey::from_pkcs8_pem(&pem)
                .map_err(|e| IdentityError::KeyMaterial(e.to_string()))?
        } else {
            let key = SigningKey::random(&mut rand::rngs::OsRng);
            let pem = key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| IdentityError::KeyMaterial(e.to_string()))?;
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, pem.as_bytes())?;
            restrict_permissions(&self.path)?;
            tracing::info!(path = %self.path.display(), "generated new identity key");
            key
        };

        *self.key.write().await = Some(key);
        Ok(())
    }

    /// Sign arbitrary bytes; returns hex-encoded raw R‖S.
    pub async fn sign(&self, bytes: &[u8]) -> Result<String, IdentityError> {
        let guard = self.key.read().await;
        let key = guard.as_ref().ok_or(IdentityError::NotInitialized)?;
        let signature: Signature = key.sign(bytes);
        Ok(hex::encode(signature.to_bytes()))
    }

    /// SPKI PEM of the public half.
    pub async fn public_key_pem(&self) -> Result<String, IdentityError> {
        let guard = self.key.read().await;
        let key = guard.as_ref().ok_or(IdentityError::NotInitialized)?;
        VerifyingKey::from(key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| IdentityError::KeyMaterial(e.to_string()))
    }
}

/// Verify a hex R‖S signature against an SPKI PEM public key. Provided for
/// clients and tests; the server itself only signs.
pub fn verify_signature(
    public_key_pem: &str,
    bytes: &[u8],
    signature_hex: &str,
) -> Result<bool, IdentityError> {
    let key = VerifyingKey::from_public_key_pem(public_key_pem)
        .map_err(|e| IdentityError::KeyMaterial(e.to_string()))?;
    let raw = hex::decode(signature_hex)
        .map_err(|e| IdentityError::KeyMaterial(e.to_string()))?;
    let signature = Signature::from_slice(&raw)
        .map_err(|e| IdentityError::KeyMaterial(e.to_string()))?;
    Ok(key.verify(bytes, &signature).is_ok())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_before_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path());
        let err = store.sign(b"payload").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotInitialized));
    }

    #[tokio::test]
    async fn test_sign_then_verify_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path());
        store.init().await.unwrap();

        let signature = store.sign(b"hello on-call").await.unwrap();
        // Raw R||S for P-256 is 64 bytes, hex doubles it.
        assert_eq!(signature.len(), 128);

        let pem = store.public_key_pem().await.unwrap();
        assert!(verify_signature(&pem, b"hello on-call", &signature).unwrap());
        assert!(!verify_signature(&pem, b"tampered", &signature).unwrap());
    }

    #[tokio::test]
    async fn test_key_persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();

        let store = IdentityStore::new(dir.path());
        store.init().await.unwrap();
        let pem_before = store.public_key_pem().await.unwrap();

        let reloaded = IdentityStore::new(dir.path());
        reloaded.init().await.unwrap();
        let pem_after = reloaded.public_key_pem().await.unwrap();

        assert_eq!(pem_before, pem_after);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path());
        store.init().await.unwrap();

        let mode = std::fs::metadata(dir.path().join("identity.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
