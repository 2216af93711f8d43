use crate::core::config::KeyType;
use crate::core::errors::SigningError;
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::pkcs8::DecodePrivateKey as _;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use rsa::pkcs1v15;
use rsa::pkcs8::{DecodePrivateKey as _, Document, PrivateKeyInfo};
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";
const ED25519_OID: &str = "1.3.101.112";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Produces the `signature` parameter for a canonical payload.
///
/// Implementations are chosen once per session from [`KeyType`] and the
/// configured secret; they never change afterwards.
pub trait Signer: Send + Sync {
    fn key_type(&self) -> KeyType;

    fn sign(&self, payload: &str) -> Result<String, SigningError>;
}

/// Build the signer matching the configured key type
pub fn signer_for(key_type: KeyType, secret: &str) -> Result<Arc<dyn Signer>, SigningError> {
    let signer: Arc<dyn Signer> = match key_type {
        KeyType::Hmac => Arc::new(HmacSigner::new(secret)?),
        KeyType::Rsa => Arc::new(RsaSigner::from_pkcs8_pem(secret)?),
        KeyType::Ed25519 => Arc::new(Ed25519Signer::from_pkcs8_pem(secret)?),
    };
    Ok(signer)
}

/// HMAC-SHA256 with the shared API secret, lowercase hex output
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    pub fn new(secret: &str) -> Result<Self, SigningError> {
        if secret.is_empty() {
            return Err(SigningError::InvalidSecret("secret is empty".to_string()));
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn key_type(&self) -> KeyType {
        KeyType::Hmac
    }

    fn sign(&self, payload: &str) -> Result<String, SigningError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SigningError::InvalidSecret(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// RSA PKCS#1 v1.5 over SHA-256, base64 output
pub struct RsaSigner {
    signing_key: pkcs1v15::SigningKey<Sha256>,
    public_key: RsaPublicKey,
}

impl RsaSigner {
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        expect_algorithm(pem, RSA_ENCRYPTION_OID, "RSA")?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| SigningError::KeyParse(e.to_string()))?;
        let public_key = private_key.to_public_key();

        Ok(Self {
            signing_key: pkcs1v15::SigningKey::<Sha256>::new(private_key),
            public_key,
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }
}

impl Signer for RsaSigner {
    fn key_type(&self) -> KeyType {
        KeyType::Rsa
    }

    fn sign(&self, payload: &str) -> Result<String, SigningError> {
        let signature = self
            .signing_key
            .try_sign(payload.as_bytes())
            .map_err(|e| SigningError::SignatureFailed(e.to_string()))?;
        Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
    }
}

/// Ed25519 over the raw payload bytes, base64 output
pub struct Ed25519Signer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519Signer {
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        expect_algorithm(pem, ED25519_OID, "Ed25519")?;
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| SigningError::KeyParse(e.to_string()))?;
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }
}

impl Signer for Ed25519Signer {
    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    fn sign(&self, payload: &str) -> Result<String, SigningError> {
        let signature = self.signing_key.sign(payload.as_bytes());
        Ok(general_purpose::STANDARD.encode(signature.to_bytes()))
    }
}

/// Check the PEM envelope and the PKCS#8 algorithm before handing the key
/// to the scheme-specific parser, so each failure gets its own error.
fn expect_algorithm(pem: &str, oid: &str, expected: &'static str) -> Result<(), SigningError> {
    let (label, document) =
        Document::from_pem(pem.trim()).map_err(|e| SigningError::MalformedPem(e.to_string()))?;
    if label != PKCS8_LABEL {
        return Err(SigningError::MalformedPem(format!(
            "expected a \"{}\" block, found \"{}\"",
            PKCS8_LABEL, label
        )));
    }

    let info = PrivateKeyInfo::try_from(document.as_bytes())
        .map_err(|e| SigningError::KeyParse(e.to_string()))?;
    if info.algorithm.oid.to_string() != oid {
        return Err(SigningError::WrongKeyType { expected });
    }
    Ok(())
}
