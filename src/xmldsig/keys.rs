use std::fmt;
use std::path::PathBuf;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::Certificate;
use x509_cert::der::{Decode, DecodePem, Encode};

use crate::core::CpeError;

/// Signing certificate plus its RSA private key.
#[derive(Clone)]
pub struct KeyMaterial {
    certificate: Certificate,
    private_key: RsaPrivateKey,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("subject", &self.subject())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl KeyMaterial {
    /// Pair a certificate with its key, checking that they match.
    pub fn new(certificate: Certificate, private_key: RsaPrivateKey) -> Result<Self, CpeError> {
        let cert_key = certificate_public_key(&certificate)
            .map_err(|e| CpeError::KeyLoad(e.to_string()))?;
        if cert_key != private_key.to_public_key() {
            return Err(CpeError::KeyLoad(
                "private key does not match the certificate".into(),
            ));
        }
        Ok(Self {
            certificate,
            private_key,
        })
    }

    /// Load from PEM text. The key may be PKCS#8 (`PRIVATE KEY`) or
    /// PKCS#1 (`RSA PRIVATE KEY`).
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, CpeError> {
        let certificate = Certificate::from_pem(cert_pem.as_bytes())
            .map_err(|e| CpeError::KeyLoad(format!("certificate: {e}")))?;
        let private_key = match RsaPrivateKey::from_pkcs8_pem(key_pem) {
            Ok(key) => key,
            Err(e) if key_pem.contains("BEGIN RSA PRIVATE KEY") => {
                RsaPrivateKey::from_pkcs1_pem(key_pem)
                    .map_err(|e1| CpeError::KeyLoad(format!("private key: {e1} (PKCS#8: {e})")))?
            }
            Err(e) => return Err(key_error(e)),
        };
        Self::new(certificate, private_key)
    }

    /// Load from DER bytes (PKCS#8 or PKCS#1 key).
    pub fn from_der(cert_der: &[u8], key_der: &[u8]) -> Result<Self, CpeError> {
        let certificate = Certificate::from_der(cert_der)
            .map_err(|e| CpeError::KeyLoad(format!("certificate: {e}")))?;
        let private_key = match RsaPrivateKey::from_pkcs8_der(key_der) {
            Ok(key) => key,
            Err(e @ rsa::pkcs8::Error::PublicKey(_)) => return Err(key_error(e)),
            Err(_) => RsaPrivateKey::from_pkcs1_der(key_der)
                .map_err(|e| CpeError::KeyLoad(format!("private key: {e}")))?,
        };
        Self::new(certificate, private_key)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// DER encoding of the certificate, as embedded in `ds:X509Certificate`.
    pub fn certificate_der(&self) -> Result<Vec<u8>, CpeError> {
        self.certificate
            .to_der()
            .map_err(|e| CpeError::Signing(format!("certificate encoding: {e}")))
    }

    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }
}

fn key_error(e: rsa::pkcs8::Error) -> CpeError {
    match e {
        rsa::pkcs8::Error::PublicKey(rsa::pkcs8::spki::Error::OidUnknown { oid }) => {
            CpeError::KeyLoad(format!("key is not RSA (algorithm {oid})"))
        }
        other => CpeError::KeyLoad(format!("private key: {other}")),
    }
}

/// RSA public key from a certificate's SubjectPublicKeyInfo.
pub(crate) fn certificate_public_key(cert: &Certificate) -> Result<RsaPublicKey, CpeError> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| CpeError::Verification(format!("certificate key: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| CpeError::Verification(format!("certificate key is not RSA: {e}")))
}

/// Source of signing key material.
///
/// Implementations decide where keys live (files, PKCS#12 stores, HSM
/// exports). Material is loaded per call and not cached by the pipeline.
pub trait KeyProvider: Send + Sync {
    fn load(&self) -> Result<KeyMaterial, CpeError>;
}

/// Reads a PEM certificate and PEM private key from disk.
#[derive(Debug, Clone)]
pub struct PemKeyProvider {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl PemKeyProvider {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

impl KeyProvider for PemKeyProvider {
    fn load(&self) -> Result<KeyMaterial, CpeError> {
        let read = |path: &PathBuf| {
            std::fs::read_to_string(path)
                .map_err(|e| CpeError::KeyLoad(format!("{}: {e}", path.display())))
        };
        KeyMaterial::from_pem(&read(&self.cert_path)?, &read(&self.key_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &str = include_str!("../../tests/fixtures/signer_cert.pem");
    const KEY: &str = include_str!("../../tests/fixtures/signer_key.pem");
    const KEY_PKCS1: &str = include_str!("../../tests/fixtures/signer_key_pkcs1.pem");
    const OTHER_KEY: &str = include_str!("../../tests/fixtures/other_key.pem");
    const EC_KEY: &str = include_str!("../../tests/fixtures/ec_key.pem");

    #[test]
    fn loads_pkcs8_and_pkcs1() {
        let a = KeyMaterial::from_pem(CERT, KEY).unwrap();
        let b = KeyMaterial::from_pem(CERT, KEY_PKCS1).unwrap();
        assert_eq!(
            a.private_key().to_public_key(),
            b.private_key().to_public_key()
        );
        assert!(a.subject().contains("CN=20123456789"));
    }

    #[test]
    fn mismatched_key_rejected() {
        let err = KeyMaterial::from_pem(CERT, OTHER_KEY).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn ec_key_is_not_rsa() {
        let err = KeyMaterial::from_pem(CERT, EC_KEY).unwrap_err();
        assert!(matches!(err, CpeError::KeyLoad(_)));
        assert!(err.to_string().contains("not RSA"));
    }

    #[test]
    fn garbage_certificate() {
        let err = KeyMaterial::from_pem("not a pem", KEY).unwrap_err();
        assert!(err.to_string().contains("certificate"));
    }

    #[test]
    fn debug_redacts_key() {
        let km = KeyMaterial::from_pem(CERT, KEY).unwrap();
        let dbg = format!("{km:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("BEGIN"));
    }

    #[test]
    fn provider_reads_files() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
        let provider = PemKeyProvider::new(
            format!("{dir}/signer_cert.pem"),
            format!("{dir}/signer_key.pem"),
        );
        assert!(provider.load().is_ok());

        let missing = PemKeyProvider::new(format!("{dir}/nope.pem"), format!("{dir}/signer_key.pem"));
        assert!(matches!(missing.load(), Err(CpeError::KeyLoad(_))));
    }
}
