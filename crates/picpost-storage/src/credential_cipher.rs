//! AES-256-GCM sealing of user credentials before they are persisted.
//!
//! Raw layout: nonce (12 bytes) || ciphertext || tag (16 bytes).
//! Stored text: `<scheme tag>:<base64 of the raw layout>`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use crate::key_derivation::{KeyMaterial, KeyScheme};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

const SCHEME_SEPARATOR: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("cipher init failed: {0}")]
    Init(String),
    #[error("nonce generation failed: {0}")]
    Nonce(String),
    #[error("encrypt failed: {0}")]
    Seal(String),
    #[error("malformed sealed credential: {0}")]
    Malformed(String),
}

/// Encrypt-only transform for passwords; no decrypt is exposed.
pub struct CredentialCipher {
    scheme: KeyScheme,
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(key: &KeyMaterial) -> Result<Self, CipherError> {
        let cipher =
            Aes256Gcm::new_from_slice(&key.bytes).map_err(|e| CipherError::Init(e.to_string()))?;
        Ok(Self {
            scheme: key.scheme,
            cipher,
        })
    }

    /// Seal `plaintext` under a fresh random nonce, no associated data.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| CipherError::Nonce(e.to_string()))?;

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CipherError::Seal(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Seal a password into the text form stored on user records.
    pub fn seal_password(&self, password: &str) -> Result<String, CipherError> {
        let raw = self.encrypt(password.as_bytes())?;
        Ok(format!(
            "{}{SCHEME_SEPARATOR}{}",
            self.scheme.tag(),
            STANDARD.encode(raw)
        ))
    }
}

/// A stored credential split into its scheme and raw sealed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCredential {
    pub scheme: KeyScheme,
    pub raw: Vec<u8>,
}

impl SealedCredential {
    pub fn parse(stored: &str) -> Result<Self, CipherError> {
        let (tag, body) = stored
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| CipherError::Malformed("missing scheme tag".to_string()))?;
        let scheme = KeyScheme::from_tag(tag)
            .ok_or_else(|| CipherError::Malformed(format!("unknown scheme {tag:?}")))?;
        let raw = STANDARD
            .decode(body)
            .map_err(|e| CipherError::Malformed(e.to_string()))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Malformed(format!(
                "expected at least {} bytes, got {}",
                NONCE_LEN + TAG_LEN,
                raw.len()
            )));
        }
        Ok(Self { scheme, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_derivation::derive_key;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(&derive_key("password")).expect("cipher")
    }

    fn open(key: &KeyMaterial, raw: &[u8]) -> Vec<u8> {
        let cipher = Aes256Gcm::new_from_slice(&key.bytes).expect("cipher");
        cipher
            .decrypt(Nonce::from_slice(&raw[..NONCE_LEN]), &raw[NONCE_LEN..])
            .expect("decrypt")
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = cipher();
        let first = cipher.encrypt(b"hunter2").expect("encrypt");
        let second = cipher.encrypt(b"hunter2").expect("encrypt");

        assert_ne!(first, second);
        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
    }

    #[test]
    fn output_carries_nonce_ciphertext_and_tag() {
        let cipher = cipher();
        let inputs: [&[u8]; 3] = [b"", b"hunter2", &[7u8; 100]];
        for plaintext in inputs {
            let raw = cipher.encrypt(plaintext).expect("encrypt");
            assert_eq!(raw.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
        }
    }

    #[test]
    fn ciphertext_opens_with_key_rederived_from_passphrase() {
        let raw = cipher().encrypt(b"hunter2").expect("encrypt");
        let plaintext = open(&derive_key("password"), &raw);
        assert_eq!(plaintext, b"hunter2");
    }

    #[test]
    fn sealed_password_is_tagged_and_parseable() {
        let stored = cipher().seal_password("hunter2").expect("seal");
        assert!(stored.starts_with("v1:"));
        assert!(!stored.contains("hunter2"));

        let sealed = SealedCredential::parse(&stored).expect("parse");
        assert_eq!(sealed.scheme, KeyScheme::Md5Hex);
        assert_eq!(sealed.raw.len(), NONCE_LEN + "hunter2".len() + TAG_LEN);
        assert_eq!(open(&derive_key("password"), &sealed.raw), b"hunter2");
    }

    #[test]
    fn parse_rejects_unknown_scheme_and_short_body() {
        assert!(matches!(
            SealedCredential::parse("v7:AAAA"),
            Err(CipherError::Malformed(_))
        ));
        assert!(matches!(
            SealedCredential::parse("v1:AAAA"),
            Err(CipherError::Malformed(_))
        ));
        assert!(matches!(
            SealedCredential::parse("no-tag"),
            Err(CipherError::Malformed(_))
        ));
    }
}
