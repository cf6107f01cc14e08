use std::fmt;

use md5::{Digest, Md5};

/// Length in bytes of a derived cipher key.
pub const KEY_LEN: usize = 32;

/// Key derivation schemes. The tag prefixes every sealed credential so records
/// written under different schemes can live side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// Lowercase hex of the unsalted MD5 digest of the passphrase. Weak, but it is
    /// what existing ciphertexts were keyed with.
    Md5Hex,
}

impl KeyScheme {
    pub fn tag(self) -> &'static str {
        match self {
            KeyScheme::Md5Hex => "v1",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "v1" => Some(KeyScheme::Md5Hex),
            _ => None,
        }
    }
}

/// Symmetric key derived from the operator passphrase.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub scheme: KeyScheme,
    pub bytes: [u8; KEY_LEN],
}

impl fmt::Debug for KeyMaterial {
    // Never print key bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

/// Derive the cipher key for `passphrase`. Deterministic across processes.
///
/// The 128-bit digest is hex encoded and the 32 ASCII characters are used as an
/// AES-256 key.
pub fn derive_key(passphrase: &str) -> KeyMaterial {
    let digest = Md5::digest(passphrase.as_bytes());
    let encoded = hex::encode(digest);

    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(encoded.as_bytes());
    KeyMaterial {
        scheme: KeyScheme::Md5Hex,
        bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let first = derive_key("correct horse");
        let second = derive_key("correct horse");
        assert_eq!(first.bytes, second.bytes);
        assert_ne!(first.bytes, derive_key("correct horse!").bytes);
    }

    #[test]
    fn matches_hex_md5_of_passphrase() {
        let key = derive_key("password");
        assert_eq!(&key.bytes, b"5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(key.scheme, KeyScheme::Md5Hex);
    }

    #[test]
    fn debug_hides_key_bytes() {
        let rendered = format!("{:?}", derive_key("password"));
        assert!(!rendered.contains("5f4dcc3b"));
        assert!(rendered.contains("Md5Hex"));
    }

    #[test]
    fn scheme_tags_round_trip() {
        assert_eq!(KeyScheme::from_tag(KeyScheme::Md5Hex.tag()), Some(KeyScheme::Md5Hex));
        assert_eq!(KeyScheme::from_tag("v9"), None);
    }
}
