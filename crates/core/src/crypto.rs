use std::fmt;

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, OsRng},
};
use rand::RngCore;

use crate::error::CoreError;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 24;

/// Symmetric key shared out-of-band between the collaborators of a room.
/// Never sent to a backend.
#[derive(Clone, PartialEq, Eq)]
pub struct RoomKey([u8; KEY_LEN]);

impl RoomKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Parse the hex form used in share links.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CoreError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", v.len())))?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

/// Ciphertext plus the IV it was sealed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypt with XChaCha20-Poly1305 under a fresh random IV.
///
/// Encrypting the same plaintext twice gives different ciphertexts, so
/// callers must compare scene versions, not ciphertexts.
pub fn encrypt(key: &RoomKey, plaintext: &[u8]) -> Result<EncryptedPayload, CoreError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&iv), plaintext)
        .map_err(|_| CoreError::Encryption)?;

    Ok(EncryptedPayload {
        iv: iv.to_vec(),
        ciphertext,
    })
}

/// Open a payload sealed by [`encrypt`]. A wrong key, a wrong IV, or any
/// tampering fails with [`CoreError::Decryption`] and yields no plaintext.
pub fn decrypt(iv: &[u8], ciphertext: &[u8], key: &RoomKey) -> Result<Vec<u8>, CoreError> {
    if iv.len() != IV_LEN {
        return Err(CoreError::Decryption);
    }
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;

    cipher
        .decrypt(XNonce::from_slice(iv), ciphertext)
        .map_err(|_| CoreError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = RoomKey::generate();
        let sealed = encrypt(&key, b"scene bytes").unwrap();
        assert_eq!(sealed.iv.len(), IV_LEN);
        let opened = decrypt(&sealed.iv, &sealed.ciphertext, &key).unwrap();
        assert_eq!(opened, b"scene bytes");
    }

    #[test]
    fn same_plaintext_different_ciphertext() {
        let key = RoomKey::generate();
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt(&RoomKey::generate(), b"secret").unwrap();
        let result = decrypt(&sealed.iv, &sealed.ciphertext, &RoomKey::generate());
        assert!(matches!(result, Err(CoreError::Decryption)));
    }

    #[test]
    fn tampered_payload_fails() {
        let key = RoomKey::generate();
        let mut sealed = encrypt(&key, b"secret").unwrap();
        sealed.ciphertext[0] ^= 0xff;
        assert!(matches!(
            decrypt(&sealed.iv, &sealed.ciphertext, &key),
            Err(CoreError::Decryption)
        ));

        let sealed = encrypt(&key, b"secret").unwrap();
        assert!(matches!(
            decrypt(&sealed.iv[..12], &sealed.ciphertext, &key),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn hex_roundtrip() {
        let key = RoomKey::generate();
        let parsed = RoomKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed, key);
        assert!(matches!(RoomKey::from_hex("abcd"), Err(CoreError::InvalidKey(_))));
        assert!(matches!(RoomKey::from_hex("zz"), Err(CoreError::InvalidKey(_))));
    }
}
