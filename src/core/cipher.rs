//! Secret sealing with XChaCha20-Poly1305.
//!
//! Each secret is sealed on its own with a fresh 24-byte nonce. The item
//! key is bound as associated data, so a sealed secret moved onto another
//! record fails to open.

use crate::constants::{NONCE_LEN, SEALING_KEY_LEN};
use crate::models::item::{ItemKey, Secret};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// Keychain sealing key (256-bit). Zeroized on drop.
pub struct SealingKey([u8; SEALING_KEY_LEN]);

impl SealingKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEALING_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// `None` if `bytes` is not exactly the key length.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; SEALING_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEALING_KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl Drop for SealingKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealingKey([REDACTED])")
    }
}

pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// `class || 0 || service || 0 || account`
fn associated_data(key: &ItemKey) -> Vec<u8> {
    let class = key.class.as_str();
    let mut aad = Vec::with_capacity(class.len() + key.service.len() + key.account.len() + 2);
    aad.extend_from_slice(class.as_bytes());
    aad.push(0);
    aad.extend_from_slice(key.service.as_bytes());
    aad.push(0);
    aad.extend_from_slice(key.account.as_bytes());
    aad
}

/// Returns `None` only if the AEAD implementation rejects the input.
pub fn seal(key: &SealingKey, item: &ItemKey, plaintext: &[u8]) -> Option<Sealed> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let aad = associated_data(item);
    let ciphertext = key
        .cipher()
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .ok()?;
    Some(Sealed { nonce, ciphertext })
}

/// Returns `None` when authentication fails: wrong key, tampered data, or
/// a secret sealed for a different item.
pub fn unseal(key: &SealingKey, item: &ItemKey, sealed: &Sealed) -> Option<Secret> {
    let aad = associated_data(item);
    key.cipher()
        .decrypt(
            XNonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: &aad,
            },
        )
        .ok()
        .map(Zeroizing::new)
}
