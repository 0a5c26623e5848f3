//! AES-256-CBC with PKCS#7 padding and a random IV per message.

use crate::errors::CredentialError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Symmetric key for credential blobs, wiped from memory on drop
#[derive(Clone)]
pub struct CredentialKey(Zeroizing<[u8; KEY_LEN]>);

impl CredentialKey {
    /// Fresh random key from the OS generator
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CredentialError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CredentialError::Crypto(format!(
                "Key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(array)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey(<redacted>)")
    }
}

/// IV and ciphertext of one encrypted secret
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedCredentialBlob {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

impl fmt::Debug for EncryptedCredentialBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedCredentialBlob")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

impl EncryptedCredentialBlob {
    /// `iv || ciphertext`, the layout written to shared memory
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        if bytes.len() < IV_LEN + BLOCK_LEN {
            return Err(CredentialError::Crypto(format!(
                "Encrypted blob too short: {} bytes",
                bytes.len()
            )));
        }
        let (iv, ciphertext) = bytes.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CredentialError::Crypto(
                "Ciphertext is not a whole number of blocks".to_string(),
            ));
        }
        let mut iv_array = [0u8; IV_LEN];
        iv_array.copy_from_slice(iv);
        Ok(Self {
            iv: iv_array,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| CredentialError::Crypto(format!("Blob is not valid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// Encrypt with a fresh random IV
pub fn encrypt(plaintext: &[u8], key: &CredentialKey) -> EncryptedCredentialBlob {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let cipher = Aes256CbcEnc::new(key.as_bytes().into(), iv.as_slice().into());
    EncryptedCredentialBlob {
        iv,
        ciphertext: cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext),
    }
}

/// Decrypt a blob; wrong keys and corrupted data fail with
/// [`CredentialError::Crypto`].
pub fn decrypt(
    blob: &EncryptedCredentialBlob,
    key: &CredentialKey,
) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    let cipher = Aes256CbcDec::new(key.as_bytes().into(), blob.iv.as_slice().into());
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&blob.ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CredentialError::Crypto("Decryption failed: bad key or corrupted data".into()))
}

/// Decrypt a blob that must hold UTF-8 text
pub fn decrypt_string(
    blob: &EncryptedCredentialBlob,
    key: &CredentialKey,
) -> Result<Zeroizing<String>, CredentialError> {
    let bytes = decrypt(blob, key)?;
    std::str::from_utf8(&bytes)
        .map(|text| Zeroizing::new(text.to_owned()))
        .map_err(|_| CredentialError::Crypto("Decrypted secret is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = CredentialKey::generate();
        let blob = encrypt(b"s3cr3t-p@ss", &key);
        assert_eq!(decrypt(&blob, &key).unwrap().as_slice(), b"s3cr3t-p@ss");
    }

    #[test]
    fn fresh_iv_per_call() {
        let key = CredentialKey::generate();
        let a = encrypt(b"same", &key);
        let b = encrypt(b"same", &key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_is_a_crypto_error() {
        let blob = encrypt(b"jdupont", &CredentialKey::generate());
        // A random key almost always breaks the padding; when it happens to
        // produce valid padding the plaintext still differs.
        match decrypt(&blob, &CredentialKey::generate()) {
            Err(CredentialError::Crypto(_)) => {}
            Ok(bytes) => assert_ne!(bytes.as_slice(), b"jdupont"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn serialized_layout_prepends_iv() {
        let key = CredentialKey::generate();
        let blob = encrypt(b"x", &key);
        let bytes = blob.to_bytes();
        assert_eq!(&bytes[..IV_LEN], &blob.iv);
        assert_eq!(bytes.len(), IV_LEN + 16);
        let parsed = EncryptedCredentialBlob::from_bytes(&bytes).unwrap();
        assert_eq!(decrypt(&parsed, &key).unwrap().as_slice(), b"x");
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(EncryptedCredentialBlob::from_bytes(&[0u8; 20]).is_err());
        assert!(EncryptedCredentialBlob::from_base64("not base64!").is_err());
    }

    #[test]
    fn key_length_is_checked() {
        assert!(CredentialKey::from_slice(&[1u8; 16]).is_err());
        assert!(CredentialKey::from_slice(&[1u8; 32]).is_ok());
    }
}
