//! AEAD primitives for keyloft.
//!
//! Secret values are encrypted with AES-256-GCM: confidentiality and
//! integrity in one pass, no separate MAC. The 16-byte authentication tag is
//! appended to the ciphertext (the `aes-gcm` postfix layout), so a stored
//! value is always `ciphertext || tag` plus a 12-byte IV kept alongside it.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key};
use rand_core::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Symmetric key length (256-bit).
pub const KEY_LEN: usize = 32;
/// GCM IV length (96-bit).
pub const IV_LEN: usize = 12;
/// GCM authentication tag length, appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// 256-bit symmetric key material. Zeroed on drop, never printed.
#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct KeyMaterial(Zeroizing<[u8; KEY_LEN]>);

#[derive(Debug, Error)]
#[error("key must be exactly {KEY_LEN} bytes")]
pub struct KeyLengthError;

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyLengthError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyLengthError)?;
        Ok(KeyMaterial(Zeroizing::new(array)))
    }
}

/// Generate fresh 256-bit key material from the OS random source.
pub fn generate_key() -> KeyMaterial {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand_core::OsRng.fill_bytes(key.as_mut());
    KeyMaterial(key)
}

/// Per-operation initialization vector. Unique per encryption, never reused
/// with the same key.
pub struct Iv(pub [u8; IV_LEN]);

#[derive(Debug, Error)]
#[error("IV must be exactly {IV_LEN} bytes")]
pub struct IvLengthError;

impl Iv {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IvLengthError> {
        let array: [u8; IV_LEN] = bytes.try_into().map_err(|_| IvLengthError)?;
        Ok(Iv(array))
    }
}

/// AEAD output: ciphertext with the 16-byte tag appended.
pub struct Ciphertext(pub Vec<u8>);

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("plaintext must not be empty")]
    EmptyPlaintext,
    #[error("AEAD encryption failed")]
    AeadFailed(aes_gcm::Error),
}

/// AEAD encrypt under a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &KeyMaterial) -> Result<(Iv, Ciphertext), EncryptError> {
    if plaintext.is_empty() {
        return Err(EncryptError::EmptyPlaintext);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut iv_bytes = [0u8; IV_LEN];
    rand_core::OsRng.fill_bytes(&mut iv_bytes);

    let nonce = aes_gcm::Nonce::from_slice(&iv_bytes);
    let ct = cipher
        .encrypt(nonce, plaintext)
        .map_err(EncryptError::AeadFailed)?;

    Ok((Iv(iv_bytes), Ciphertext(ct)))
}

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("ciphertext too short to carry an authentication tag")]
    TooShort,
    #[error("AEAD authentication failed")]
    AuthenticationFailed,
}

/// AEAD decrypt. The trailing 16 bytes of `ciphertext` are verified as the
/// authentication tag; any mismatch (tampering, wrong key, wrong IV) is a hard
/// failure and no plaintext is returned.
pub fn decrypt(
    ciphertext: &[u8],
    iv: &Iv,
    key: &KeyMaterial,
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    if ciphertext.len() < TAG_LEN {
        return Err(DecryptError::TooShort);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = aes_gcm::Nonce::from_slice(&iv.0);

    let pt = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| DecryptError::AuthenticationFailed)?;

    Ok(Zeroizing::new(pt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = generate_key();
        let (iv, ct) = encrypt(b"s3cr3t", &key).unwrap();
        let pt = decrypt(&ct.0, &iv, &key).unwrap();
        assert_eq!(&pt[..], b"s3cr3t");
    }

    #[test]
    fn ciphertext_carries_appended_tag() {
        let key = generate_key();
        let (_, ct) = encrypt(b"hello", &key).unwrap();
        assert_eq!(ct.0.len(), 5 + TAG_LEN);
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let key = generate_key();
        let (iv1, ct1) = encrypt(b"hello", &key).unwrap();
        let (iv2, ct2) = encrypt(b"hello", &key).unwrap();
        assert_ne!(iv1.0, iv2.0, "IV must be fresh per operation");
        assert_ne!(ct1.0, ct2.0);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_key();
        let (iv, mut ct) = encrypt(b"hello", &key).unwrap();

        ct.0[0] ^= 0x01;
        assert!(matches!(
            decrypt(&ct.0, &iv, &key),
            Err(DecryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_tag_fails() {
        let key = generate_key();
        let (iv, mut ct) = encrypt(b"hello", &key).unwrap();

        let last = ct.0.len() - 1;
        ct.0[last] ^= 0x01;
        assert!(matches!(
            decrypt(&ct.0, &iv, &key),
            Err(DecryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_iv_fails() {
        let key = generate_key();
        let (iv, ct) = encrypt(b"hello", &key).unwrap();

        let mut bad_iv = Iv(iv.0);
        bad_iv.0[0] ^= 0x01;
        assert!(matches!(
            decrypt(&ct.0, &bad_iv, &key),
            Err(DecryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let key = generate_key();
        let other = generate_key();
        let (iv, ct) = encrypt(b"hello", &key).unwrap();

        assert!(matches!(
            decrypt(&ct.0, &iv, &other),
            Err(DecryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn empty_plaintext_rejected() {
        let key = generate_key();
        assert!(matches!(
            encrypt(b"", &key),
            Err(EncryptError::EmptyPlaintext)
        ));
    }

    #[test]
    fn short_ciphertext_rejected() {
        let key = generate_key();
        let iv = Iv([0u8; IV_LEN]);
        assert!(matches!(
            decrypt(&[0u8; TAG_LEN - 1], &iv, &key),
            Err(DecryptError::TooShort)
        ));
    }

    #[test]
    fn key_material_validates_length() {
        assert!(KeyMaterial::from_bytes(&[0u8; 31]).is_err());
        assert!(KeyMaterial::from_bytes(&[0u8; 33]).is_err());
        assert!(KeyMaterial::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn iv_validates_length() {
        assert!(Iv::from_slice(&[0u8; 11]).is_err());
        assert!(Iv::from_slice(&[0u8; 13]).is_err());
        assert!(Iv::from_slice(&[0u8; 12]).is_ok());
    }

    #[test]
    fn sensitive_types_impl_zeroize() {
        fn assert_zeroize<T: zeroize::Zeroize>() {}
        assert_zeroize::<KeyMaterial>();
    }
}
