// ABOUTME: Column-level encryption and keyed lookup hashing for secrets at rest
// ABOUTME: AES-256-GCM with prepended nonces plus HMAC-SHA256 lookup digests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Field Cryptography
//!
//! The token store never writes a plaintext secret to disk. Secret-bearing
//! columns are sealed with AES-256-GCM, each value under its own random
//! 12-byte nonce prepended to the ciphertext and base64 encoded. Columns that
//! must stay queryable (broker access/refresh tokens) are additionally
//! indexed by an HMAC-SHA256 digest keyed with the same store key, so the
//! database alone can answer "which row" without ever holding the value.

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use crate::errors::{AuthError, AuthResult};

/// AES-256-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Symmetric cipher over individual stored fields.
///
/// Construction validates the key length once; the key material is wiped
/// when the cipher is dropped.
pub struct FieldCipher {
    key: Vec<u8>,
    rng: SystemRandom,
}

impl FieldCipher {
    /// Create a cipher from a 32-byte AES-256 key.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the key is not exactly 32 bytes.
    pub fn new(key: Vec<u8>) -> AuthResult<Self> {
        if key.len() != 32 {
            return Err(AuthError::ServerError(format!(
                "encryption key must be 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt one field value. Output is base64(`[nonce][ciphertext+tag]`).
    pub fn seal(&self, plaintext: &str) -> AuthResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AuthError::ServerError("nonce generation failed".into()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| AuthError::ServerError("encryption key rejected".into()))?;
        let key = LessSafeKey::new(unbound);

        let mut data = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut data)
            .map_err(|_| AuthError::ServerError("field encryption failed".into()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data);
        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypt one field value sealed by [`Self::seal`].
    ///
    /// # Errors
    ///
    /// Any malformed input or authentication failure returns `ServerError`;
    /// the store maps that to "record not found" rather than propagating it.
    pub fn open(&self, sealed: &str) -> AuthResult<String> {
        let combined = general_purpose::STANDARD
            .decode(sealed)
            .map_err(|_| AuthError::ServerError("sealed field is not valid base64".into()))?;
        if combined.len() < NONCE_LEN {
            return Err(AuthError::ServerError("sealed field too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce_arr: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| AuthError::ServerError("sealed field nonce malformed".into()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_arr);

        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| AuthError::ServerError("encryption key rejected".into()))?;
        let key = LessSafeKey::new(unbound);

        let mut data = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut data)
            .map_err(|_| AuthError::ServerError("field decryption failed".into()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| AuthError::ServerError("decrypted field is not UTF-8".into()))
    }

    /// Keyed lookup digest of a secret value, hex encoded.
    ///
    /// Used as the indexable stand-in for broker tokens so primary-key
    /// lookups never touch the plaintext column.
    #[must_use]
    pub fn lookup_hash(&self, value: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.key);
        let tag = hmac::sign(&key, value.as_bytes());
        hex::encode(tag.as_ref())
    }
}

impl Drop for FieldCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Generate a PKCE verifier and its S256 challenge for the upstream leg.
///
/// The verifier is 43 characters of URL-safe base64 over 32 CSPRNG bytes,
/// within the RFC 7636 length bounds.
pub fn generate_pkce_pair() -> AuthResult<(String, String)> {
    use sha2::{Digest, Sha256};

    let verifier = random_token()?;
    let challenge = general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    Ok((verifier, challenge))
}

/// 32 CSPRNG bytes as unpadded URL-safe base64: the shape of every opaque
/// value the broker mints.
pub fn random_token() -> AuthResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes)
        .map_err(|_| AuthError::ServerError("system random source unavailable".into()))?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a fresh 32-byte AES-256 key from the system CSPRNG.
///
/// # Panics
///
/// Panics only if the OS random source is unavailable, which is fatal at
/// process startup anyway.
#[must_use]
pub fn generate_encryption_key() -> [u8; 32] {
    let rng = SystemRandom::new();
    let mut key = [0u8; 32];
    rng.fill(&mut key)
        .expect("system random source unavailable");
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let cipher = FieldCipher::new(generate_encryption_key().to_vec()).unwrap();
        let sealed = cipher.seal("gho_supersecret").unwrap();
        assert_ne!(sealed, "gho_supersecret");
        assert_eq!(cipher.open(&sealed).unwrap(), "gho_supersecret");
    }

    #[test]
    fn nonces_are_independent() {
        let cipher = FieldCipher::new(generate_encryption_key().to_vec()).unwrap();
        let a = cipher.seal("same value").unwrap();
        let b = cipher.seal("same value").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let cipher = FieldCipher::new(generate_encryption_key().to_vec()).unwrap();
        let other = FieldCipher::new(generate_encryption_key().to_vec()).unwrap();
        let sealed = cipher.seal("secret").unwrap();
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn lookup_hash_is_deterministic_and_keyed() {
        let key = generate_encryption_key().to_vec();
        let cipher = FieldCipher::new(key.clone()).unwrap();
        let again = FieldCipher::new(key).unwrap();
        assert_eq!(cipher.lookup_hash("bat_x"), again.lookup_hash("bat_x"));

        let other = FieldCipher::new(generate_encryption_key().to_vec()).unwrap();
        assert_ne!(cipher.lookup_hash("bat_x"), other.lookup_hash("bat_x"));
    }

    #[test]
    fn short_key_rejected() {
        assert!(FieldCipher::new(vec![0u8; 16]).is_err());
    }

    #[test]
    fn pkce_pair_is_consistent() {
        use sha2::{Digest, Sha256};
        let (verifier, challenge) = generate_pkce_pair().unwrap();
        let expected = general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        assert_eq!(challenge, expected);
        assert_eq!(verifier.len(), 43);
    }
}
