use base64::{engine::general_purpose::STANDARD, Engine};
use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::EngineError;

/// Envelope-encrypts SMTP account passwords before they reach the database,
/// and decrypts them back into memory right before a connection is opened.
/// Ciphertext layout is `nonce || sealed_bytes`, base64-encoded for storage
/// in a text column.
pub struct Crypto {
    key_bytes: [u8; 32],
}

struct SingleUseNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for SingleUseNonce {
    fn advance(&mut self) -> Result<Nonce, Unspecified> {
        let bytes = self.0.take().ok_or(Unspecified)?;
        Ok(Nonce::assume_unique_for_key(bytes))
    }
}

impl Crypto {
    pub fn from_base64_key(key_base64: &str) -> Result<Self, EngineError> {
        let raw = STANDARD
            .decode(key_base64)
            .map_err(|e| EngineError::Internal(format!("invalid encryption key encoding: {e}")))?;

        let key_bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| EngineError::Internal("encryption key must be 32 bytes".into()))?;

        Ok(Self { key_bytes })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EngineError> {
        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)
            .map_err(|_| EngineError::Internal("failed to generate nonce".into()))?;

        let unbound = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_| EngineError::Internal("invalid key material".into()))?;
        let mut sealing_key = SealingKey::new(unbound, SingleUseNonce(Some(nonce_bytes)));

        let mut in_out = plaintext.as_bytes().to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| EngineError::Internal("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, EngineError> {
        let raw = STANDARD
            .decode(ciphertext_b64)
            .map_err(|e| EngineError::Internal(format!("invalid ciphertext encoding: {e}")))?;

        if raw.len() < NONCE_LEN {
            return Err(EngineError::Internal("ciphertext too short".into()));
        }
        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let mut nonce_arr = [0u8; NONCE_LEN];
        nonce_arr.copy_from_slice(nonce_bytes);

        let unbound = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_| EngineError::Internal("invalid key material".into()))?;
        let mut opening_key = OpeningKey::new(unbound, SingleUseNonce(Some(nonce_arr)));

        let mut in_out = sealed.to_vec();
        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| EngineError::Internal("decryption failed, key or ciphertext mismatch".into()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| EngineError::Internal("decrypted payload is not valid utf-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_crypto() -> Crypto {
        let key = STANDARD.encode([7u8; 32]);
        Crypto::from_base64_key(&key).unwrap()
    }

    #[test]
    fn round_trips_a_password() {
        let crypto = test_crypto();
        let ciphertext = crypto.encrypt("correct horse battery staple").unwrap();
        assert_ne!(ciphertext, "correct horse battery staple");
        let plaintext = crypto.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, "correct horse battery staple");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let crypto = test_crypto();
        let mut ciphertext = STANDARD.decode(crypto.encrypt("hunter2").unwrap()).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        let tampered = STANDARD.encode(ciphertext);
        assert!(crypto.decrypt(&tampered).is_err());
    }

    #[test]
    fn rejects_malformed_key_length() {
        let short_key = STANDARD.encode([1u8; 16]);
        assert!(Crypto::from_base64_key(&short_key).is_err());
    }
}
