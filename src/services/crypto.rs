// src/services/crypto.rs

//! Criptografia em repouso dos segredos (config do módulo e tokens do WhatsApp).
//!
//! Formato gravado: `enc:v1:<nonce base64>:<ciphertext+tag base64>` (AES-256-GCM).

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

const ENCRYPTED_PREFIX: &str = "enc:v1:";

/// Marcador dos valores mascarados exibidos no painel.
pub const MASK_MARKER: &str = "...";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("chave de criptografia inválida: {0}")]
    InvalidKey(String),

    #[error("falha ao cifrar o valor")]
    EncryptionFailed,

    #[error("falha ao decifrar o valor: {0}")]
    DecryptionFailed(String),
}

#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(..)")
    }
}

impl SecretCipher {
    pub fn new(master_key: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(master_key);
        Self { cipher: Aes256Gcm::new(key) }
    }

    /// Aceita a chave em base64 (44 caracteres) ou hex (64 caracteres).
    pub fn from_encoded_key(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        let bytes = if encoded.len() == 64 && encoded.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(encoded).map_err(|e| CryptoError::InvalidKey(e.to_string()))?
        } else {
            STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
        };

        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("a chave deve ter 32 bytes".into()))?;
        Ok(Self::new(&key))
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(format!(
            "{}{}:{}",
            ENCRYPTED_PREFIX,
            STANDARD.encode(nonce),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Decifra um valor gravado. Valores antigos sem o prefixo voltam como estão.
    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let Some(body) = stored.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(stored.to_string());
        };

        let (nonce_b64, data_b64) = body
            .split_once(':')
            .ok_or_else(|| CryptoError::DecryptionFailed("formato inválido".into()))?;

        let nonce_bytes = STANDARD
            .decode(nonce_b64)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        if nonce_bytes.len() != 12 {
            return Err(CryptoError::DecryptionFailed("nonce com tamanho inválido".into()));
        }
        let data = STANDARD
            .decode(data_b64)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), data.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed("autenticação falhou".into()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    /// Cifra só se ainda não estiver cifrado.
    pub fn ensure_encrypted(&self, value: &str) -> Result<String, CryptoError> {
        if Self::is_encrypted(value) {
            // Garante que o valor é nosso antes de aceitá-lo
            self.decrypt(value)?;
            return Ok(value.to_string());
        }
        self.encrypt(value)
    }
}

/// SHA-256 em hex. Usado para comparar segredos e para auditoria nos logs.
pub fn fingerprint(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Prefixo de 4 caracteres + "...". Valores curtos não mostram nada.
pub fn mask(value: &str) -> String {
    if value.chars().count() <= 4 {
        return MASK_MARKER.to_string();
    }
    let prefix: String = value.chars().take(4).collect();
    format!("{prefix}{MASK_MARKER}")
}

#[cfg(test)]
pub(crate) fn test_cipher() -> SecretCipher {
    SecretCipher::new(&[7u8; 32])
}
