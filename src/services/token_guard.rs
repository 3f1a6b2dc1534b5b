// src/services/token_guard.rs

//! Guard de escrita das credenciais do WhatsApp de um agente.
//!
//! Um campo só é regravado quando o valor recebido é válido, a flag
//! `update_tokens` veio ligada e o hash difere do valor guardado.

use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::agent::{TokenField, TokenOutcomeView},
    services::crypto::{fingerprint, CryptoError, SecretCipher, MASK_MARKER},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Empty,
    Masked,
    TooShort,
    Whitespace,
    FlagNotSet,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::Empty => "valor vazio",
            RejectReason::Masked => "valor mascarado",
            RejectReason::TooShort => "valor abaixo do tamanho mínimo",
            RejectReason::Whitespace => "valor contém espaços",
            RejectReason::FlagNotSet => "updateTokens não informado",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdateOutcome {
    Unchanged,
    Rejected(RejectReason),
    // Valor novo, já cifrado
    Updated(String),
}

impl TokenUpdateOutcome {
    pub fn view(&self, field: TokenField) -> TokenOutcomeView {
        let (outcome, reason) = match self {
            TokenUpdateOutcome::Unchanged => ("unchanged", None),
            TokenUpdateOutcome::Rejected(reason) => ("rejected", Some(reason.to_string())),
            TokenUpdateOutcome::Updated(_) => ("updated", None),
        };
        TokenOutcomeView { field, outcome: outcome.to_string(), reason }
    }
}

/// Regras de formato, avaliadas antes da flag.
pub fn validate_token(field: TokenField, value: &str) -> Result<(), RejectReason> {
    if value.trim().is_empty() {
        return Err(RejectReason::Empty);
    }
    if value.ends_with(MASK_MARKER) {
        return Err(RejectReason::Masked);
    }
    if value.chars().any(char::is_whitespace) {
        return Err(RejectReason::Whitespace);
    }
    if value.chars().count() < field.min_len() {
        return Err(RejectReason::TooShort);
    }
    Ok(())
}

/// Decide o destino de um campo. `stored` é o valor como está no banco (cifrado ou legado).
pub fn evaluate(
    field: TokenField,
    incoming: Option<&str>,
    update_tokens: bool,
    stored: Option<&str>,
    cipher: &SecretCipher,
) -> Result<TokenUpdateOutcome, CryptoError> {
    let Some(incoming) = incoming else {
        return Ok(TokenUpdateOutcome::Unchanged);
    };

    if let Err(reason) = validate_token(field, incoming) {
        return Ok(TokenUpdateOutcome::Rejected(reason));
    }
    if !update_tokens {
        return Ok(TokenUpdateOutcome::Rejected(RejectReason::FlagNotSet));
    }

    // Valor já cifrado compara pelo texto puro
    let plaintext = cipher.decrypt(incoming)?;
    if let Err(reason) = validate_token(field, &plaintext) {
        return Ok(TokenUpdateOutcome::Rejected(reason));
    }

    if let Some(stored) = stored {
        match cipher.decrypt(stored) {
            Ok(current) if fingerprint(&current) == fingerprint(&plaintext) => {
                return Ok(TokenUpdateOutcome::Unchanged);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(field = field.column(), "⚠️ Valor guardado não decifra, será substituído: {}", e);
            }
        }
    }

    Ok(TokenUpdateOutcome::Updated(cipher.ensure_encrypted(incoming)?))
}
