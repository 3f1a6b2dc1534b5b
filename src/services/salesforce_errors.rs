// src/services/salesforce_errors.rs

//! Tradução dos erros do REST do Salesforce para o formato exibido no painel.
//! Aqui só se classifica; quem decide repetir a chamada é o cliente.

use serde::Deserialize;

use crate::models::salesforce::{
    ClassifiedSalesforceError, SalesforceApiError, SalesforceErrorKind, Severity,
};

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

pub fn classify(http_status: u16, body: &str) -> ClassifiedSalesforceError {
    // REST: array de erros; o primeiro é o relevante
    if let Ok(errors) = serde_json::from_str::<Vec<SalesforceApiError>>(body) {
        if let Some(first) = errors.into_iter().next() {
            return classify_api_error(http_status, first);
        }
    }

    // Endpoint OAuth: {"error": "...", "error_description": "..."}
    if let Ok(oauth) = serde_json::from_str::<OAuthErrorBody>(body) {
        let kind = match oauth.error.as_str() {
            "invalid_grant" | "invalid_token" => SalesforceErrorKind::SessionExpired,
            _ => SalesforceErrorKind::Unknown,
        };
        return build(
            http_status,
            oauth.error.to_uppercase(),
            kind,
            oauth.error_description.unwrap_or(oauth.error),
            Vec::new(),
        );
    }

    let kind = if http_status == 401 {
        SalesforceErrorKind::SessionExpired
    } else {
        SalesforceErrorKind::Unknown
    };
    build(http_status, format!("HTTP_{http_status}"), kind, body.trim().to_string(), Vec::new())
}

fn classify_api_error(http_status: u16, error: SalesforceApiError) -> ClassifiedSalesforceError {
    let kind = match error.error_code.as_str() {
        "INVALID_CROSS_REFERENCE_KEY" if touches_record_type(&error) => {
            SalesforceErrorKind::InvalidRecordType
        }
        "INVALID_CROSS_REFERENCE_KEY" => SalesforceErrorKind::InvalidCrossReference,
        "REQUIRED_FIELD_MISSING" => SalesforceErrorKind::RequiredFieldMissing,
        "DUPLICATE_VALUE" | "DUPLICATES_DETECTED" => SalesforceErrorKind::DuplicateValue,
        "INVALID_SESSION_ID" => SalesforceErrorKind::SessionExpired,
        "UNABLE_TO_LOCK_ROW" => SalesforceErrorKind::RowLock,
        "FIELD_CUSTOM_VALIDATION_EXCEPTION" => SalesforceErrorKind::ValidationRule,
        "INVALID_FIELD" | "INVALID_FIELD_FOR_INSERT_UPDATE" => SalesforceErrorKind::InvalidField,
        "MALFORMED_QUERY" | "INVALID_QUERY_FILTER_OPERATOR" => SalesforceErrorKind::MalformedQuery,
        _ if http_status == 401 => SalesforceErrorKind::SessionExpired,
        _ => SalesforceErrorKind::Unknown,
    };
    build(http_status, error.error_code, kind, error.message, error.fields)
}

fn touches_record_type(error: &SalesforceApiError) -> bool {
    error.fields.iter().any(|f| f.eq_ignore_ascii_case("RecordTypeId"))
        || error.message.contains("RecordType")
}

fn build(
    http_status: u16,
    code: String,
    kind: SalesforceErrorKind,
    message: String,
    fields: Vec<String>,
) -> ClassifiedSalesforceError {
    let ignorable = kind == SalesforceErrorKind::InvalidRecordType;
    ClassifiedSalesforceError {
        code,
        kind,
        suggestion: suggestion(kind, &fields),
        severity: if ignorable { Severity::Warning } else { Severity::Error },
        ignorable,
        message,
        fields,
        http_status,
    }
}

fn suggestion(kind: SalesforceErrorKind, fields: &[String]) -> String {
    let field_list = if fields.is_empty() { "o campo".to_string() } else { fields.join(", ") };
    match kind {
        SalesforceErrorKind::InvalidRecordType => {
            "O record type configurado não existe nesta org; a oportunidade usa o padrão. \
             Revise salesforce_record_type_* na configuração."
                .into()
        }
        SalesforceErrorKind::InvalidCrossReference => {
            format!("Referência inválida em {field_list}: confira se o Id existe e é acessível ao usuário da integração.")
        }
        SalesforceErrorKind::RequiredFieldMissing => {
            format!("Campo obrigatório ausente: {field_list}. Complete os dados do lead e reprocesse.")
        }
        SalesforceErrorKind::DuplicateValue => {
            "Registro duplicado no Salesforce: revise as regras de duplicidade ou o e-mail do lead."
                .into()
        }
        SalesforceErrorKind::SessionExpired => {
            "Sessão do Salesforce expirada: reconecte a integração pelo fluxo OAuth.".into()
        }
        SalesforceErrorKind::RowLock => {
            "Registro bloqueado por outra operação: tente reprocessar em alguns instantes.".into()
        }
        SalesforceErrorKind::ValidationRule => {
            "Uma regra de validação da org rejeitou o registro: revise a mensagem e os dados.".into()
        }
        SalesforceErrorKind::InvalidField => {
            format!("Campo inexistente ou sem permissão: {field_list}. Verifique o layout do objeto.")
        }
        SalesforceErrorKind::MalformedQuery => {
            "Consulta SOQL inválida: verifique os campos personalizados usados na busca.".into()
        }
        SalesforceErrorKind::Unknown => {
            "Erro não catalogado do Salesforce: consulte a mensagem original.".into()
        }
    }
}
