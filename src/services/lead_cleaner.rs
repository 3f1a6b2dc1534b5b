// src/services/lead_cleaner.rs

use serde_json::Value;

use crate::models::{facebook::GraphLead, lead::CleanedLead};

/// Normaliza o `field_data` cru do Graph API num `CleanedLead`.
#[derive(Debug, Clone)]
pub struct LeadCleaner {
    default_country_code: String,
}

impl LeadCleaner {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        let code: String = default_country_code.into();
        Self { default_country_code: code.trim_start_matches('+').to_string() }
    }

    pub fn clean(&self, lead: &GraphLead) -> CleanedLead {
        let mut cleaned = CleanedLead {
            campaign_name: lead.campaign_name.clone(),
            form_id: lead.form_id.clone(),
            ..Default::default()
        };

        for field in &lead.field_data {
            let values: Vec<&str> = field
                .values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            let Some(first) = values.first().copied() else {
                continue;
            };

            match normalize_key(&field.name).as_str() {
                "full_name" | "nombre_completo" | "nombre_y_apellido" | "name" => {
                    cleaned.full_name = Some(title_case(first))
                }
                "first_name" | "nombre" | "nombres" => cleaned.first_name = Some(title_case(first)),
                "last_name" | "apellido" | "apellidos" => cleaned.last_name = Some(title_case(first)),
                "email" | "correo" | "correo_electronico" => cleaned.email = sanitize_email(first),
                "phone_number" | "phone" | "telefono" | "celular" | "whatsapp" => {
                    cleaned.phone = format_phone(first, &self.default_country_code)
                }
                "city" | "ciudad" => cleaned.city = Some(title_case(first)),
                "project" | "proyecto" | "proyecto_de_interes" => {
                    cleaned.project = Some(first.to_string())
                }
                other => {
                    let value = if values.len() == 1 {
                        Value::String(first.to_string())
                    } else {
                        Value::from(values.iter().map(|v| v.to_string()).collect::<Vec<_>>())
                    };
                    cleaned.extra.insert(other.to_string(), value);
                }
            }
        }

        // Nome completo -> nome/sobrenome quando o formulário não separa
        if cleaned.first_name.is_none() && cleaned.last_name.is_none() {
            if let Some(full) = &cleaned.full_name {
                let (first, last) = split_name(full);
                cleaned.first_name = first;
                cleaned.last_name = last;
            }
        }
        if cleaned.full_name.is_none() {
            let joined = [cleaned.first_name.as_deref(), cleaned.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !joined.is_empty() {
                cleaned.full_name = Some(joined);
            }
        }

        cleaned
    }
}

fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Divide um nome completo em (nome, sobrenome).
/// 3 palavras: 1 nome + 2 sobrenomes; 4 ou mais: 2 nomes + o resto.
pub fn split_name(full_name: &str) -> (Option<String>, Option<String>) {
    let words: Vec<&str> = full_name.split_whitespace().collect();
    let (first, last): (&[&str], &[&str]) = match words.len() {
        0 => return (None, None),
        1 => (&words[..1], &[]),
        2 | 3 => (&words[..1], &words[1..]),
        _ => (&words[..2], &words[2..]),
    };
    let join = |parts: &[&str]| Some(parts.join(" ")).filter(|s| !s.is_empty());
    (join(first), join(last))
}

/// Telefone em formato `+<dígitos>`. Números nacionais recebem o código do país.
pub fn format_phone(raw: &str, country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let international = trimmed.starts_with('+');
    let mut digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if !international {
        if let Some(rest) = digits.strip_prefix("00") {
            digits = rest.to_string();
        } else if digits.len() <= 10 {
            // Prefixo de tronco nacional
            let national = digits.strip_prefix('0').unwrap_or(&digits);
            digits = format!("{country_code}{national}");
        }
    }

    if digits.len() < 7 {
        return None;
    }
    Some(format!("+{digits}"))
}

pub fn sanitize_email(raw: &str) -> Option<String> {
    let email: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-' | '+'))
        .collect();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') {
        return None;
    }
    Some(email)
}

/// Chave externa da conta no Salesforce: e-mail saneado, senão o telefone.
pub fn external_account_key(cleaned: &CleanedLead) -> Option<String> {
    if let Some(email) = cleaned.email.as_deref().and_then(sanitize_email) {
        return Some(email);
    }
    cleaned
        .phone
        .as_ref()
        .map(|phone| phone.trim_start_matches('+').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::facebook::FieldDatum;

    fn field(name: &str, value: &str) -> FieldDatum {
        FieldDatum { name: name.into(), values: vec![value.into()] }
    }

    #[test]
    fn cleans_a_typical_form() {
        let lead = GraphLead {
            campaign_name: Some("Random Campaign".into()),
            form_id: Some("F1".into()),
            field_data: vec![
                field("full_name", "  ANA maría PÉREZ gómez "),
                field("email", " Ana.Perez@Example.COM "),
                field("phone_number", "300 123 4567"),
                field("ciudad", "medellín"),
                field("¿Cuál es tu presupuesto?", "200M"),
            ],
            ..Default::default()
        };

        let cleaned = LeadCleaner::new("+57").clean(&lead);
        assert_eq!(cleaned.full_name.as_deref(), Some("Ana María Pérez Gómez"));
        assert_eq!(cleaned.first_name.as_deref(), Some("Ana María"));
        assert_eq!(cleaned.last_name.as_deref(), Some("Pérez Gómez"));
        assert_eq!(cleaned.email.as_deref(), Some("ana.perez@example.com"));
        assert_eq!(cleaned.phone.as_deref(), Some("+573001234567"));
        assert_eq!(cleaned.city.as_deref(), Some("Medellín"));
        assert_eq!(cleaned.campaign_name.as_deref(), Some("Random Campaign"));
        assert_eq!(cleaned.extra.len(), 1);
    }

    #[test]
    fn split_name_rules() {
        assert_eq!(split_name("Ana"), (Some("Ana".into()), None));
        assert_eq!(split_name("Ana Pérez"), (Some("Ana".into()), Some("Pérez".into())));
        assert_eq!(
            split_name("Ana Pérez Gómez"),
            (Some("Ana".into()), Some("Pérez Gómez".into()))
        );
        assert_eq!(split_name("   "), (None, None));
    }

    #[test]
    fn phone_formats() {
        assert_eq!(format_phone("+57 300-123-4567", "57").as_deref(), Some("+573001234567"));
        assert_eq!(format_phone("0057 3001234567", "57").as_deref(), Some("+573001234567"));
        assert_eq!(format_phone("573001234567", "57").as_deref(), Some("+573001234567"));
        assert_eq!(format_phone("12", "57"), None);
    }

    #[test]
    fn email_sanitizing() {
        assert_eq!(sanitize_email(" A b@Mail.com").as_deref(), Some("ab@mail.com"));
        assert_eq!(sanitize_email("sem-arroba"), None);
        assert_eq!(sanitize_email("x@localhost"), None);
    }

    #[test]
    fn external_key_falls_back_to_phone() {
        let cleaned = CleanedLead { phone: Some("+573001234567".into()), ..Default::default() };
        assert_eq!(external_account_key(&cleaned).as_deref(), Some("573001234567"));
    }
}
