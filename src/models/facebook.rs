// src/models/facebook.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

// --- WEBHOOK (Lead Ads) ---

/// Corpo do POST do webhook `leadgen`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeadgenWebhook {
    #[schema(example = "page")]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookEntry {
    pub id: Option<String>,
    pub time: Option<i64>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookChange {
    #[schema(example = "leadgen")]
    pub field: String,
    // Outros campos de página chegam com formatos diferentes
    #[schema(value_type = Object)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeadgenChange {
    pub leadgen_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,
    pub created_time: Option<i64>,
}

impl LeadgenWebhook {
    /// Extrai apenas as mudanças `leadgen` com um `leadgen_id` legível.
    pub fn leadgen_changes(&self) -> Vec<LeadgenChange> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter(|change| change.field == "leadgen")
            .filter_map(|change| {
                let mut value = change.value.clone();
                // O Facebook às vezes manda ids numéricos
                if let Some(obj) = value.as_object_mut() {
                    for key in ["leadgen_id", "page_id", "form_id", "ad_id"] {
                        if let Some(Value::Number(n)) = obj.get(key) {
                            let as_text = n.to_string();
                            obj.insert(key.to_string(), Value::String(as_text));
                        }
                    }
                }
                match serde_json::from_value::<LeadgenChange>(value) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        tracing::warn!("⚠️ Mudança leadgen ignorada (formato inválido): {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Query do handshake `GET` do webhook.
#[derive(Debug, Deserialize, IntoParams)]
pub struct WebhookChallengeQuery {
    #[serde(rename = "hub.mode")]
    #[param(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    #[param(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    #[param(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReceipt {
    pub received: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped_blocked: usize,
    pub skipped_duplicate: usize,
}

// --- GRAPH API ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDatum {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Resposta do Graph API para um lead (`GET /{leadgen_id}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphLead {
    pub id: Option<String>,
    pub created_time: Option<String>,
    #[serde(default)]
    pub field_data: Vec<FieldDatum>,
    pub ad_id: Option<String>,
    pub ad_name: Option<String>,
    pub adset_name: Option<String>,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub form_id: Option<String>,
    pub platform: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_only_leadgen_changes() {
        let payload: LeadgenWebhook = serde_json::from_value(json!({
            "object": "page",
            "entry": [{
                "id": "999",
                "time": 1700000000,
                "changes": [
                    {"field": "leadgen", "value": {"leadgen_id": 123, "page_id": "999", "form_id": "F1", "created_time": 1700000000}},
                    {"field": "feed", "value": {"item": "status"}}
                ]
            }]
        }))
        .unwrap();

        let changes = payload.leadgen_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].leadgen_id, "123");
        assert_eq!(changes[0].form_id.as_deref(), Some("F1"));
    }

    #[test]
    fn malformed_leadgen_change_is_skipped() {
        let payload: LeadgenWebhook = serde_json::from_value(json!({
            "object": "page",
            "entry": [{"changes": [{"field": "leadgen", "value": {"page_id": "1"}}]}]
        }))
        .unwrap();
        assert!(payload.leadgen_changes().is_empty());
    }
}
