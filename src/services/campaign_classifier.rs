// src/services/campaign_classifier.rs

use crate::{
    common::error::AppError,
    models::{lead::CampaignType, module_config::ConfigKey},
    services::module_settings::ModuleSettings,
};

/// Formulário da sala de vendas própria: sempre interno, independente das listas.
pub const ALWAYS_INTERNAL_FORM_ID: &str = "1217428563165377";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub campaign_type: CampaignType,
    // Record type da oportunidade configurado para o tipo
    pub record_type_id: Option<String>,
}

/// Listas de campanhas já normalizadas (trim + minúsculas).
#[derive(Debug, Clone, Default)]
pub struct CampaignRules {
    internal: Vec<String>,
    agency: Vec<String>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl CampaignRules {
    pub fn new<S: AsRef<str>>(internal: &[S], agency: &[S]) -> Self {
        let prepare = |items: &[S]| {
            items
                .iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self { internal: prepare(internal), agency: prepare(agency) }
    }

    pub async fn load(settings: &ModuleSettings) -> Result<Self, AppError> {
        let internal = settings.list(ConfigKey::InternalCampaigns).await?;
        let agency = settings.list(ConfigKey::AgencyCampaigns).await?;
        Ok(Self::new(&internal, &agency))
    }

    /// Lista interna primeiro; agência é o padrão quando nada casa.
    pub fn classify(&self, campaign_name: Option<&str>, form_id: Option<&str>) -> CampaignType {
        if form_id.map(str::trim) == Some(ALWAYS_INTERNAL_FORM_ID) {
            return CampaignType::Internal;
        }
        let Some(name) = campaign_name.map(normalize).filter(|n| !n.is_empty()) else {
            return CampaignType::Agency;
        };
        if self.internal.contains(&name) {
            return CampaignType::Internal;
        }
        if self.agency.contains(&name) {
            tracing::debug!(campaign = %name, "Campanha encontrada na lista de agência");
        }
        CampaignType::Agency
    }
}

/// Classifica e resolve o record type configurado para a oportunidade.
pub async fn classify_lead(
    settings: &ModuleSettings,
    campaign_name: Option<&str>,
    form_id: Option<&str>,
) -> Result<Classification, AppError> {
    let rules = CampaignRules::load(settings).await?;
    let campaign_type = rules.classify(campaign_name, form_id);
    let record_type_key = match campaign_type {
        CampaignType::Internal => ConfigKey::SalesforceRecordTypeInternal,
        CampaignType::Agency => ConfigKey::SalesforceRecordTypeAgency,
    };
    let record_type_id = settings.value(record_type_key).await?;
    Ok(Classification { campaign_type, record_type_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::crypto::test_cipher;
    use crate::testing::MemoryConfigStore;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn matching_ignores_case_and_surrounding_spaces() {
        let rules = CampaignRules::new(&["Torre Norte"], &["Feria Inmobiliaria"]);
        assert_eq!(rules.classify(Some("  torre NORTE "), None), CampaignType::Internal);
        assert_eq!(rules.classify(Some("Feria Inmobiliaria"), None), CampaignType::Agency);
        // Sem correspondência parcial
        assert_eq!(rules.classify(Some("Torre Norte 2"), None), CampaignType::Agency);
    }

    #[test]
    fn missing_campaign_defaults_to_agency() {
        let rules = CampaignRules::new(&["Torre Norte"], &[]);
        assert_eq!(rules.classify(None, Some("F1")), CampaignType::Agency);
        assert_eq!(rules.classify(Some("   "), None), CampaignType::Agency);
    }

    #[test]
    fn special_form_wins_over_agency_list() {
        let rules = CampaignRules::new(&[], &["Random Campaign"]);
        assert_eq!(
            rules.classify(Some("Random Campaign"), Some(ALWAYS_INTERNAL_FORM_ID)),
            CampaignType::Internal
        );
    }

    #[tokio::test]
    async fn resolves_configured_record_type() {
        let settings = ModuleSettings::new(Arc::new(MemoryConfigStore::default()), test_cipher());
        settings.set("internal_campaigns", r#"["Torre Norte"]"#).await.unwrap();
        settings.set("salesforce_record_type_internal", "012000000000001").await.unwrap();

        let internal = classify_lead(&settings, Some("Torre Norte"), None).await.unwrap();
        assert_eq!(internal.campaign_type, CampaignType::Internal);
        assert_eq!(internal.record_type_id.as_deref(), Some("012000000000001"));

        let agency = classify_lead(&settings, Some("Outra"), None).await.unwrap();
        assert_eq!(agency.campaign_type, CampaignType::Agency);
        assert_eq!(agency.record_type_id, None);
    }

    proptest! {
        #[test]
        fn internal_list_takes_precedence(name in "[A-Za-z ]{1,20}") {
            prop_assume!(!name.trim().is_empty());
            let rules = CampaignRules::new(&[name.clone()], &[name.clone()]);
            prop_assert_eq!(rules.classify(Some(&name), None), CampaignType::Internal);
        }

        #[test]
        fn unknown_names_are_agency(name in "[a-z]{1,12}") {
            let rules = CampaignRules::new(&["zz-interna-zz"], &["zz-agencia-zz"]);
            prop_assert_eq!(rules.classify(Some(&name), None), CampaignType::Agency);
        }

        #[test]
        fn special_form_is_always_internal(name in ".{0,30}") {
            let rules = CampaignRules::new(&[], &[name.clone()]);
            prop_assert_eq!(
                rules.classify(Some(&name), Some(ALWAYS_INTERNAL_FORM_ID)),
                CampaignType::Internal
            );
        }
    }
}
