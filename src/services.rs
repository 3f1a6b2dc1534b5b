pub mod crypto;
pub mod http;
pub mod module_settings;

pub mod lead_cleaner;
pub mod campaign_classifier;
pub mod token_guard;
pub mod agent_service;

pub mod graph_client;
pub mod ai_client;

pub mod salesforce_errors;
pub mod salesforce_oauth;
pub mod salesforce_client;
pub mod owner_lottery;
pub mod salesforce_sync;

pub mod lead_pipeline;
pub mod batch_driver;
