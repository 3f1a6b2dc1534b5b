pub mod agents;
pub mod leads;
pub mod module_config;
pub mod oauth;
pub mod webhooks;
