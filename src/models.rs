pub mod agent;
pub mod batch;
pub mod facebook;
pub mod lead;
pub mod module_config;
pub mod salesforce;
