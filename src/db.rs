pub mod lead_repo;
pub use lead_repo::{LeadRepository, LeadStore};
pub mod config_repo;
pub use config_repo::{ConfigRepository, ConfigStore};
pub mod agent_repo;
pub use agent_repo::{AgentRepository, AgentStore};
