// Library interface for FundFlow node components
// Allows testing and reuse of the ledger outside the binary

pub mod analytics;
pub mod api;
pub mod campaign;
pub mod config;
pub mod error;
pub mod events;
pub mod investment;
pub mod milestone;
pub mod payment;
pub mod persistence;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod util;

pub use api::{run_api, ApiResponse, FundFlowApi};
pub use campaign::{Campaign, CampaignStatus};
pub use config::FundFlowConfig;
pub use error::{FundFlowError, Result};
pub use investment::{Investment, InvestmentStatus};
pub use milestone::{Evidence, Milestone, MilestoneStatus, VoteChoice};
pub use payment::{PaymentGateway, SimulatedGateway};
pub use persistence::LedgerPersistence;
pub use scheduler::{StatusScheduler, SweepReport};
pub use service::{CampaignService, ServiceConfig};
pub use store::LedgerStore;
