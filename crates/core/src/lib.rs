pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, CohortBasis};
pub use error::{EngagementError, EngagementResult};
pub use types::{DateRange, SessionRecord, WalletInfo};
