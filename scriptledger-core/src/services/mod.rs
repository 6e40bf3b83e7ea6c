//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod ledger;
pub mod migration;
pub mod missed;
pub mod validator;

pub use ledger::ExecutionLedger;
pub use migration::{MigrationPlan, MigrationService};
pub use missed::{parse_missed_scripts, read_missed_scripts};
pub use validator::ConsistencyValidator;
