//! Service layer: every exposed operation of the engine.
//!
//! Mutating operations run as one database transaction spanning every table
//! they touch; the open transaction is threaded through the `pub(crate)`
//! helper functions as a `ConnectionTrait` parameter, never held in ambient
//! state.

pub mod accounts;
pub mod consignments;
pub mod factory;
pub mod inventory;
pub mod ledger;
pub mod reports;
pub mod sequences;

pub use accounts::AccountService;
pub use consignments::ConsignmentService;
pub use factory::{ServiceContainer, ServiceFactory};
pub use inventory::InventoryService;
pub use ledger::LedgerService;
pub use reports::ReportService;
