//! sea-orm entities for the engine's persisted state.
//!
//! `consignment` owns `consignment_line` exclusively; `ledger_entry` points
//! at `account` but accounts carry no back-reference — entries are found by
//! query, never by traversal.

pub mod account;
pub mod consignment;
pub mod consignment_line;
pub mod item;
pub mod ledger_entry;
pub mod sequence;
pub mod settlement_sale;
