//! # casetrail-contracts
//!
//! Shared types and error contracts for the CASETRAIL tamper-evident case
//! record.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, their lifecycle guards, and the error
//! type.

pub mod error;
pub mod event;
pub mod pack;
pub mod report;
pub mod verification;
