//! # opsbox
//!
//! A contract-driven capability dispatch engine. Every capability ships a
//! machine-readable contract (`contract.v1.json`) declaring its input and
//! output schemas and error codes; the dispatcher validates each call
//! against the contract on both sides and always answers with a uniform
//! envelope. Adapter generators derive tool-call descriptors and skill
//! documents from the same contracts, so the protocol surfaces can never
//! drift from the implementation.

pub mod adapters;
pub mod capabilities;
pub mod cli;
pub mod contract;
pub mod dispatch;
pub mod registry;

pub use contract::{Contract, ContractError, ContractStore, ErrorSpec};
pub use dispatch::{Dispatcher, Envelope};
pub use registry::{Binding, Capability, CapabilityError, CapabilityRegistry, ResolutionError};

/// Crate version, as published in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
