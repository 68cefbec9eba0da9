//! # Rulehub
//!
//! Rulehub manages the lifecycle of user-defined rule chains for many tenants.
//! It is designed to sit between a request layer and a rule-execution engine.
//!
//! ## Core Features
//!
//! - **Cycle Safety**: Chains invoke each other through `flow` nodes; every save and deploy is
//!   checked for cross-chain cycles before anything is persisted
//! - **Tenant Isolation**: Each tenant owns its store and its pool of live instances
//! - **Consistent Lifecycle**: Save, deploy, undeploy, load and delete keep persisted and live state in step
//! - **Debug Fan-out**: Trace events are kept in capped per-chain rings and delivered to observers
//!   without a slow observer delaying the others
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rulehub::HubBuilder;
//!
//! let hub = HubBuilder::new().build()?;
//! hub.launch();
//!
//! let chains = hub.tenant("alice")?;
//! chains.save_dsl("main", dsl.as_bytes())?;
//! let running = chains.get("main");
//! ```

mod builder;
mod common;
mod config;
mod error;
mod hub;
mod utils;

pub mod debug;
pub mod engine;
pub mod events;
pub mod graph;
pub mod model;
pub mod runtime;
pub mod store;

use std::sync::{Arc, RwLock};

pub use builder::HubBuilder;
pub use config::Config;
pub use error::RuleHubError;
pub use hub::RuleHub;
pub use model::*;
pub use runtime::{ChainService, InstancePool, TenantRegistry};

/// Result type alias for Rulehub operations.
pub type Result<T> = std::result::Result<T, RuleHubError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
