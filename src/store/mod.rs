//! Storage layer for persisted chain definitions.
//!
//! Every tenant owns an isolated [`ChainStore`]; a [`StoreProvider`] opens them.
//! Provides an abstraction over storage backends:
//! - `MemStore`: In-memory storage for testing and embedding

pub mod data;
mod db;
mod query;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use db::{MemChainStore, MemStore};
pub use query::ListQuery;

/// Paginated query result.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageData<T> {
    /// Total number of matching records.
    pub count: usize,
    /// Current page number (1-based).
    pub page_num: usize,
    /// Total number of pages.
    pub page_count: usize,
    /// Number of records per page, 0 when unpaged.
    pub page_size: usize,
    /// Records in the current page.
    pub rows: Vec<T>,
}

/// Persistence contract for the chain definitions of one tenant.
pub trait ChainStore: Send + Sync {
    /// Finds the record of a chain.
    fn find(
        &self,
        id: &str,
    ) -> Result<Option<data::ChainRecord>>;

    /// Creates the record if absent, updates it otherwise.
    fn save(
        &self,
        id: &str,
        data: &str,
    ) -> Result<()>;

    /// Deletes a record, returning whether it existed.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// All records in creation order.
    fn list(&self) -> Result<Vec<data::ChainRecord>>;

    /// The most recently updated record.
    fn latest(&self) -> Result<Option<data::ChainRecord>>;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        Ok(self.find(id)?.is_some())
    }
}

/// Opens tenant-scoped stores.
pub trait StoreProvider: Send + Sync {
    /// Returns the store of `tenant`, creating it if needed.
    fn tenant(
        &self,
        tenant: &str,
    ) -> Result<Arc<dyn ChainStore>>;

    /// Tenants that already have persisted data.
    fn tenants(&self) -> Result<Vec<String>>;
}
