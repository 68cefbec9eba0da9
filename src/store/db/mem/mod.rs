use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::trace;

use crate::{
    Result, ShareLock,
    common::{read, write},
    store::{ChainStore, StoreProvider, data::ChainRecord},
    utils,
};

/// In-memory store provider holding one [`MemChainStore`] per tenant.
#[derive(Clone, Default)]
pub struct MemStore {
    tenants: ShareLock<HashMap<String, Arc<MemChainStore>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete store of `tenant`, for seeding data.
    pub fn tenant_store(
        &self,
        tenant: &str,
    ) -> Arc<MemChainStore> {
        if let Some(store) = read(&self.tenants).get(tenant) {
            return store.clone();
        }
        write(&self.tenants).entry(tenant.to_string()).or_default().clone()
    }
}

impl StoreProvider for MemStore {
    fn tenant(
        &self,
        tenant: &str,
    ) -> Result<Arc<dyn ChainStore>> {
        Ok(self.tenant_store(tenant))
    }

    fn tenants(&self) -> Result<Vec<String>> {
        let mut tenants: Vec<String> = read(&self.tenants).iter().filter(|(_, store)| !store.is_empty()).map(|(tenant, _)| tenant.clone()).collect();
        tenants.sort();
        Ok(tenants)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    created: u64,
    touched: u64,
    record: ChainRecord,
}

/// In-memory chain store of one tenant.
#[derive(Debug)]
pub struct MemChainStore {
    records: RwLock<HashMap<String, Entry>>,
    seq: AtomicU64,
}

impl Default for MemChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemChainStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        read(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChainStore for MemChainStore {
    fn find(
        &self,
        id: &str,
    ) -> Result<Option<ChainRecord>> {
        Ok(read(&self.records).get(id).map(|e| e.record.clone()))
    }

    fn save(
        &self,
        id: &str,
        data: &str,
    ) -> Result<()> {
        trace!("mem::save({})", id);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let now = utils::time::time_millis();
        let mut records = write(&self.records);
        match records.get_mut(id) {
            Some(entry) => {
                entry.touched = seq;
                entry.record.data = data.to_string();
                entry.record.update_time = now;
            }
            None => {
                records.insert(
                    id.to_string(),
                    Entry {
                        created: seq,
                        touched: seq,
                        record: ChainRecord {
                            id: id.to_string(),
                            data: data.to_string(),
                            create_time: now,
                            update_time: now,
                        },
                    },
                );
            }
        }
        Ok(())
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("mem::delete({})", id);
        Ok(write(&self.records).remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<ChainRecord>> {
        let records = read(&self.records);
        let mut entries: Vec<&Entry> = records.values().collect();
        entries.sort_by_key(|e| e.created);
        Ok(entries.into_iter().map(|e| e.record.clone()).collect())
    }

    fn latest(&self) -> Result<Option<ChainRecord>> {
        Ok(read(&self.records).values().max_by_key(|e| e.touched).map(|e| e.record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_is_upsert() {
        let store = MemChainStore::new();
        store.save("a", "{}").unwrap();
        let created = store.find("a").unwrap().unwrap();
        store.save("a", r#"{"v":2}"#).unwrap();
        let updated = store.find("a").unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(updated.data, r#"{"v":2}"#);
        assert_eq!(updated.create_time, created.create_time);
        assert!(store.exists("a").unwrap());
        assert!(!store.exists("b").unwrap());
    }

    #[test]
    fn test_list_keeps_creation_order_and_latest_tracks_updates() {
        let store = MemChainStore::new();
        store.save("c", "{}").unwrap();
        store.save("a", "{}").unwrap();
        store.save("b", "{}").unwrap();
        store.save("c", "{}").unwrap();

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.latest().unwrap().unwrap().id, "c");
    }

    #[test]
    fn test_delete_reports_existence() {
        let store = MemChainStore::new();
        store.save("a", "{}").unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(store.latest().unwrap().is_none());
    }

    #[test]
    fn test_tenants_are_isolated() {
        let provider = MemStore::new();
        provider.tenant("alice").unwrap().save("a", "{}").unwrap();
        let bob = provider.tenant("bob").unwrap();
        assert!(bob.find("a").unwrap().is_none());
        assert_eq!(provider.tenants().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_tenants_skip_emptied_stores() {
        let provider = MemStore::new();
        let carol = provider.tenant("carol").unwrap();
        carol.save("a", "{}").unwrap();
        provider.tenant("bob").unwrap().save("b", "{}").unwrap();
        assert_eq!(provider.tenants().unwrap(), vec!["bob", "carol"]);

        carol.delete("a").unwrap();
        assert_eq!(provider.tenants().unwrap(), vec!["bob"]);
    }
}
