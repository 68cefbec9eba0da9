mod mem;

pub use mem::{MemChainStore, MemStore};
