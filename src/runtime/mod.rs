mod pool;
mod registry;
mod service;

pub use pool::InstancePool;
pub use registry::TenantRegistry;
pub use service::ChainService;
