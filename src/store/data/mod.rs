mod chain;

pub use chain::ChainRecord;
