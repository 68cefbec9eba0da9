mod chain;
mod connection;
mod node;

pub use chain::{ChainDefinition, ChainInfo, KEY_CREATE_TIME, KEY_MESSAGE, KEY_UPDATE_TIME, KEY_USERNAME, Metadata};
pub use connection::Connection;
pub use node::{ComponentConfig, FLOW_NODE_TYPE, FLOW_TARGET_KEY, FlowConfig, Node, NodeConfig, NodeId};
