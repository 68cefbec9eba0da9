//! Debug trace fan-out and in-memory replay.

mod data;
mod hub;

pub use data::{DebugData, DebugLog};
pub use hub::{DebugHandle, DebugHandleAsync, DebugHub};
