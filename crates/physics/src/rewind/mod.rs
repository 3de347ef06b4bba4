//! Jump history and the undo that consumes it.

mod controller;
mod history;

pub use controller::{RewindConfig, RewindController, RewindParts};
pub use history::{HistoryConfig, JumpHistory, JumpSnapshot};
