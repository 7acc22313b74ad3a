//! Relational Memory Core (RMC).
//!
//! A fixed bank of memory slots refreshed every step by multi-head
//! self-attention over the slots plus the projected input, an MLP with
//! residual connections and layer norms, and optional input/forget gating.

mod attention;
mod config;
mod gating;
mod layer;
mod recurrence;
mod state;

pub use config::{GateStyle, RelationalMemoryConfig};
pub use layer::RelationalMemory;
pub use state::{Detach, HiddenState};
