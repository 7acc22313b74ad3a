pub mod relational;
pub mod traits;

pub use relational::{Detach, GateStyle, HiddenState, RelationalMemory, RelationalMemoryConfig};
pub use traits::MemoryClient;
