//! # relational-memory
//!
//! **Relational Memory Core on numr: attention-refreshed recurrent memory slots.**
//!
//! A fixed bank of memory slots is updated at every sequence step: the step's
//! input is projected and appended as an extra row, multi-head self-attention
//! and an MLP refine all rows, the input row is dropped, and input/forget
//! gates blend the result with the previous memory.
//!
//! ```text
//! input ─► input_projector ─┐
//!                           ▼
//! memory ──────────► [memory; input] ─► attend_over_memory (× num_blocks)
//!    │                                          │
//!    │                                   drop input row
//!    │                                          ▼
//!    └──► create_gates ──────────────► ig·tanh(m') + fg·memory ─► next memory
//! ```
//!
//! ## Layout
//!
//! - **nn**: Linear, LayerNorm, activations, `Module`, `VarMap` / `VarBuilder`
//! - **ops**: scaled dot-product attention and layout helpers on autograd `Var`s
//! - **model::relational**: the core, its config, and recurrent state detachment
//!
//! Everything is composed from numr autograd primitives, so one code path
//! serves training (gradients through every step) and inference.

pub mod error;
pub mod model;
pub mod nn;
pub mod ops;

pub use error::{Error, Result};
pub use model::{
    Detach, GateStyle, HiddenState, MemoryClient, RelationalMemory, RelationalMemoryConfig,
};

// Re-export numr types that users will commonly need
pub use numr::dtype::DType;
pub use numr::error::{Error as NumrError, Result as NumrResult};
pub use numr::runtime::{Runtime, RuntimeClient};
pub use numr::tensor::Tensor;
