//! Composite ops built from numr autograd primitives, identical on all backends.

pub mod attention;
pub mod layout;

pub use attention::scaled_dot_product_attention;
pub use layout::var_contiguous;
