pub mod activation;
pub mod layernorm;
pub mod linear;
pub mod module;
pub mod var_builder;
pub mod varmap;

pub use activation::Activation;
pub use layernorm::LayerNorm;
pub use linear::Linear;
pub use module::Module;
pub use var_builder::VarBuilder;
pub use varmap::{Init, VarMap};
