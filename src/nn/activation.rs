//! Activation functions on autograd variables

use crate::error::{Error, Result};
use numr::autograd::{Var, var_add_scalar, var_mul_scalar, var_relu, var_sigmoid};
use numr::dtype::DType;
use numr::ops::{ActivationOps, CompareOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};

/// Activation function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Apply this activation, recording the op for backward.
    pub fn forward<R, C>(&self, client: &C, x: &Var<R>) -> Result<Var<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + TensorOps<R> + ScalarOps<R> + ActivationOps<R> + CompareOps<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        match self {
            Activation::Relu => var_relu(x, client).map_err(Error::Numr),
            Activation::Sigmoid => var_sigmoid(x, client).map_err(Error::Numr),
            Activation::Tanh => {
                // tanh(x) = 2 * sigmoid(2x) - 1
                let doubled = var_mul_scalar(x, 2.0, client).map_err(Error::Numr)?;
                let s = var_sigmoid(&doubled, client).map_err(Error::Numr)?;
                let s2 = var_mul_scalar(&s, 2.0, client).map_err(Error::Numr)?;
                var_add_scalar(&s2, -1.0, client).map_err(Error::Numr)
            }
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activation::Relu => write!(f, "relu"),
            Activation::Sigmoid => write!(f, "sigmoid"),
            Activation::Tanh => write!(f, "tanh"),
        }
    }
}
