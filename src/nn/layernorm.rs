//! Layer Normalization module
//!
//! LayerNorm: output = (x - mean) / sqrt(var + eps) * weight + bias
//! Composed from numr autograd primitives for training support.
//!
//! Statistics are taken over the trailing axes covered by the affine
//! weight: a `[hidden]` weight normalizes each row, a `[rows, hidden]`
//! weight normalizes each `[rows, hidden]` matrix as one group with a
//! separate gain and offset per element.

use crate::error::{Error, Result};
use crate::nn::module::Module;
use crate::nn::var_builder::VarBuilder;
use crate::nn::varmap::Init;
use numr::autograd::{Var, var_add, var_add_scalar, var_div, var_mean, var_mul, var_sqrt, var_sub};
use numr::dtype::DType;
use numr::ops::{RandomOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Layer Normalization
///
/// weight (gamma): `normalized_shape`
/// bias (beta): `normalized_shape`
pub struct LayerNorm<R: Runtime> {
    weight: Var<R>,
    bias: Var<R>,
    eps: f64,
}

impl<R: Runtime> LayerNorm<R> {
    pub fn new(weight: Tensor<R>, bias: Tensor<R>, eps: f32, trainable: bool) -> Self {
        Self {
            weight: Var::new(weight, trainable),
            bias: Var::new(bias, trainable),
            eps: eps as f64,
        }
    }

    /// Trailing shape this norm reduces over.
    pub fn normalized_shape(&self) -> &[usize] {
        self.weight.shape()
    }

    /// Forward: (x - mean) / sqrt(var + eps) * weight + bias
    ///
    /// input: `[..., *normalized_shape]`, output: same shape
    pub fn forward<C>(&self, client: &C, input: &Var<R>) -> Result<Var<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + TensorOps<R> + ScalarOps<R> + ReduceOps<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R>,
    {
        let shape = input.shape();
        let norm_shape = self.normalized_shape();
        let ndim = shape.len();
        let k = norm_shape.len();
        if ndim < k || &shape[ndim - k..] != norm_shape {
            return Err(Error::ShapeMismatch {
                arg: "input",
                reason: format!(
                    "layer norm over {:?} cannot apply to shape {:?}",
                    norm_shape, shape
                ),
            });
        }
        let dims: Vec<usize> = (ndim - k..ndim).collect();

        let mean = var_mean(input, &dims, true, client).map_err(Error::Numr)?;
        let centered = var_sub(input, &mean, client).map_err(Error::Numr)?;

        // biased variance, as torch.nn.LayerNorm
        let sq = var_mul(&centered, &centered, client).map_err(Error::Numr)?;
        let variance = var_mean(&sq, &dims, true, client).map_err(Error::Numr)?;

        let var_eps = var_add_scalar(&variance, self.eps, client).map_err(Error::Numr)?;
        let std = var_sqrt(&var_eps, client).map_err(Error::Numr)?;
        let normed = var_div(&centered, &std, client).map_err(Error::Numr)?;

        let scaled = var_mul(&normed, &self.weight, client).map_err(Error::Numr)?;
        var_add(&scaled, &self.bias, client).map_err(Error::Numr)
    }
}

impl<R: Runtime<DType = DType>> LayerNorm<R> {
    /// Take `weight` / `bias` from the builder, defaulting to gain 1 and offset 0.
    pub fn from_varbuilder<C>(
        client: &C,
        vb: &mut VarBuilder<R>,
        normalized_shape: &[usize],
        eps: f32,
        trainable: bool,
    ) -> Result<Self>
    where
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        let weight = vb.take_or_init(client, "weight", normalized_shape, Init::Ones)?;
        let bias = vb.take_or_init(client, "bias", normalized_shape, Init::Zeros)?;
        Ok(Self::new(weight, bias, eps, trainable))
    }
}

impl<R: Runtime> Module<R> for LayerNorm<R> {
    fn parameters(&self) -> Vec<&Var<R>> {
        vec![&self.weight, &self.bias]
    }

    fn named_parameters(&self) -> Vec<(String, &Var<R>)> {
        vec![
            ("weight".to_string(), &self.weight),
            ("bias".to_string(), &self.bias),
        ]
    }
}
