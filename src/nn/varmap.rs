//! VarMap: named collection of model weights.

use crate::error::{Error, Result};
use numr::dtype::DType;
use numr::ops::{RandomOps, ScalarOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;
use std::collections::HashMap;

/// Initialization strategy for new tensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    /// All zeros
    Zeros,
    /// All ones
    Ones,
    /// Constant value
    Const(f32),
    /// Uniform random in `[-bound, bound]`
    Uniform(f32),
    /// Kaiming uniform (PyTorch Linear default): U(-1/sqrt(in), 1/sqrt(in)),
    /// with `in` taken from the last axis of the shape
    PyTorchLinear,
}

impl Init {
    /// Materialize an F32 tensor of `shape` following this strategy.
    pub fn build<R, C>(&self, client: &C, shape: &[usize], device: &R::Device) -> Result<Tensor<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        match *self {
            Init::Zeros => Ok(Tensor::<R>::zeros(shape, DType::F32, device)),
            Init::Ones => Ok(Tensor::<R>::ones(shape, DType::F32, device)),
            Init::Const(value) => Ok(Tensor::<R>::full_scalar(
                shape,
                DType::F32,
                value as f64,
                device,
            )),
            Init::Uniform(bound) => uniform(client, shape, bound as f64),
            Init::PyTorchLinear => {
                let fan_in = shape.last().copied().unwrap_or(1).max(1);
                uniform(client, shape, (fan_in as f64).sqrt().recip())
            }
        }
    }
}

/// U(-bound, bound) from the client's U(0, 1) generator.
fn uniform<R, C>(client: &C, shape: &[usize], bound: f64) -> Result<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
{
    let unit = client.rand(shape, DType::F32).map_err(Error::Numr)?;
    let scaled = client.mul_scalar(&unit, 2.0 * bound).map_err(Error::Numr)?;
    client.add_scalar(&scaled, -bound).map_err(Error::Numr)
}

/// Named collection of model weights.
pub struct VarMap<R: Runtime> {
    data: HashMap<String, Tensor<R>>,
}

impl<R: Runtime> VarMap<R> {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Insert (or overwrite) a tensor.
    pub fn insert(&mut self, name: String, tensor: Tensor<R>) {
        self.data.insert(name, tensor);
    }

    /// Get a tensor by name.
    pub fn get(&self, name: &str) -> Result<&Tensor<R>> {
        self.data.get(name).ok_or_else(|| Error::MissingWeight {
            name: name.to_string(),
        })
    }

    /// Remove and return a tensor by name (zero-copy extraction).
    pub fn take(&mut self, name: &str) -> Result<Tensor<R>> {
        self.data.remove(name).ok_or_else(|| Error::MissingWeight {
            name: name.to_string(),
        })
    }

    /// All weight names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|s| s.as_str())
    }

    /// Number of weights.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over all weights.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor<R>)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check if a name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }
}

impl<R: Runtime> Default for VarMap<R> {
    fn default() -> Self {
        Self::new()
    }
}
