//! VarBuilder: scoped access to weights in a VarMap.
//!
//! Provides prefix-based navigation for hierarchical weight names
//! (e.g., "attention_mlp.0.weight").

use crate::error::{Error, Result};
use crate::nn::varmap::{Init, VarMap};
use numr::dtype::DType;
use numr::ops::{RandomOps, ScalarOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Scoped access to weights in a `VarMap`.
///
/// VarBuilder holds a reference to a VarMap and a prefix string for
/// navigating hierarchical weight names (e.g., "attention_mlp.1").
pub struct VarBuilder<'a, R: Runtime> {
    varmap: &'a mut VarMap<R>,
    prefix: String,
    device: &'a R::Device,
}

impl<'a, R: Runtime> VarBuilder<'a, R> {
    /// Create a root VarBuilder.
    pub fn new(varmap: &'a mut VarMap<R>, device: &'a R::Device) -> Self {
        Self {
            varmap,
            prefix: String::new(),
            device,
        }
    }

    /// Create a sub-builder with an additional prefix component.
    pub fn push_prefix(&mut self, segment: &str) -> VarBuilder<'_, R> {
        let prefix = if self.prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.prefix, segment)
        };
        VarBuilder {
            varmap: self.varmap,
            prefix,
            device: self.device,
        }
    }

    /// Alias for `push_prefix`.
    pub fn pp(&mut self, segment: &str) -> VarBuilder<'_, R> {
        self.push_prefix(segment)
    }

    /// Full name for a weight relative to this builder's prefix.
    fn full_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    /// Take a tensor by name, removing it from the map (zero-copy).
    pub fn take_tensor(&mut self, name: &str) -> Result<Tensor<R>> {
        let full = self.full_name(name);
        self.varmap.take(&full)
    }

    /// Take a tensor and validate its shape.
    pub fn take_with_shape(&mut self, name: &str, expected_shape: &[usize]) -> Result<Tensor<R>> {
        let full = self.full_name(name);
        let t = self.varmap.take(&full)?;
        if t.shape() != expected_shape {
            return Err(Error::ShapeMismatch {
                arg: "weight",
                reason: format!(
                    "'{}': expected {:?}, got {:?}",
                    full,
                    expected_shape,
                    t.shape()
                ),
            });
        }
        Ok(t)
    }

    /// Check if a name exists (relative to prefix).
    pub fn contains(&self, name: &str) -> bool {
        let full = self.full_name(name);
        self.varmap.contains(&full)
    }

    /// Current prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<R: Runtime<DType = DType>> VarBuilder<'_, R> {
    /// Take a stored tensor (shape-checked) or create one with `init`.
    pub fn take_or_init<C>(
        &mut self,
        client: &C,
        name: &str,
        shape: &[usize],
        init: Init,
    ) -> Result<Tensor<R>>
    where
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        if self.contains(name) {
            self.take_with_shape(name, shape)
        } else {
            init.build(client, shape, self.device)
        }
    }

    /// Take a stored scalar saved as either `[]` or `[1]`, or create one with
    /// `init`. The result always has shape `[1]`.
    pub fn take_scalar_or_init<C>(&mut self, client: &C, name: &str, init: Init) -> Result<Tensor<R>>
    where
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        if !self.contains(name) {
            return init.build(client, &[1], self.device);
        }
        let full = self.full_name(name);
        let t = self.varmap.take(&full)?;
        if t.numel() != 1 || t.shape().len() > 1 {
            return Err(Error::ShapeMismatch {
                arg: "weight",
                reason: format!("'{}': expected a scalar, got {:?}", full, t.shape()),
            });
        }
        t.contiguous().reshape(&[1]).map_err(Error::Numr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::runtime::cpu::CpuRuntime;

    #[test]
    fn test_varbuilder_prefix() {
        let (_, d) = cpu_setup();
        let mut map = VarMap::<CpuRuntime>::new();
        map.insert(
            "attention_mlp.0.weight".into(),
            Tensor::from_slice(&[1.0f32], &[1], &d),
        );

        let mut vb = VarBuilder::new(&mut map, &d);
        let mut vb = vb.pp("attention_mlp");
        let mut vb = vb.pp("0");
        assert_eq!(vb.prefix(), "attention_mlp.0");
        let t = vb.take_tensor("weight").unwrap();
        assert_eq!(t.shape(), &[1]);
        // Second take should fail — already removed
        assert!(vb.take_tensor("weight").is_err());
    }

    #[test]
    fn test_varbuilder_take_with_shape() {
        let (_, d) = cpu_setup();
        let mut map = VarMap::<CpuRuntime>::new();
        map.insert(
            "w".into(),
            Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &d),
        );

        let mut vb = VarBuilder::new(&mut map, &d);
        assert!(matches!(
            vb.take_with_shape("w", &[4]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_take_or_init_prefers_stored() {
        let (client, d) = cpu_setup();
        let mut map = VarMap::<CpuRuntime>::new();
        map.insert("bias".into(), Tensor::from_slice(&[7.0f32, 8.0], &[2], &d));

        let mut vb = VarBuilder::new(&mut map, &d);
        let stored = vb
            .take_or_init(&client, "bias", &[2], Init::Zeros)
            .unwrap();
        assert_eq!(stored.to_vec::<f32>(), vec![7.0, 8.0]);

        let fresh = vb
            .take_or_init(&client, "bias", &[2], Init::Const(3.0))
            .unwrap();
        assert_eq!(fresh.to_vec::<f32>(), vec![3.0, 3.0]);
    }

    #[test]
    fn test_take_scalar_accepts_zero_dim() {
        let (client, d) = cpu_setup();
        let mut map = VarMap::<CpuRuntime>::new();
        map.insert("a".into(), Tensor::from_slice(&[0.5f32], &[], &d));
        map.insert("b".into(), Tensor::from_slice(&[1.5f32], &[1], &d));
        map.insert("c".into(), Tensor::from_slice(&[1.0f32, 2.0], &[2], &d));

        let mut vb = VarBuilder::new(&mut map, &d);
        let a = vb.take_scalar_or_init(&client, "a", Init::Zeros).unwrap();
        assert_eq!(a.shape(), &[1]);
        assert_eq!(a.to_vec::<f32>(), vec![0.5]);
        let b = vb.take_scalar_or_init(&client, "b", Init::Zeros).unwrap();
        assert_eq!(b.to_vec::<f32>(), vec![1.5]);
        let fresh = vb.take_scalar_or_init(&client, "d", Init::Const(2.0)).unwrap();
        assert_eq!(fresh.shape(), &[1]);
        assert_eq!(fresh.to_vec::<f32>(), vec![2.0]);
        assert!(matches!(
            vb.take_scalar_or_init(&client, "c", Init::Zeros),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
