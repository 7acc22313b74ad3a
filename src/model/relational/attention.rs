//! Multi-head self-attention over memory rows and the attend-over-memory block loop.

use super::layer::RelationalMemory;
use crate::error::{Error, Result};
use crate::model::traits::MemoryClient;
use crate::nn::Activation;
use crate::ops::{scaled_dot_product_attention, var_contiguous};
use numr::autograd::{Var, var_add, var_narrow, var_permute, var_reshape};
use numr::dtype::DType;
use numr::ops::{ActivationOps, CompareOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::Runtime;

impl<R: Runtime<DType = DType>> RelationalMemory<R> {
    /// Self-attention across all memory rows (slots plus the appended input row).
    ///
    /// memory: `[B, mem_slots + 1, mem_size]`, output: same shape.
    pub fn multihead_attention<C>(&self, client: &C, memory: &Var<R>) -> Result<Var<R>>
    where
        C: MemoryClient<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        let shape = memory.shape().to_vec();
        let mem_size = self.config.mem_size();
        if shape.len() != 3 || shape[2] != mem_size {
            return Err(Error::ShapeMismatch {
                arg: "memory",
                reason: format!("expected [B, rows, {mem_size}], got {shape:?}"),
            });
        }
        let (batch, rows) = (shape[0], shape[1]);
        let heads = self.config.num_heads;
        let key_size = self.config.key_size();
        let value_size = self.config.value_size();

        // [B, N, H * qkv_size], normalized jointly over rows and features
        let qkv = self.qkv_projector.forward(client, memory)?;
        let qkv = self.qkv_layernorm.forward(client, &qkv)?;

        // [B, N, H, qkv_size] -> [B, H, N, qkv_size]
        let qkv = var_reshape(&qkv, &[batch, rows, heads, self.config.qkv_size()])
            .map_err(Error::Numr)?;
        let qkv = var_permute(&qkv, &[0, 2, 1, 3]).map_err(Error::Numr)?;
        let qkv = var_contiguous(client, &qkv).map_err(Error::Numr)?;

        let split = |start: usize, len: usize| -> Result<Var<R>> {
            let part = var_narrow(&qkv, 3, start, len).map_err(Error::Numr)?;
            var_contiguous(client, &part).map_err(Error::Numr)
        };
        let q = split(0, key_size)?;
        let k = split(key_size, key_size)?;
        let v = split(2 * key_size, value_size)?;

        // [B, H, N, V] -> [B, N, H * V]
        let attended = scaled_dot_product_attention(client, &q, &k, &v)?;
        let attended = var_permute(&attended, &[0, 2, 1, 3]).map_err(Error::Numr)?;
        let attended = var_contiguous(client, &attended).map_err(Error::Numr)?;
        var_reshape(&attended, &[batch, rows, heads * value_size]).map_err(Error::Numr)
    }

    /// `num_blocks` rounds of attention and MLP refinement, each wrapped in a
    /// residual connection and layer norm. Shape is preserved.
    pub fn attend_over_memory<C>(&self, client: &C, memory: &Var<R>) -> Result<Var<R>>
    where
        C: MemoryClient<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        let mut memory = memory.clone();
        for _ in 0..self.config.num_blocks {
            let attended = self.multihead_attention(client, &memory)?;
            let residual = var_add(&memory, &attended, client).map_err(Error::Numr)?;
            memory = self.attended_memory_layernorm.forward(client, &residual)?;

            let mut mlp = memory.clone();
            for layer in &self.attention_mlp {
                let projected = layer.forward(client, &mlp)?;
                mlp = Activation::Relu.forward(client, &projected)?;
            }

            let residual = var_add(&memory, &mlp, client).map_err(Error::Numr)?;
            memory = self.attended_memory_layernorm2.forward(client, &residual)?;
        }
        Ok(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::relational::RelationalMemoryConfig;
    use crate::test_utils::cpu_setup;
    use numr::runtime::cpu::{CpuDevice, CpuRuntime};
    use numr::tensor::Tensor;

    fn augmented(shape: &[usize], device: &CpuDevice) -> Var<CpuRuntime> {
        let n: usize = shape.iter().product();
        let data: Vec<f32> = (0..n).map(|i| (i as f32 * 0.37).cos()).collect();
        Var::new(Tensor::<CpuRuntime>::from_slice(&data, shape, device), false)
    }

    #[test]
    fn test_multihead_attention_preserves_shape() {
        let (client, device) = cpu_setup();
        let config = RelationalMemoryConfig::new(3, 4, 5).with_num_heads(2);
        let core = RelationalMemory::<CpuRuntime>::new(config, &client, &device, false).unwrap();

        let memory = augmented(&[2, 4, 8], &device);
        let out = core.multihead_attention(&client, &memory).unwrap();
        assert_eq!(out.shape(), &[2, 4, 8]);
        assert!(out.tensor().to_vec::<f32>().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_multihead_attention_custom_key_size() {
        let (client, device) = cpu_setup();
        let config = RelationalMemoryConfig::new(2, 4, 4)
            .with_num_heads(3)
            .with_key_size(2);
        let core = RelationalMemory::<CpuRuntime>::new(config, &client, &device, false).unwrap();

        let memory = augmented(&[1, 3, 12], &device);
        let out = core.multihead_attention(&client, &memory).unwrap();
        assert_eq!(out.shape(), &[1, 3, 12]);
    }

    #[test]
    fn test_multihead_attention_rejects_wrong_width() {
        let (client, device) = cpu_setup();
        let config = RelationalMemoryConfig::new(2, 4, 4);
        let core = RelationalMemory::<CpuRuntime>::new(config, &client, &device, false).unwrap();

        let memory = augmented(&[1, 3, 5], &device);
        assert!(matches!(
            core.multihead_attention(&client, &memory),
            Err(Error::ShapeMismatch { arg: "memory", .. })
        ));
    }

    #[test]
    fn test_attend_over_memory_output_is_normalized() {
        let (client, device) = cpu_setup();
        let config = RelationalMemoryConfig::new(2, 3, 4).with_num_blocks(2);
        let core = RelationalMemory::<CpuRuntime>::new(config, &client, &device, false).unwrap();

        let memory = augmented(&[2, 3, 3], &device);
        let out = core.attend_over_memory(&client, &memory).unwrap();
        assert_eq!(out.shape(), &[2, 3, 3]);

        // default affine is identity, so each [rows, width] group is standardized
        for group in out.tensor().to_vec::<f32>().chunks(9) {
            let mean: f32 = group.iter().sum::<f32>() / 9.0;
            assert!(mean.abs() < 1e-4, "mean={mean}");
        }
    }
}
