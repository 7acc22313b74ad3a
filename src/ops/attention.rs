//! Scaled dot-product attention
//!
//! Composes numr autograd primitives: matmul, softmax, mul_scalar, transpose.

use crate::error::{Error, Result};
use numr::autograd::{Var, var_matmul, var_mul_scalar, var_softmax, var_transpose};
use numr::ops::ScalarOps;
use numr::runtime::{Runtime, RuntimeClient};

/// Unmasked attention: softmax((Q * key_size^-0.5) @ K^T) @ V
///
/// q, k: `[B, H, N, key_size]`, v: `[B, H, N, value_size]`,
/// output: `[B, H, N, value_size]`. Every row attends to every row,
/// itself included.
pub fn scaled_dot_product_attention<R, C>(
    client: &C,
    q: &Var<R>,
    k: &Var<R>,
    v: &Var<R>,
) -> Result<Var<R>>
where
    R: Runtime,
    C: RuntimeClient<R> + ScalarOps<R>,
    R::Client: ScalarOps<R>,
{
    let q_shape = q.shape().to_vec();
    let k_shape = k.shape().to_vec();
    let v_shape = v.shape().to_vec();

    for (arg, shape) in [("q", &q_shape), ("k", &k_shape), ("v", &v_shape)] {
        if shape.len() != 4 {
            return Err(Error::ShapeMismatch {
                arg,
                reason: format!("expected 4D [B, H, N, D], got {}D", shape.len()),
            });
        }
    }
    if q_shape != k_shape {
        return Err(Error::ShapeMismatch {
            arg: "k",
            reason: format!("q is {:?} but k is {:?} (must match)", q_shape, k_shape),
        });
    }
    if k_shape[..3] != v_shape[..3] {
        return Err(Error::ShapeMismatch {
            arg: "v",
            reason: format!("k is {:?} but v is {:?} (B, H, N must match)", k_shape, v_shape),
        });
    }

    let key_size = q_shape[3];
    let q = var_mul_scalar(q, (key_size as f64).sqrt().recip(), client).map_err(Error::Numr)?;

    // [B, H, N, N]
    let k_t = var_transpose(k).map_err(Error::Numr)?;
    let scores = var_matmul(&q, &k_t, client).map_err(Error::Numr)?;
    let weights = var_softmax(&scores, -1, client).map_err(Error::Numr)?;

    var_matmul(&weights, v, client).map_err(Error::Numr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::runtime::cpu::CpuRuntime;
    use numr::tensor::Tensor;

    fn det_var(shape: &[usize], device: &numr::runtime::cpu::CpuDevice) -> Var<CpuRuntime> {
        let n: usize = shape.iter().product();
        let data: Vec<f32> = (0..n).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
        Var::new(Tensor::<CpuRuntime>::from_slice(&data, shape, device), false)
    }

    #[test]
    fn test_attention_output_shape() {
        let (client, device) = cpu_setup();
        let q = det_var(&[2, 3, 5, 8], &device);
        let k = det_var(&[2, 3, 5, 8], &device);
        let v = det_var(&[2, 3, 5, 4], &device);

        let out = scaled_dot_product_attention(&client, &q, &k, &v).unwrap();
        assert_eq!(out.shape(), &[2, 3, 5, 4]);
    }

    #[test]
    fn test_uniform_scores_average_values() {
        let (client, device) = cpu_setup();
        // identical keys -> uniform weights -> every row is the mean of v
        let q = det_var(&[1, 1, 3, 2], &device);
        let k = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[1.0f32; 6], &[1, 1, 3, 2], &device),
            false,
        );
        let v = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[0.0f32, 3.0, 6.0], &[1, 1, 3, 1], &device),
            false,
        );
        let out: Vec<f32> = scaled_dot_product_attention(&client, &q, &k, &v)
            .unwrap()
            .tensor()
            .to_vec();
        for x in out {
            assert!((x - 3.0).abs() < 1e-5, "got {x}");
        }
    }

    #[test]
    fn test_query_scaled_by_inverse_sqrt_key_size() {
        let (client, device) = cpu_setup();
        // key_size = 2; two rows with distinct scores
        let q = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[1.0f32, 0.0, 0.0, 2.0], &[1, 1, 2, 2], &device),
            false,
        );
        let k = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[1.0f32, 0.0, 0.0, 1.0], &[1, 1, 2, 2], &device),
            false,
        );
        let v = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[0.0f32, 1.0], &[1, 1, 2, 1], &device),
            false,
        );
        let out: Vec<f32> = scaled_dot_product_attention(&client, &q, &k, &v)
            .unwrap()
            .tensor()
            .to_vec();

        // with v = [0, 1] each output is the weight on the second key:
        // row 0 scores [1, 0] / sqrt(2), row 1 scores [0, 2] / sqrt(2)
        let sigmoid = |x: f32| 1.0 / (1.0 + (-x).exp());
        let scale = 2.0f32.sqrt().recip();
        let expected = [sigmoid(-scale), sigmoid(2.0 * scale)];
        for (got, want) in out.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
        // unscaled scores would give sigmoid(-1) and sigmoid(2)
        assert!((out[0] - sigmoid(-1.0)).abs() > 1e-2);
    }

    #[test]
    fn test_attention_rejects_rank() {
        let (client, device) = cpu_setup();
        let q = det_var(&[2, 5, 8], &device);
        let k = det_var(&[2, 5, 8], &device);
        let v = det_var(&[2, 5, 8], &device);
        assert!(matches!(
            scaled_dot_product_attention(&client, &q, &k, &v),
            Err(Error::ShapeMismatch { arg: "q", .. })
        ));
    }
}
