//! Layout helpers for autograd variables

use numr::autograd::{Var, var_mul_scalar};
use numr::ops::ScalarOps;
use numr::runtime::{Runtime, RuntimeClient};

/// Make a Var contiguous.
///
/// Non-contiguous views (after `var_permute` / `var_narrow`) are copied
/// through an identity scale so the result keeps its grad_fn and gradients
/// still reach the view's source.
pub fn var_contiguous<R, C>(client: &C, v: &Var<R>) -> numr::error::Result<Var<R>>
where
    R: Runtime,
    C: RuntimeClient<R> + ScalarOps<R>,
    R::Client: ScalarOps<R>,
{
    if v.tensor().is_contiguous() {
        Ok(v.clone())
    } else {
        var_mul_scalar(v, 1.0, client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::autograd::{backward, var_permute, var_sum};
    use numr::runtime::cpu::CpuRuntime;
    use numr::tensor::Tensor;

    #[test]
    fn test_contiguous_after_permute_keeps_gradient() {
        let (client, device) = cpu_setup();
        let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let x = Var::new(
            Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device),
            true,
        );
        let t = var_permute(&x, &[1, 0]).unwrap();
        let c = var_contiguous(&client, &t).unwrap();
        assert!(c.tensor().is_contiguous());
        assert_eq!(c.shape(), &[3, 2]);
        assert_eq!(c.tensor().to_vec::<f32>(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

        let loss = var_sum(&c, &[0, 1], false, &client).unwrap();
        let grads = backward(&loss, &client).unwrap();
        let g = grads.get(x.tensor().id()).unwrap().contiguous().to_vec::<f32>();
        assert_eq!(g, vec![1.0; 6]);
    }
}
