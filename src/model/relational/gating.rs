//! Input and forget gates blending attended memory with the previous memory.

use super::layer::RelationalMemory;
use crate::error::{Error, Result};
use crate::model::traits::MemoryClient;
use crate::nn::Activation;
use crate::ops::var_contiguous;
use numr::autograd::{Var, var_add, var_mul, var_narrow, var_reshape, var_sigmoid};
use numr::dtype::DType;
use numr::ops::{ActivationOps, CompareOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::Runtime;

impl<R: Runtime<DType = DType>> RelationalMemory<R> {
    /// Compute `(input_gate, forget_gate)`, each `[B, mem_slots, gate_size]`
    /// with values in (0, 1).
    ///
    /// inputs: projected input for exactly one step, `[B, 1, mem_size]`.
    /// memory: previous memory, `[B, mem_slots, mem_size]`.
    pub fn create_gates<C>(
        &self,
        client: &C,
        inputs: &Var<R>,
        memory: &Var<R>,
    ) -> Result<(Var<R>, Var<R>)>
    where
        C: MemoryClient<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        let gates = self.gates.as_ref().ok_or_else(|| Error::InvalidConfig {
            reason: format!("gating is {}", self.config.gate_style),
        })?;

        let shape = inputs.shape().to_vec();
        if shape.len() != 3 {
            return Err(Error::ShapeMismatch {
                arg: "inputs",
                reason: format!("expected [B, 1, features], got {}D {:?}", shape.len(), shape),
            });
        }
        if shape[1] != 1 {
            return Err(Error::ShapeMismatch {
                arg: "inputs",
                reason: format!("gates take a single step, got {} steps", shape[1]),
            });
        }
        let batch = shape[0];

        let memory = Activation::Tanh.forward(client, memory)?;

        // [B, 1, W] -> [B, W] -> [B, 2G] -> [B, 1, 2G]
        let flat = var_reshape(inputs, &[batch, shape[2]]).map_err(Error::Numr)?;
        let gate_inputs = gates.input.forward(client, &flat)?;
        let num_gates = gate_inputs.shape()[1];
        let gate_inputs = var_reshape(&gate_inputs, &[batch, 1, num_gates]).map_err(Error::Numr)?;

        // [B, S, 2G]
        let gate_memory = gates.memory.forward(client, &memory)?;
        let combined = var_add(&gate_memory, &gate_inputs, client).map_err(Error::Numr)?;

        let half = num_gates / 2;
        let split = |start: usize| -> Result<Var<R>> {
            let part = var_narrow(&combined, 2, start, half).map_err(Error::Numr)?;
            var_contiguous(client, &part).map_err(Error::Numr)
        };
        let input_gate = split(0)?;
        let forget_gate = split(half)?;

        let input_gate = var_add(&input_gate, &gates.input_bias, client).map_err(Error::Numr)?;
        let forget_gate = var_add(&forget_gate, &gates.forget_bias, client).map_err(Error::Numr)?;

        Ok((
            var_sigmoid(&input_gate, client).map_err(Error::Numr)?,
            var_sigmoid(&forget_gate, client).map_err(Error::Numr)?,
        ))
    }

    /// `input_gate * tanh(attended) + forget_gate * previous`.
    pub(super) fn blend<C>(
        &self,
        client: &C,
        gates: (Var<R>, Var<R>),
        attended: &Var<R>,
        previous: &Var<R>,
    ) -> Result<Var<R>>
    where
        C: MemoryClient<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        let (input_gate, forget_gate) = gates;
        let squashed = Activation::Tanh.forward(client, attended)?;
        let fresh = var_mul(&input_gate, &squashed, client).map_err(Error::Numr)?;
        let kept = var_mul(&forget_gate, previous, client).map_err(Error::Numr)?;
        var_add(&fresh, &kept, client).map_err(Error::Numr)
    }
}
