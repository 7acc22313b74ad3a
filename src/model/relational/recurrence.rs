//! Step and sequence execution.

use super::layer::RelationalMemory;
use super::state::Detach;
use crate::error::{Error, Result};
use crate::model::traits::MemoryClient;
use crate::ops::var_contiguous;
use numr::autograd::{Var, var_cat, var_narrow, var_reshape};
use numr::dtype::DType;
use numr::ops::{ActivationOps, CompareOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::Runtime;

/// Accumulator threaded through the time steps of `forward`.
struct Recurrence<R: Runtime> {
    memory: Var<R>,
    outputs: Vec<Var<R>>,
}

impl<R: Runtime<DType = DType>> RelationalMemory<R> {
    /// Advance the memory by one step.
    ///
    /// input: `[B, input...]` flattened to `[B, input_size]`, or with
    /// `treat_input_as_matrix`, `[B, 1, input...]` keeping its step axis.
    /// memory: `[B, mem_slots, mem_size]`.
    ///
    /// Returns `(output [B, mem_slots * mem_size], next_memory)`.
    pub fn forward_step<C>(
        &self,
        client: &C,
        input: &Var<R>,
        memory: &Var<R>,
        treat_input_as_matrix: bool,
    ) -> Result<(Var<R>, Var<R>)>
    where
        C: MemoryClient<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        let batch = self.check_memory(memory)?;
        let input_shape = input.shape().to_vec();
        if input_shape.len() < 2 || input_shape[0] != batch {
            return Err(Error::ShapeMismatch {
                arg: "input",
                reason: format!("expected batch {batch} leading axis, got {input_shape:?}"),
            });
        }

        // [B, 1, mem_size]
        let projected = if treat_input_as_matrix {
            if input_shape.len() < 3 || input_shape[1] != 1 {
                return Err(Error::ShapeMismatch {
                    arg: "input",
                    reason: format!(
                        "matrix input must append exactly one memory row, got {input_shape:?}"
                    ),
                });
            }
            let width = self.check_input_width(&input_shape[2..])?;
            let rows = var_reshape(input, &[batch, 1, width]).map_err(Error::Numr)?;
            self.input_projector.forward(client, &rows)?
        } else {
            let width = self.check_input_width(&input_shape[1..])?;
            let flat = var_reshape(input, &[batch, width]).map_err(Error::Numr)?;
            let projected = self.input_projector.forward(client, &flat)?;
            var_reshape(&projected, &[batch, 1, self.config.mem_size()]).map_err(Error::Numr)?
        };

        let memory_plus_input = var_cat(&[memory, &projected], 1, client).map_err(Error::Numr)?;
        let attended = self.attend_over_memory(client, &memory_plus_input)?;

        // drop the appended input row
        let slots = self.config.mem_slots;
        let attended = var_narrow(&attended, 1, 0, slots).map_err(Error::Numr)?;
        let attended = var_contiguous(client, &attended).map_err(Error::Numr)?;

        let next_memory = if self.config.gate_style.is_enabled() {
            let gates = self.create_gates(client, &projected, memory)?;
            self.blend(client, gates, &attended, memory)?
        } else {
            attended
        };

        let output =
            var_reshape(&next_memory, &[batch, self.output_size()]).map_err(Error::Numr)?;
        Ok((output, next_memory))
    }

    /// Run `forward_step` over every position of the step axis, in order.
    ///
    /// inputs: `[B, T, input...]`. Returns `(outputs, final_memory)` where
    /// outputs is `[B, T, output_size]` when `return_all_outputs` is set and
    /// `[B, 1, output_size]` (the last step) otherwise.
    pub fn forward<C>(
        &self,
        client: &C,
        inputs: &Var<R>,
        memory: &Var<R>,
        treat_input_as_matrix: bool,
    ) -> Result<(Var<R>, Var<R>)>
    where
        C: MemoryClient<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ActivationOps<R> + CompareOps<R>,
    {
        let shape = inputs.shape().to_vec();
        if shape.len() < 2 || shape[1] == 0 {
            return Err(Error::ShapeMismatch {
                arg: "inputs",
                reason: format!("expected [B, T >= 1, ...], got {shape:?}"),
            });
        }
        let batch = shape[0];
        let seq_len = shape[1];
        let step_width: usize = shape[2..].iter().product();
        let return_all = self.config.return_all_outputs;

        let init = Recurrence {
            memory: memory.clone(),
            outputs: Vec::with_capacity(if return_all { seq_len } else { 1 }),
        };
        let done = (0..seq_len).try_fold(init, |mut acc, t| -> Result<Recurrence<R>> {
            let step = var_narrow(inputs, 1, t, 1).map_err(Error::Numr)?;
            let step = var_contiguous(client, &step).map_err(Error::Numr)?;
            let step = if treat_input_as_matrix {
                step
            } else {
                var_reshape(&step, &[batch, step_width]).map_err(Error::Numr)?
            };

            let (output, next_memory) =
                self.forward_step(client, &step, &acc.memory, treat_input_as_matrix)?;
            tracing::trace!(step = t, seq_len, "relational memory step");

            let output =
                var_reshape(&output, &[batch, 1, self.output_size()]).map_err(Error::Numr)?;
            if !return_all {
                acc.outputs.clear();
            }
            acc.outputs.push(output);
            acc.memory = next_memory;
            Ok(acc)
        })?;

        let refs: Vec<&Var<R>> = done.outputs.iter().collect();
        let outputs = var_cat(&refs, 1, client).map_err(Error::Numr)?;
        Ok((outputs, done.memory))
    }

    /// Cut recurrent state loose from its autograd history.
    pub fn repackage_hidden<S: Detach>(&self, state: &S) -> S {
        state.detach()
    }

    fn check_memory(&self, memory: &Var<R>) -> Result<usize> {
        let shape = memory.shape();
        let [slots, width] = self.state_size();
        if shape.len() != 3 || shape[1] != slots || shape[2] != width {
            return Err(Error::ShapeMismatch {
                arg: "memory",
                reason: format!("expected [B, {slots}, {width}], got {shape:?}"),
            });
        }
        Ok(shape[0])
    }

    fn check_input_width(&self, trailing: &[usize]) -> Result<usize> {
        let width: usize = trailing.iter().product();
        if width != self.config.input_size {
            return Err(Error::ShapeMismatch {
                arg: "input",
                reason: format!(
                    "features {trailing:?} flatten to {width}, expected {}",
                    self.config.input_size
                ),
            });
        }
        Ok(width)
    }
}
