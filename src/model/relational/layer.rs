//! Relational memory core: weights, construction, and memory seeding.

use super::config::RelationalMemoryConfig;
use crate::error::{Error, Result};
use crate::model::traits::MemoryClient;
use crate::nn::module::prefixed;
use crate::nn::{Init, LayerNorm, Linear, Module, VarBuilder, VarMap};
use numr::autograd::Var;
use numr::dtype::DType;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Input and forget gate projections plus their scalar biases.
pub(super) struct GateProjectors<R: Runtime> {
    pub(super) input: Linear<R>,
    pub(super) memory: Linear<R>,
    pub(super) input_bias: Var<R>,
    pub(super) forget_bias: Var<R>,
}

/// Relational Memory Core.
///
/// Per step: project input → append as extra row → `num_blocks` rounds of
/// (multi-head self-attention → residual → norm → MLP → residual → norm)
/// → drop the input row → optional gated blend with the previous memory.
///
/// All blocks share the same attention, MLP and norm weights. The MLP
/// layers are distinct instances, each with its own weights.
pub struct RelationalMemory<R: Runtime> {
    pub(super) config: RelationalMemoryConfig,
    pub(super) input_projector: Linear<R>,
    pub(super) qkv_projector: Linear<R>,
    pub(super) qkv_layernorm: LayerNorm<R>,
    pub(super) attention_mlp: Vec<Linear<R>>,
    pub(super) attended_memory_layernorm: LayerNorm<R>,
    pub(super) attended_memory_layernorm2: LayerNorm<R>,
    pub(super) gates: Option<GateProjectors<R>>,
}

impl<R: Runtime<DType = DType>> RelationalMemory<R> {
    /// Create a freshly initialized core.
    pub fn new<C>(
        config: RelationalMemoryConfig,
        client: &C,
        device: &R::Device,
        trainable: bool,
    ) -> Result<Self>
    where
        C: MemoryClient<R>,
    {
        let mut varmap = VarMap::new();
        let mut vb = VarBuilder::new(&mut varmap, device);
        Self::from_varbuilder(config, client, &mut vb, trainable)
    }

    /// Build from a VarBuilder, taking stored weights by name and
    /// initializing any that are absent.
    ///
    /// Names: `input_projector`, `qkv_projector`, `qkv_layernorm`,
    /// `attention_mlp.{i}`, `attended_memory_layernorm`,
    /// `attended_memory_layernorm2`, `input_gate_projector`,
    /// `memory_gate_projector` (each with `.weight` / `.bias`), plus the
    /// scalar `input_bias` and `forget_bias`.
    pub fn from_varbuilder<C>(
        config: RelationalMemoryConfig,
        client: &C,
        vb: &mut VarBuilder<R>,
        trainable: bool,
    ) -> Result<Self>
    where
        C: MemoryClient<R>,
    {
        config.validate()?;
        let mem_size = config.mem_size();
        let rows = config.mem_slots_plus_input();
        let eps = config.layer_norm_eps;

        let input_projector = Linear::from_varbuilder(
            client,
            &mut vb.pp("input_projector"),
            config.input_size,
            mem_size,
            trainable,
        )?;
        let qkv_projector = Linear::from_varbuilder(
            client,
            &mut vb.pp("qkv_projector"),
            mem_size,
            config.total_qkv_size(),
            trainable,
        )?;
        let qkv_layernorm = LayerNorm::from_varbuilder(
            client,
            &mut vb.pp("qkv_layernorm"),
            &[rows, config.total_qkv_size()],
            eps,
            trainable,
        )?;

        let mut attention_mlp = Vec::with_capacity(config.attention_mlp_layers);
        {
            let mut mlp_vb = vb.pp("attention_mlp");
            for i in 0..config.attention_mlp_layers {
                attention_mlp.push(Linear::from_varbuilder(
                    client,
                    &mut mlp_vb.pp(&i.to_string()),
                    mem_size,
                    mem_size,
                    trainable,
                )?);
            }
        }

        let attended_memory_layernorm = LayerNorm::from_varbuilder(
            client,
            &mut vb.pp("attended_memory_layernorm"),
            &[rows, mem_size],
            eps,
            trainable,
        )?;
        let attended_memory_layernorm2 = LayerNorm::from_varbuilder(
            client,
            &mut vb.pp("attended_memory_layernorm2"),
            &[rows, mem_size],
            eps,
            trainable,
        )?;

        let gates = match config.gate_size() {
            Some(gate_size) => {
                let num_gates = 2 * gate_size;
                let input = Linear::from_varbuilder(
                    client,
                    &mut vb.pp("input_gate_projector"),
                    mem_size,
                    num_gates,
                    trainable,
                )?;
                let memory = Linear::from_varbuilder(
                    client,
                    &mut vb.pp("memory_gate_projector"),
                    mem_size,
                    num_gates,
                    trainable,
                )?;
                // stored checkpoints may hold these as 0-d scalars
                let input_bias =
                    vb.take_scalar_or_init(client, "input_bias", Init::Const(config.input_bias))?;
                let forget_bias =
                    vb.take_scalar_or_init(client, "forget_bias", Init::Const(config.forget_bias))?;
                Some(GateProjectors {
                    input,
                    memory,
                    input_bias: Var::new(input_bias, trainable),
                    forget_bias: Var::new(forget_bias, trainable),
                })
            }
            None => None,
        };

        let core = Self {
            config,
            input_projector,
            qkv_projector,
            qkv_layernorm,
            attention_mlp,
            attended_memory_layernorm,
            attended_memory_layernorm2,
            gates,
        };
        tracing::debug!(
            mem_slots = core.config.mem_slots,
            mem_size,
            num_heads = core.config.num_heads,
            num_blocks = core.config.num_blocks,
            gate_style = %core.config.gate_style,
            parameters = core.num_parameters(),
            "relational memory constructed"
        );
        Ok(core)
    }

    /// Identity-seeded memory: `[batch, mem_slots, mem_size]`.
    ///
    /// Each batch element is `eye(mem_slots)`, zero-padded on the right when
    /// `mem_size > mem_slots` and truncated to `mem_size` columns otherwise.
    /// The result does not require grad.
    pub fn initial_state(&self, batch_size: usize, device: &R::Device) -> Result<Var<R>> {
        if batch_size == 0 {
            return Err(Error::ShapeMismatch {
                arg: "batch_size",
                reason: "must be > 0".into(),
            });
        }
        let slots = self.config.mem_slots;
        let width = self.config.mem_size();

        let mut data = vec![0.0f32; batch_size * slots * width];
        for seed in data.chunks_mut(slots * width) {
            for i in 0..slots.min(width) {
                seed[i * width + i] = 1.0;
            }
        }
        let seed = Tensor::<R>::from_slice(&data, &[batch_size, slots, width], device);
        Ok(Var::new(seed, false))
    }
}

impl<R: Runtime> RelationalMemory<R> {
    pub fn config(&self) -> &RelationalMemoryConfig {
        &self.config
    }

    /// Per-sample memory shape: `[mem_slots, mem_size]`.
    pub fn state_size(&self) -> [usize; 2] {
        [self.config.mem_slots, self.config.mem_size()]
    }

    /// Width of one step's flattened output.
    pub fn output_size(&self) -> usize {
        self.config.mem_slots * self.config.mem_size()
    }

    pub fn attention_mlp(&self) -> &[Linear<R>] {
        &self.attention_mlp
    }
}

impl<R: Runtime> Module<R> for RelationalMemory<R> {
    fn parameters(&self) -> Vec<&Var<R>> {
        self.named_parameters().into_iter().map(|(_, v)| v).collect()
    }

    fn named_parameters(&self) -> Vec<(String, &Var<R>)> {
        let mut params = Vec::new();
        params.extend(prefixed(
            "input_projector",
            self.input_projector.named_parameters(),
        ));
        params.extend(prefixed("qkv_projector", self.qkv_projector.named_parameters()));
        params.extend(prefixed("qkv_layernorm", self.qkv_layernorm.named_parameters()));
        for (i, layer) in self.attention_mlp.iter().enumerate() {
            params.extend(prefixed(
                &format!("attention_mlp.{i}"),
                layer.named_parameters(),
            ));
        }
        params.extend(prefixed(
            "attended_memory_layernorm",
            self.attended_memory_layernorm.named_parameters(),
        ));
        params.extend(prefixed(
            "attended_memory_layernorm2",
            self.attended_memory_layernorm2.named_parameters(),
        ));
        if let Some(gates) = &self.gates {
            params.extend(prefixed(
                "input_gate_projector",
                gates.input.named_parameters(),
            ));
            params.extend(prefixed(
                "memory_gate_projector",
                gates.memory.named_parameters(),
            ));
            params.push(("input_bias".to_string(), &gates.input_bias));
            params.push(("forget_bias".to_string(), &gates.forget_bias));
        }
        params
    }
}
