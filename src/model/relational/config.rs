//! Relational memory configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// How the gating controller blends new and previous memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStyle {
    /// One gate value per memory unit (`mem_size` gates per slot)
    #[default]
    Unit,
    /// One gate value per slot, broadcast across its features
    Memory,
    /// No gating; attended memory is carried as-is
    #[serde(alias = "none")]
    Disabled,
}

impl GateStyle {
    /// Width of each gate for a slot of `mem_size` features, `None` if disabled.
    pub fn gate_size(&self, mem_size: usize) -> Option<usize> {
        match self {
            GateStyle::Unit => Some(mem_size),
            GateStyle::Memory => Some(1),
            GateStyle::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, GateStyle::Disabled)
    }
}

impl FromStr for GateStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unit" => Ok(GateStyle::Unit),
            "memory" => Ok(GateStyle::Memory),
            "disabled" | "none" => Ok(GateStyle::Disabled),
            other => Err(Error::InvalidConfig {
                reason: format!("gate_style must be one of [unit, memory, none], got '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for GateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateStyle::Unit => write!(f, "unit"),
            GateStyle::Memory => write!(f, "memory"),
            GateStyle::Disabled => write!(f, "disabled"),
        }
    }
}

/// Configuration for a relational memory core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalMemoryConfig {
    /// Number of memory slots (rows)
    pub mem_slots: usize,
    /// Per-head feature width; also the value size
    pub head_size: usize,
    /// Width of the raw per-step input
    pub input_size: usize,

    #[serde(default = "default_one")]
    pub num_heads: usize,

    /// Attention + MLP rounds applied per step
    #[serde(default = "default_one")]
    pub num_blocks: usize,

    #[serde(default = "default_forget_bias")]
    pub forget_bias: f32,

    #[serde(default)]
    pub input_bias: f32,

    #[serde(default)]
    pub gate_style: GateStyle,

    #[serde(default = "default_attention_mlp_layers")]
    pub attention_mlp_layers: usize,

    /// Query/key width per head, defaults to `head_size`
    #[serde(default)]
    pub key_size: Option<usize>,

    /// Return every step's output from `forward`, not just the last
    #[serde(default)]
    pub return_all_outputs: bool,

    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f32,
}

fn default_one() -> usize {
    1
}

fn default_forget_bias() -> f32 {
    1.0
}

fn default_attention_mlp_layers() -> usize {
    2
}

fn default_layer_norm_eps() -> f32 {
    1e-5
}

impl RelationalMemoryConfig {
    /// Create a config with default heads, blocks, gating and biases.
    pub fn new(mem_slots: usize, head_size: usize, input_size: usize) -> Self {
        Self {
            mem_slots,
            head_size,
            input_size,
            num_heads: 1,
            num_blocks: 1,
            forget_bias: default_forget_bias(),
            input_bias: 0.0,
            gate_style: GateStyle::Unit,
            attention_mlp_layers: default_attention_mlp_layers(),
            key_size: None,
            return_all_outputs: false,
            layer_norm_eps: default_layer_norm_eps(),
        }
    }

    pub fn with_num_heads(mut self, num_heads: usize) -> Self {
        self.num_heads = num_heads;
        self
    }

    pub fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = num_blocks;
        self
    }

    pub fn with_gate_style(mut self, gate_style: GateStyle) -> Self {
        self.gate_style = gate_style;
        self
    }

    pub fn with_attention_mlp_layers(mut self, layers: usize) -> Self {
        self.attention_mlp_layers = layers;
        self
    }

    pub fn with_key_size(mut self, key_size: usize) -> Self {
        self.key_size = Some(key_size);
        self
    }

    pub fn with_biases(mut self, forget_bias: f32, input_bias: f32) -> Self {
        self.forget_bias = forget_bias;
        self.input_bias = input_bias;
        self
    }

    pub fn with_return_all_outputs(mut self, return_all_outputs: bool) -> Self {
        self.return_all_outputs = return_all_outputs;
        self
    }

    /// Slot width: `head_size * num_heads`.
    pub fn mem_size(&self) -> usize {
        self.head_size * self.num_heads
    }

    /// Rows seen by attention: every slot plus the appended input row.
    pub fn mem_slots_plus_input(&self) -> usize {
        self.mem_slots + 1
    }

    pub fn key_size(&self) -> usize {
        self.key_size.unwrap_or(self.head_size)
    }

    pub fn value_size(&self) -> usize {
        self.head_size
    }

    /// Per-head projected width: query + key + value.
    pub fn qkv_size(&self) -> usize {
        2 * self.key_size() + self.value_size()
    }

    pub fn total_qkv_size(&self) -> usize {
        self.qkv_size() * self.num_heads
    }

    /// Width of each gate, `None` when gating is disabled.
    pub fn gate_size(&self) -> Option<usize> {
        self.gate_style.gate_size(self.mem_size())
    }

    /// Width of the combined gate pre-activation (input gate + forget gate).
    pub fn num_gates(&self) -> usize {
        2 * self.gate_size().unwrap_or(0)
    }

    /// Validate config constraints. Returns error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.num_blocks < 1 {
            return Err(Error::InvalidConfig {
                reason: format!("num_blocks must be >= 1, got {}", self.num_blocks),
            });
        }
        if self.attention_mlp_layers < 1 {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "attention_mlp_layers must be >= 1, got {}",
                    self.attention_mlp_layers
                ),
            });
        }
        for (name, value) in [
            ("mem_slots", self.mem_slots),
            ("head_size", self.head_size),
            ("num_heads", self.num_heads),
            ("input_size", self.input_size),
            ("key_size", self.key_size()),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig {
                    reason: format!("{name} must be > 0"),
                });
            }
        }
        if self.layer_norm_eps.is_nan() || self.layer_norm_eps <= 0.0 {
            return Err(Error::InvalidConfig {
                reason: format!("layer_norm_eps must be > 0, got {}", self.layer_norm_eps),
            });
        }
        Ok(())
    }

    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::InvalidConfig {
            reason: format!("IO error: {e}"),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| Error::InvalidConfig {
            reason: format!("YAML parse error: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::InvalidConfig {
            reason: format!("IO error: {e}"),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| Error::InvalidConfig {
            reason: format!("JSON parse error: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }
}
