//! Neural network module traits for parameter access and serialization.

use crate::nn::varmap::VarMap;
use numr::autograd::Var;
use numr::runtime::Runtime;

/// Core trait for neural network modules.
///
/// Provides access to trainable parameters for optimizers and
/// named parameters for checkpoint serialization.
///
/// Forward passes stay as inherent methods on each layer because
/// signatures differ (different client bounds, input types).
pub trait Module<R: Runtime> {
    /// All trainable parameters (for optimizer).
    fn parameters(&self) -> Vec<&Var<R>>;

    /// Named parameters (for checkpointing). Names use dot notation
    /// for nested modules: `"attention_mlp.0.weight"`.
    fn named_parameters(&self) -> Vec<(String, &Var<R>)>;

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|v| v.tensor().numel()).sum()
    }

    /// Export current weights as a name→tensor map, loadable through
    /// `VarBuilder` by the same module type.
    fn to_varmap(&self) -> VarMap<R> {
        let mut map = VarMap::new();
        for (name, var) in self.named_parameters() {
            map.insert(name, var.tensor().clone());
        }
        map
    }
}

/// Prefix every name of a child module's parameters with `prefix.`.
pub(crate) fn prefixed<'a, R: Runtime>(
    prefix: &str,
    params: Vec<(String, &'a Var<R>)>,
) -> impl Iterator<Item = (String, &'a Var<R>)> {
    let prefix = prefix.to_string();
    params
        .into_iter()
        .map(move |(name, var)| (format!("{prefix}.{name}"), var))
}
