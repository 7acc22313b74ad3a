//! Recurrent state containers and history detachment.
//!
//! Truncated BPTT cuts the autograd graph at batch boundaries: the memory
//! carried into the next batch keeps its values but none of the ops that
//! produced it. `Detach` does that for a single `Var` and recursively for
//! containers of them.

use numr::autograd::Var;
use numr::runtime::Runtime;

/// Values that can be cut loose from their autograd history.
pub trait Detach {
    /// Same values, no grad_fn, no gradient tracking.
    fn detach(&self) -> Self;
}

impl<R: Runtime> Detach for Var<R> {
    fn detach(&self) -> Self {
        Var::new(self.tensor().clone(), false)
    }
}

impl<T: Detach> Detach for Vec<T> {
    fn detach(&self) -> Self {
        self.iter().map(Detach::detach).collect()
    }
}

impl<T: Detach> Detach for Option<T> {
    fn detach(&self) -> Self {
        self.as_ref().map(Detach::detach)
    }
}

impl<A: Detach, B: Detach> Detach for (A, B) {
    fn detach(&self) -> Self {
        (self.0.detach(), self.1.detach())
    }
}

/// Arbitrarily nested recurrent state: a tensor leaf or a composite of states.
pub enum HiddenState<R: Runtime> {
    Tensor(Var<R>),
    Composite(Vec<HiddenState<R>>),
}

impl<R: Runtime> HiddenState<R> {
    /// Leaf tensors in depth-first order.
    pub fn leaves(&self) -> Vec<&Var<R>> {
        match self {
            HiddenState::Tensor(v) => vec![v],
            HiddenState::Composite(children) => {
                children.iter().flat_map(HiddenState::leaves).collect()
            }
        }
    }

    /// The leaf tensor, if this node is one.
    pub fn as_tensor(&self) -> Option<&Var<R>> {
        match self {
            HiddenState::Tensor(v) => Some(v),
            HiddenState::Composite(_) => None,
        }
    }
}

impl<R: Runtime> Detach for HiddenState<R> {
    fn detach(&self) -> Self {
        match self {
            HiddenState::Tensor(v) => HiddenState::Tensor(v.detach()),
            HiddenState::Composite(children) => HiddenState::Composite(children.detach()),
        }
    }
}

impl<R: Runtime> From<Var<R>> for HiddenState<R> {
    fn from(v: Var<R>) -> Self {
        HiddenState::Tensor(v)
    }
}

impl<R: Runtime> From<Vec<HiddenState<R>>> for HiddenState<R> {
    fn from(children: Vec<HiddenState<R>>) -> Self {
        HiddenState::Composite(children)
    }
}
