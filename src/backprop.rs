//! Backward pass, gradient application, and gradient reset.
//!
//! # Reverse-Mode Differentiation
//!
//! The traversals here replay the links recorded by [`crate::graph`] in
//! reverse. All three walk the reachable subgraph exactly once per value,
//! so a value shared by many consumers (a diamond dependency) costs linear
//! work while still receiving every path's gradient contribution.
//!
//! ## Autograd Pattern
//!
//! 1. A topological order of the reachable subgraph is computed once, with
//!    an explicit stack (graph depth is not limited by the call stack).
//! 2. The order is walked root-first. Each value's incoming contributions
//!    are summed into a per-value buffer *before* its own gradient rule
//!    runs, so the rule runs exactly once per value.
//! 3. The buffered total is accumulated (`+=`, never overwritten) into the
//!    value's gradient, then split into per-operand contributions.
//!
//! ## Usage Guidelines
//!
//! - Call [`Graph::zero_all_grads`] between training steps; gradients
//!   accumulate across backward passes by design.
//! - Operands that do not require a gradient are pruned together with
//!   everything beneath them (the OR rule of the graph layer makes the
//!   flag an exact reachability summary).
//! - Total cost is linear in the number of reachable values and edges.

use crate::error::{Error, Result};
use crate::graph::{Graph, Link, Op, Value};
use crate::tensors::NdArray;

impl Graph {
    /// Propagates gradients from `value` back to every reachable value
    /// that requires them.
    ///
    /// `seed` is the incoming gradient at `value` (the chain-rule seed).
    /// It may be omitted only for scalar-shaped values, where it defaults
    /// to 1.
    ///
    /// # Errors
    /// - [`Error::InvalidOperation`] when `value` does not require a
    ///   gradient, or when `seed` is omitted on a non-scalar value.
    /// - [`Error::ShapeMismatch`] when an explicit seed's shape differs
    ///   from the value's shape.
    pub fn backward(&mut self, value: Value, seed: Option<NdArray>) -> Result<()> {
        let node = self.node(value);
        if !node.requires_grad {
            return Err(Error::invalid(
                "cannot call backward on a value that does not require grad",
            ));
        }
        let seed = match seed {
            Some(grad) => {
                if grad.shape != node.data.shape {
                    return Err(Error::ShapeMismatch {
                        op: "backward",
                        lhs: node.data.shape.clone(),
                        rhs: grad.shape,
                    });
                }
                grad
            }
            None => {
                if !node.data.is_scalar() {
                    return Err(Error::invalid(
                        "a gradient must be supplied when calling backward on a non-scalar value",
                    ));
                }
                NdArray::scalar(1.0)
            }
        };

        let order = self.reachable(value, true);
        let mut buffers: Vec<Option<NdArray>> = vec![None; self.len()];
        buffers[value.0] = Some(seed);

        // Root-first walk: every contribution to a value lands in its
        // buffer before the value itself is popped.
        for &v in order.iter().rev() {
            let Some(total) = buffers[v.0].take() else {
                continue;
            };

            let contributions = match &self.node(v).link {
                Some(link) => self.operand_gradients(link, &total),
                None => Vec::new(),
            };

            let node = self.node_mut(v);
            match node.grad.take() {
                Some(mut acc) => {
                    acc.accumulate(&total);
                    node.grad = Some(acc);
                }
                None => node.grad = Some(total),
            }

            for (operand, contribution) in contributions {
                match buffers[operand.0].take() {
                    Some(mut acc) => {
                        acc.accumulate(&contribution);
                        buffers[operand.0] = Some(acc);
                    }
                    None => buffers[operand.0] = Some(contribution),
                }
            }
        }

        Ok(())
    }

    /// Updates every reachable grad-requiring leaf in place:
    /// `data -= learning_rate * grad`. Each leaf is visited exactly once no
    /// matter how many paths reach it.
    ///
    /// # Errors
    /// [`Error::InvalidOperation`] when `value` does not require a gradient.
    pub fn apply_gradients(&mut self, value: Value, learning_rate: f64) -> Result<()> {
        if !self.node(value).requires_grad {
            return Err(Error::invalid(
                "cannot call apply_gradients on a value that does not require grad",
            ));
        }

        for v in self.reachable(value, true) {
            let node = self.node_mut(v);
            if node.link.is_some() {
                continue;
            }
            if let Some(grad) = &node.grad {
                for (w, g) in node.data.data.iter_mut().zip(&grad.data) {
                    *w -= learning_rate * g;
                }
            }
        }

        Ok(())
    }

    /// Resets every reachable grad-requiring value's gradient to zero,
    /// exactly once per value. Required before each new backward pass to
    /// avoid cross-step gradient contamination.
    ///
    /// # Errors
    /// [`Error::InvalidOperation`] when `value` does not require a gradient.
    pub fn zero_all_grads(&mut self, value: Value) -> Result<()> {
        if !self.node(value).requires_grad {
            return Err(Error::invalid(
                "cannot call zero_all_grads on a value that does not require grad",
            ));
        }

        for v in self.reachable(value, true) {
            let node = self.node_mut(v);
            node.grad = Some(node.data.zeros_like());
        }

        Ok(())
    }

    /// Maps the gradient arriving at a derived value into one contribution
    /// per grad-requiring operand.
    fn operand_gradients(&self, link: &Link, grad: &NdArray) -> Vec<(Value, NdArray)> {
        let mut out = Vec::with_capacity(link.operands.len());

        match link.op {
            Op::Add => {
                out.push((link.operands[0], grad.clone()));
                out.push((link.operands[1], grad.clone()));
            }
            Op::Sub => {
                out.push((link.operands[0], grad.clone()));
                out.push((link.operands[1], grad.neg()));
            }
            Op::Matmul => {
                let (a, b) = (link.operands[0], link.operands[1]);
                let lhs = &self.node(a).data;
                let rhs = &self.node(b).data;
                out.push((a, grad.matmul(&rhs.transpose())));
                out.push((b, lhs.transpose().matmul(grad)));
            }
            Op::MulScalar => {
                let (a, b) = (link.operands[0], link.operands[1]);
                let lhs = &self.node(a).data;
                let rhs = &self.node(b).data;
                out.push((a, Self::broadcast_mul_grad(lhs, rhs, grad)));
                out.push((b, Self::broadcast_mul_grad(rhs, lhs, grad)));
            }
            Op::Pow => {
                let base = link.operands[0];
                let n = self.node(link.operands[1]).data.scalar_value();
                let local = self.node(base).data.powf_elem(n - 1.0).scale(n);
                out.push((base, local.mul_elem(grad)));
                // The exponent operand is a constant; no gradient flows to it.
            }
            Op::Relu => {
                let a = link.operands[0];
                out.push((a, self.node(a).data.positive_mask(grad)));
            }
            Op::Sum => {
                let a = link.operands[0];
                let shape = self.node(a).data.shape.clone();
                out.push((a, NdArray::full(shape, grad.scalar_value())));
            }
            Op::Transpose => {
                out.push((link.operands[0], grad.transpose()));
            }
        }

        out.retain(|(v, _)| self.node(*v).requires_grad);
        out
    }

    /// Gradient of one operand of a scalar-broadcast product: the scalar
    /// side collects the full sum of `grad ⊙ other`, the array side gets
    /// `grad` scaled by the scalar.
    fn broadcast_mul_grad(this: &NdArray, other: &NdArray, grad: &NdArray) -> NdArray {
        if this.is_scalar() && !other.is_scalar() {
            NdArray::scalar(grad.mul_elem(other).sum())
        } else {
            grad.scale(other.scalar_value())
        }
    }
}
