//! The value arena, provenance links, and the operation set.
//!
//! # Graph Recording
//!
//! Every value the engine computes with lives in a [`Graph`] arena and is
//! addressed by a copyable [`Value`] handle. Leaf values are created
//! directly by the caller; derived values are created only as the result of
//! an operation and carry a [`Link`] naming their operands and the
//! operation that produced them. The backward pass in [`crate::backprop`]
//! replays those links in reverse.
//!
//! ## Design Highlights
//! - The arena owns every node; handles are plain indices, so sharing a
//!   value between arbitrarily many consumers is free and the operand graph
//!   is acyclic by construction (operands always have smaller indices).
//! - Shape contracts are checked before any node is allocated, so a failed
//!   operation leaves the graph untouched.
//! - A derived value's `requires_grad` is the OR of its operands' flags,
//!   which makes the flag an exact "does anything beneath me want a
//!   gradient" summary the traversals can prune on.
//!
//! ## Limitations
//! - Handles are only meaningful for the graph that created them.
//! - Nodes are never freed; a long-lived graph used for many training steps
//!   grows with every recorded expression.
//!
//! ## Example
//!
//! ```rust
//! use linkgrad::graph::Graph;
//! use linkgrad::ndarray;
//!
//! let mut g = Graph::new();
//! let a = g.leaf(ndarray!([[1.0, 2.0]]), true);
//! let b = g.leaf(ndarray!([[3.0, 4.0]]), true);
//! let y = g.add(a, b).unwrap();
//! assert_eq!(g.data(y).data, vec![4.0, 6.0]);
//! ```

use crate::error::{Error, Result};
use crate::tensors::NdArray;

/// Handle to a value stored in a [`Graph`].
///
/// Handles are cheap to copy and only valid for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(pub(crate) usize);

/// The operation that produced a derived value.
///
/// Each variant fixes the gradient rule the backward pass applies to the
/// link's operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Add,
    Sub,
    /// Elementwise multiplication where one operand is scalar-shaped.
    MulScalar,
    /// 2-D matrix product.
    Matmul,
    /// Elementwise power; the exponent operand is treated as a constant.
    Pow,
    Relu,
    /// Full reduction to a scalar.
    Sum,
    Transpose,
}

/// Provenance record attached to a derived value.
#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub(crate) operands: Vec<Value>,
    pub(crate) op: Op,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) data: NdArray,
    pub(crate) grad: Option<NdArray>,
    pub(crate) requires_grad: bool,
    pub(crate) link: Option<Link>,
    pub(crate) label: Option<String>,
}

/// Arena holding one computation graph.
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creates a leaf value. Its gradient buffer is allocated (zeroed)
    /// immediately when `requires_grad` is set.
    pub fn leaf(&mut self, data: NdArray, requires_grad: bool) -> Value {
        self.push(data, requires_grad, None, None)
    }

    /// Creates a labeled leaf value. Labels have no semantic effect; they
    /// only show up in [`Graph::trace`] output.
    pub fn leaf_labeled(
        &mut self,
        data: NdArray,
        requires_grad: bool,
        label: impl Into<String>,
    ) -> Value {
        self.push(data, requires_grad, None, Some(label.into()))
    }

    /// The forward data of a value.
    pub fn data(&self, value: Value) -> &NdArray {
        &self.node(value).data
    }

    /// The accumulated gradient of a value, if it tracks one.
    pub fn grad(&self, value: Value) -> Option<&NdArray> {
        self.node(value).grad.as_ref()
    }

    /// The shape of a value's data.
    pub fn shape(&self, value: Value) -> &[usize] {
        &self.node(value).data.shape
    }

    pub fn requires_grad(&self, value: Value) -> bool {
        self.node(value).requires_grad
    }

    /// True when the value was created directly rather than by an operation.
    pub fn is_leaf(&self, value: Value) -> bool {
        self.node(value).link.is_none()
    }

    pub fn label(&self, value: Value) -> Option<&str> {
        self.node(value).label.as_deref()
    }

    pub fn set_label(&mut self, value: Value, label: impl Into<String>) {
        self.nodes[value.0].label = Some(label.into());
    }

    /// Elementwise sum; operand shapes must be identical.
    pub fn add(&mut self, a: Value, b: Value) -> Result<Value> {
        self.check_same_shape("add", a, b)?;
        let data = self.node(a).data.add(&self.node(b).data);
        Ok(self.derived(data, Op::Add, vec![a, b]))
    }

    /// Elementwise difference; operand shapes must be identical.
    pub fn sub(&mut self, a: Value, b: Value) -> Result<Value> {
        self.check_same_shape("sub", a, b)?;
        let data = self.node(a).data.sub(&self.node(b).data);
        Ok(self.derived(data, Op::Sub, vec![a, b]))
    }

    /// Multiplication. When either operand is scalar-shaped this is a
    /// broadcast elementwise product; otherwise both operands must be 2-D
    /// matrices with compatible inner dimensions and this is the matrix
    /// product.
    pub fn mul(&mut self, a: Value, b: Value) -> Result<Value> {
        let lhs = &self.node(a).data;
        let rhs = &self.node(b).data;

        if lhs.is_scalar() || rhs.is_scalar() {
            let data = if lhs.is_scalar() {
                rhs.scale(lhs.scalar_value())
            } else {
                lhs.scale(rhs.scalar_value())
            };
            return Ok(self.derived(data, Op::MulScalar, vec![a, b]));
        }

        if lhs.shape.len() != 2 || rhs.shape.len() != 2 || lhs.shape[1] != rhs.shape[0] {
            return Err(Error::ShapeMismatch {
                op: "mul",
                lhs: lhs.shape.clone(),
                rhs: rhs.shape.clone(),
            });
        }

        let data = lhs.matmul(rhs);
        Ok(self.derived(data, Op::Matmul, vec![a, b]))
    }

    /// Elementwise power; the exponent must be scalar-shaped. Gradients
    /// flow to the base only.
    pub fn pow(&mut self, base: Value, exponent: Value) -> Result<Value> {
        let exp = &self.node(exponent).data;
        if !exp.is_scalar() {
            return Err(Error::ShapeMismatch {
                op: "pow",
                lhs: self.node(base).data.shape.clone(),
                rhs: exp.shape.clone(),
            });
        }
        let data = self.node(base).data.powf_elem(exp.scalar_value());
        Ok(self.derived(data, Op::Pow, vec![base, exponent]))
    }

    /// [`Graph::pow`] with a bare float exponent, recorded as an internal
    /// constant scalar.
    pub fn powf(&mut self, base: Value, exponent: f64) -> Result<Value> {
        let exp = self.leaf_labeled(NdArray::scalar(exponent), false, exponent.to_string());
        self.pow(base, exp)
    }

    /// Elementwise `max(0, x)`.
    pub fn relu(&mut self, a: Value) -> Value {
        let data = self.node(a).data.max0();
        self.derived(data, Op::Relu, vec![a])
    }

    /// Sum of all elements, reduced to a scalar.
    pub fn sum(&mut self, a: Value) -> Value {
        let data = NdArray::scalar(self.node(a).data.sum());
        self.derived(data, Op::Sum, vec![a])
    }

    /// Axis-reversing transposition. Scalars and 1-D values pass through
    /// unchanged (but are still recorded, so gradients flow).
    pub fn transpose(&mut self, a: Value) -> Value {
        let data = self.node(a).data.transpose();
        self.derived(data, Op::Transpose, vec![a])
    }

    /// Renders the reachable subgraph in dependency order, one value per
    /// line as `operand, operand -> result`. Unlabeled values print as
    /// `#index`.
    pub fn trace(&self, value: Value) -> String {
        let mut out = String::new();
        for v in self.reachable(value, false) {
            if let Some(link) = &self.node(v).link {
                let operands: Vec<String> =
                    link.operands.iter().map(|&o| self.display_name(o)).collect();
                out.push_str(&operands.join(", "));
                out.push_str(" -> ");
            }
            out.push_str(&self.display_name(v));
            out.push('\n');
        }
        out
    }

    /// Post-order (operands before consumers) listing of the subgraph
    /// reachable from `root`, visiting each value once. With `pruned` set,
    /// operands that do not require a gradient are skipped along with
    /// everything beneath them.
    ///
    /// Uses an explicit stack, so graph depth is not bounded by the call
    /// stack.
    pub(crate) fn reachable(&self, root: Value, pruned: bool) -> Vec<Value> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((v, expanded)) = stack.pop() {
            if expanded {
                order.push(v);
                continue;
            }
            if visited[v.0] {
                continue;
            }
            visited[v.0] = true;
            stack.push((v, true));
            if let Some(link) = &self.node(v).link {
                for &operand in &link.operands {
                    if pruned && !self.node(operand).requires_grad {
                        continue;
                    }
                    if !visited[operand.0] {
                        stack.push((operand, false));
                    }
                }
            }
        }

        order
    }

    pub(crate) fn node(&self, value: Value) -> &Node {
        &self.nodes[value.0]
    }

    pub(crate) fn node_mut(&mut self, value: Value) -> &mut Node {
        &mut self.nodes[value.0]
    }

    fn display_name(&self, value: Value) -> String {
        match &self.node(value).label {
            Some(label) => label.clone(),
            None => format!("#{}", value.0),
        }
    }

    fn check_same_shape(&self, op: &'static str, a: Value, b: Value) -> Result<()> {
        let lhs = &self.node(a).data.shape;
        let rhs = &self.node(b).data.shape;
        if lhs != rhs {
            return Err(Error::ShapeMismatch {
                op,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            });
        }
        Ok(())
    }

    fn derived(&mut self, data: NdArray, op: Op, operands: Vec<Value>) -> Value {
        let requires_grad = operands.iter().any(|&v| self.node(v).requires_grad);
        let label = self.derived_label(op, &operands);
        self.push(data, requires_grad, Some(Link { operands, op }), label)
    }

    fn derived_label(&self, op: Op, operands: &[Value]) -> Option<String> {
        let names: Vec<&str> = operands
            .iter()
            .map(|&v| self.node(v).label.as_deref())
            .collect::<Option<Vec<&str>>>()?;
        Some(match op {
            Op::Add => format!("({}+{})", names[0], names[1]),
            Op::Sub => format!("({}-{})", names[0], names[1]),
            Op::MulScalar | Op::Matmul => format!("({}*{})", names[0], names[1]),
            Op::Pow => format!("({}^{})", names[0], names[1]),
            Op::Relu => format!("relu({})", names[0]),
            Op::Sum => format!("sum({})", names[0]),
            Op::Transpose => format!("transpose({})", names[0]),
        })
    }

    fn push(
        &mut self,
        data: NdArray,
        requires_grad: bool,
        link: Option<Link>,
        label: Option<String>,
    ) -> Value {
        let grad = requires_grad.then(|| data.zeros_like());
        self.nodes.push(Node {
            data,
            grad,
            requires_grad,
            link,
            label,
        });
        Value(self.nodes.len() - 1)
    }
}
