//! linkgrad: a minimal reverse-mode autodiff engine in Rust.
//!
//! Operations on tensors are recorded as a computation graph; calling the
//! backward pass on a terminal value propagates gradients to every value
//! that asked for them.
//!
//! # Features
//!
//! - Dense N-dimensional `f64` arrays with shape-checked arithmetic.
//! - A graph arena that records each operation's operands and gradient rule.
//! - Single-pass reverse-mode differentiation over shared sub-expressions.
//! - In-place gradient application and reset for training loops.
//!
//! # Goals
//!
//! - Prioritize correctness, explicitness, and extensibility over black-box
//!   abstraction.
//! - Make graph ownership and gradient accumulation impossible to get wrong
//!   from safe code.
//! - Provide a solid base for small learned models without a framework.
//!
//! # Modules
//!
//! - [`tensors`] — Core dense array type and construction macro.
//! - [`graph`] — The value arena, provenance links, and the operation set.
//! - [`backprop`] — Backward pass, gradient application, and gradient reset.
//! - [`error`] — Error type shared by all fallible operations.
//!
//! # Example
//!
//! ```rust
//! use linkgrad::graph::Graph;
//! use linkgrad::ndarray;
//!
//! let mut g = Graph::new();
//! let a = g.leaf(ndarray!([[1.0, 2.0, 3.0]]), true);
//! let y = g.powf(a, 2.0).unwrap();
//! let z = g.sum(y);
//! g.backward(z, None).unwrap();
//! assert_eq!(g.grad(a).unwrap().data, vec![2.0, 4.0, 6.0]);
//! ```
//!
pub mod backprop;
pub mod error;
pub mod graph;
pub mod tensors;

pub use error::{Error, Result};
