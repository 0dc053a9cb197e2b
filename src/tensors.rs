//! Core dense array type and construction macro.
//!
//! # Numeric Array Primitives
//!
//! This module defines the flat numeric arrays the autodiff engine computes
//! with. The graph layer owns all shape *policy* (which shapes an operation
//! accepts); this layer owns the arithmetic itself and only asserts the
//! preconditions the graph layer has already checked.
//!
//! It supports:
//! - Construction of N-dimensional arrays with shape and row-major data layout
//! - Elementwise arithmetic, scalar broadcast, and elementwise powers
//! - Matrix multiplication and axis-reversing transposition
//! - Full reduction to a scalar, and the positive-mask selection ReLU needs
//! - The `ndarray!` macro for ergonomic construction from nested literals
//!
//! ## Design Highlights
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - A scalar is the empty shape `[]` holding exactly one element
//! - Matrix multiplication parallelizes over output rows with `rayon`
//!
//! ## Limitations
//! - Row-major only, `f64` only
//! - No broadcasting beyond scalar-with-array
//! - No slicing or shape inference
//!
//! ## Example
//!
//! ```rust
//! use linkgrad::tensors::NdArray;
//! let t = NdArray::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use rayon::prelude::*;

/// An N-dimensional array with a shape and flat row-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NdArray {
    /// Creates a new array with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape
    /// product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<f64>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Creates a scalar (empty shape, one element).
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Creates an array of the given shape filled with `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: f64) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    /// Creates a zero-filled array of the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Creates a one-filled array of the given shape.
    pub fn ones(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zero-filled array with this array's shape.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone())
    }

    /// One-filled array with this array's shape.
    pub fn ones_like(&self) -> Self {
        Self::ones(self.shape.clone())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the array holds no elements (some dimension is zero).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True for the empty shape `[]`.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// The single element of a scalar array.
    ///
    /// # Panics
    /// Panics if the array is not scalar-shaped.
    pub fn scalar_value(&self) -> f64 {
        assert!(self.is_scalar(), "not a scalar: shape {:?}", self.shape);
        self.data[0]
    }

    /// Elementwise sum of two arrays of identical shape.
    pub fn add(&self, other: &NdArray) -> NdArray {
        self.zip_with(other, |x, y| x + y)
    }

    /// Elementwise difference of two arrays of identical shape.
    pub fn sub(&self, other: &NdArray) -> NdArray {
        self.zip_with(other, |x, y| x - y)
    }

    /// Elementwise product of two arrays of identical shape.
    pub fn mul_elem(&self, other: &NdArray) -> NdArray {
        self.zip_with(other, |x, y| x * y)
    }

    /// Every element multiplied by `factor`.
    pub fn scale(&self, factor: f64) -> NdArray {
        NdArray::new(
            self.shape.clone(),
            self.data.iter().map(|x| x * factor).collect(),
        )
    }

    /// Elementwise negation.
    pub fn neg(&self) -> NdArray {
        self.scale(-1.0)
    }

    /// Every element raised to the power `exponent`.
    pub fn powf_elem(&self, exponent: f64) -> NdArray {
        NdArray::new(
            self.shape.clone(),
            self.data.iter().map(|x| x.powf(exponent)).collect(),
        )
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Elementwise `max(0, x)`, parallelized over elements.
    pub fn max0(&self) -> NdArray {
        let mut data = vec![0.0f64; self.data.len()];
        data.par_iter_mut()
            .zip(self.data.par_iter())
            .for_each(|(y, &x)| {
                *y = if x > 0.0 { x } else { 0.0 };
            });
        NdArray::new(self.shape.clone(), data)
    }

    /// Selects `grad` where `self` is strictly positive, zero elsewhere.
    ///
    /// This is the backward mask of [`NdArray::max0`].
    pub fn positive_mask(&self, grad: &NdArray) -> NdArray {
        self.zip_with(grad, |x, g| if x > 0.0 { g } else { 0.0 })
    }

    /// In-place elementwise accumulation: `self += other`.
    ///
    /// # Panics
    /// Panics if shapes do not match.
    pub fn accumulate(&mut self, other: &NdArray) {
        assert_eq!(self.shape, other.shape, "accumulate shape mismatch");
        for (acc, x) in self.data.iter_mut().zip(&other.data) {
            *acc += x;
        }
    }

    /// Matrix product `self (m×k) · other (k×n)`, parallelized over rows.
    ///
    /// # Panics
    /// Panics if either operand is not 2-D or the inner dimensions differ.
    pub fn matmul(&self, other: &NdArray) -> NdArray {
        assert_eq!(self.shape.len(), 2, "matmul lhs must be 2-D");
        assert_eq!(other.shape.len(), 2, "matmul rhs must be 2-D");
        let m = self.shape[0];
        let k = self.shape[1];
        let n = other.shape[1];
        assert_eq!(k, other.shape[0], "matmul inner dimension mismatch");

        let a = &self.data;
        let b = &other.data;
        let mut out = vec![0.0f64; m * n];

        out.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            for (j, cell) in row.iter_mut().enumerate() {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += a[i * k + l] * b[l * n + j];
                }
                *cell = sum;
            }
        });

        NdArray::new(vec![m, n], out)
    }

    /// Reverses the axis order. Scalars and 1-D arrays are returned
    /// unchanged; for 2-D arrays this is the ordinary matrix transpose.
    pub fn transpose(&self) -> NdArray {
        let ndim = self.shape.len();
        if ndim < 2 {
            return self.clone();
        }

        // Row-major strides of the source layout.
        let mut strides = vec![1usize; ndim];
        for i in (0..ndim - 1).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }

        let shape: Vec<usize> = self.shape.iter().rev().copied().collect();
        let mut data = vec![0.0f64; self.data.len()];
        let mut index = vec![0usize; ndim];

        for slot in data.iter_mut() {
            let mut src = 0;
            for (axis, &i) in index.iter().enumerate() {
                src += i * strides[ndim - 1 - axis];
            }
            *slot = self.data[src];

            // Odometer increment over the destination shape.
            for axis in (0..ndim).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        NdArray::new(shape, data)
    }

    fn zip_with(&self, other: &NdArray, f: impl Fn(f64, f64) -> f64) -> NdArray {
        assert_eq!(self.shape, other.shape, "elementwise shape mismatch");
        NdArray::new(
            self.shape.clone(),
            self.data
                .iter()
                .zip(&other.data)
                .map(|(&x, &y)| f(x, y))
                .collect(),
        )
    }
}

/// Defines an array from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in
/// shape. Innermost elements are ordinary expressions, so negated values
/// work. A bare expression produces a scalar (empty shape).
///
/// # Example
/// ```
/// use linkgrad::ndarray;
/// let t = ndarray!([[1.0, -2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! ndarray {
    // Nested lists: every element is itself a bracketed list.
    ([ $( [ $($inner:tt)* ] ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::ndarray!([ $($inner)* ]) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged array literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::NdArray::new(shape, data)
    }};

    // Flat row of expressions.
    ([ $( $x:expr ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        let shape = vec![data.len()];
        $crate::tensors::NdArray::new(shape, data)
    }};

    // Scalar (empty shape).
    ($x:expr) => {
        $crate::tensors::NdArray::new(Vec::<usize>::new(), vec![$x])
    };
}
