use linkgrad::Error;
use linkgrad::graph::Graph;
use linkgrad::ndarray;
use linkgrad::tensors::NdArray;

#[test]
fn test_add_backward_ones() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([[1.0, 2.0], [3.0, 4.0]]), true);
    let b = g.leaf(ndarray!([[5.0, 6.0], [7.0, 8.0]]), true);
    let y = g.add(a, b).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![1.0; 4]);
    assert_eq!(g.grad(b).unwrap().data, vec![1.0; 4]);
}

#[test]
fn test_pow_backward() {
    // z = sum(a^3), dz/da = 3 * a^2
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([[1.0, 2.0, 3.0, 4.0]]), true);
    let y = g.powf(a, 3.0).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![3.0, 12.0, 27.0, 48.0]);
}

#[test]
fn test_diamond_accumulates_not_overwrites() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let y = g.add(a, a).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![2.0, 2.0]);
}

#[test]
fn test_matmul_forward_value() {
    // Row-by-column dot product: 1+4+9+16 = 30.
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([[1.0, 2.0, 3.0, 4.0]]), true);
    let b = g.leaf(ndarray!([[1.0], [2.0], [3.0], [4.0]]), true);
    let y = g.mul(a, b).unwrap();
    assert_eq!(g.shape(y), &[1, 1]);
    assert_eq!(g.data(y).data, vec![30.0]);
}

#[test]
fn test_matmul_backward() {
    // a: 1x4 row, b: 4x1 column, y = a*b = 1+4+15+16 = [[36]]
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([[1.0, 2.0, 3.0, 4.0]]), true);
    let b = g.leaf(ndarray!([[1.0], [2.0], [5.0], [4.0]]), true);
    let y = g.mul(a, b).unwrap();
    assert_eq!(g.data(y).data, vec![36.0]);
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().shape, vec![1, 4]);
    assert_eq!(g.grad(a).unwrap().data, vec![1.0, 2.0, 5.0, 4.0]);
    assert_eq!(g.grad(b).unwrap().shape, vec![4, 1]);
    assert_eq!(g.grad(b).unwrap().data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_repeated_leaf_sign_propagation() {
    // y = sum(x - x - x), dy/dx = -1 everywhere
    let mut g = Graph::new();
    let x = g.leaf(ndarray!([[1.0], [2.0], [3.0], [4.0]]), true);
    let t1 = g.sub(x, x).unwrap();
    let t2 = g.sub(t1, x).unwrap();
    let y = g.sum(t2);
    g.backward(y, None).unwrap();
    assert_eq!(g.grad(x).unwrap().data, vec![-1.0, -1.0, -1.0, -1.0]);
}

#[test]
fn test_scalar_broadcast_mul_backward() {
    // y = sum(s * a): ds = sum(a), da = s everywhere
    let mut g = Graph::new();
    let s = g.leaf(ndarray!(2.0), true);
    let a = g.leaf(ndarray!([1.0, 2.0, 3.0]), true);
    let y = g.mul(s, a).unwrap();
    assert_eq!(g.data(y).data, vec![2.0, 4.0, 6.0]);
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(s).unwrap().scalar_value(), 6.0);
    assert_eq!(g.grad(a).unwrap().data, vec![2.0, 2.0, 2.0]);

    // Same with the operand order flipped.
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0, 3.0]), true);
    let s = g.leaf(ndarray!(2.0), true);
    let y = g.mul(a, s).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![2.0, 2.0, 2.0]);
    assert_eq!(g.grad(s).unwrap().scalar_value(), 6.0);
}

#[test]
fn test_relu_backward() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([-1.0, 0.0, 2.0]), true);
    let y = g.relu(a);
    assert_eq!(g.data(y).data, vec![0.0, 0.0, 2.0]);
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![0.0, 0.0, 1.0]);
}

#[test]
fn test_transpose_backward() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]), true);
    let t = g.transpose(a);
    assert_eq!(g.shape(t), &[3, 2]);
    let z = g.sum(t);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().shape, vec![2, 3]);
    assert_eq!(g.grad(a).unwrap().data, vec![1.0; 6]);
}

#[test]
fn test_backward_explicit_seed() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0, 3.0]), true);
    let y = g.relu(a);
    g.backward(y, Some(ndarray!([2.0, 4.0, 6.0]))).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![2.0, 4.0, 6.0]);
}

#[test]
fn test_backward_missing_seed_on_non_scalar() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let err = g.backward(a, None).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation { .. }));
}

#[test]
fn test_backward_without_grad_tracking() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!(1.0), false);
    let err = g.backward(a, None).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation { .. }));
}

#[test]
fn test_backward_seed_shape_mismatch() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let err = g.backward(a, Some(ndarray!([[1.0], [2.0]]))).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn test_shape_mismatch_at_construction() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let b = g.leaf(ndarray!([1.0, 2.0, 3.0]), true);
    let before = g.len();

    assert!(matches!(
        g.add(a, b).unwrap_err(),
        Error::ShapeMismatch { op: "add", .. }
    ));
    assert!(matches!(
        g.sub(a, b).unwrap_err(),
        Error::ShapeMismatch { op: "sub", .. }
    ));
    assert!(matches!(
        g.mul(a, b).unwrap_err(),
        Error::ShapeMismatch { op: "mul", .. }
    ));
    assert!(matches!(
        g.pow(a, b).unwrap_err(),
        Error::ShapeMismatch { op: "pow", .. }
    ));

    // A failed operation records nothing.
    assert_eq!(g.len(), before);
}

#[test]
fn test_matmul_inner_dimension_mismatch() {
    let mut g = Graph::new();
    let a = g.leaf(NdArray::ones(vec![2, 3]), true);
    let b = g.leaf(NdArray::ones(vec![2, 3]), true);
    assert!(matches!(
        g.mul(a, b).unwrap_err(),
        Error::ShapeMismatch { op: "mul", .. }
    ));
}

#[test]
fn test_requires_grad_or_propagation() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0]), false);
    let b = g.leaf(ndarray!([2.0]), false);
    let c = g.leaf(ndarray!([3.0]), true);
    let y = g.add(a, b).unwrap();
    assert!(!g.requires_grad(y));
    let z = g.add(y, c).unwrap();
    assert!(g.requires_grad(z));
}

#[test]
fn test_pruned_operand_gets_no_gradient() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let b = g.leaf(ndarray!([3.0, 4.0]), false);
    let y = g.add(a, b).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![1.0, 1.0]);
    assert!(g.grad(b).is_none());
}

#[test]
fn test_gradients_accumulate_across_backward_passes() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let z = g.sum(a);
    g.backward(z, None).unwrap();
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![2.0, 2.0]);
}

#[test]
fn test_zero_all_grads_resets_everything() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let y = g.add(a, a).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![2.0, 2.0]);

    g.zero_all_grads(z).unwrap();
    assert_eq!(g.grad(a).unwrap().data, vec![0.0, 0.0]);
    assert_eq!(g.grad(y).unwrap().data, vec![0.0, 0.0]);
    assert_eq!(g.grad(z).unwrap().scalar_value(), 0.0);
}

#[test]
fn test_apply_gradients_updates_each_leaf_once() {
    // Diamond: the leaf is reachable along two paths but steps only once.
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let y = g.add(a, a).unwrap();
    let z = g.sum(y);
    g.backward(z, None).unwrap();
    g.apply_gradients(z, 0.5).unwrap();
    // grad was [2, 2]; data -= 0.5 * grad exactly once
    assert_eq!(g.data(a).data, vec![0.0, 1.0]);
    // Derived values keep their recorded data.
    assert_eq!(g.data(y).data, vec![2.0, 4.0]);
}

#[test]
fn test_traversals_require_grad_tracking() {
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0]), false);
    assert!(matches!(
        g.apply_gradients(a, 0.1).unwrap_err(),
        Error::InvalidOperation { .. }
    ));
    assert!(matches!(
        g.zero_all_grads(a).unwrap_err(),
        Error::InvalidOperation { .. }
    ));
}

#[test]
fn test_deep_doubling_chain_is_tractable() {
    // v_{k+1} = v_k + v_k repeated 200 times: exponential gradient,
    // linear-time traversal. Naive re-expansion would take 2^200 visits.
    let mut g = Graph::new();
    let a = g.leaf(ndarray!([1.0, 2.0]), true);
    let mut v = a;
    for _ in 0..200 {
        v = g.add(v, v).unwrap();
    }
    let z = g.sum(v);
    g.backward(z, None).unwrap();
    let expected = 2f64.powi(200);
    assert_eq!(g.grad(a).unwrap().data, vec![expected, expected]);
}

#[test]
fn test_deep_linear_chain_no_stack_overflow() {
    let mut g = Graph::new();
    let x = g.leaf(ndarray!(1.0), true);
    let mut v = x;
    for _ in 0..50_000 {
        v = g.add(v, x).unwrap();
    }
    g.backward(v, None).unwrap();
    assert_eq!(g.grad(x).unwrap().scalar_value(), 50_001.0);
}

#[test]
fn test_gradient_descent_converges() {
    // Minimize (w - 3)^2 by repeated backward / apply / zero cycles.
    let mut g = Graph::new();
    let w = g.leaf(ndarray!(5.0), true);
    let target = g.leaf(ndarray!(3.0), false);
    for _ in 0..200 {
        let diff = g.sub(w, target).unwrap();
        let loss = g.powf(diff, 2.0).unwrap();
        g.zero_all_grads(loss).unwrap();
        g.backward(loss, None).unwrap();
        g.apply_gradients(loss, 0.1).unwrap();
    }
    assert!((g.data(w).scalar_value() - 3.0).abs() < 1e-9);
}

#[test]
fn test_trace_names_operands() {
    let mut g = Graph::new();
    let a = g.leaf_labeled(ndarray!([1.0]), true, "a");
    let b = g.leaf_labeled(ndarray!([2.0]), true, "b");
    let y = g.add(a, b).unwrap();
    assert_eq!(g.label(y), Some("(a+b)"));
    let z = g.sum(y);
    let trace = g.trace(z);
    assert!(trace.contains("a, b -> (a+b)"));
    assert!(trace.contains("(a+b) -> sum((a+b))"));
}
