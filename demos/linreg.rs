//! Linear regression on synthetic data, trained with the graph engine.
//!
//! Run with `cargo run --example linreg`.

use linkgrad::graph::Graph;
use linkgrad::ndarray;
use linkgrad::tensors::NdArray;
use rand::Rng;

fn main() {
    let mut rng = rand::rng();

    let true_w = ndarray!([[2.0], [-3.0]]);
    let n = 16;
    let x_data: Vec<f64> = (0..n * 2).map(|_| rng.random_range(-1.0..1.0)).collect();
    let inputs = NdArray::new(vec![n, 2], x_data);
    let targets = inputs.matmul(&true_w);

    let mut g = Graph::new();
    let x = g.leaf_labeled(inputs, false, "x");
    let y = g.leaf_labeled(targets, false, "y");
    let w_init: Vec<f64> = (0..2).map(|_| rng.random_range(-1.0..1.0)).collect();
    let w = g.leaf_labeled(NdArray::new(vec![2, 1], w_init), true, "w");

    for step in 0..500 {
        let pred = g.mul(x, w).expect("x and w are compatible");
        let diff = g.sub(pred, y).expect("pred and y share a shape");
        let sq = g.powf(diff, 2.0).expect("exponent is scalar");
        let loss = g.sum(sq);

        g.zero_all_grads(loss).expect("loss tracks gradients");
        g.backward(loss, None).expect("loss is scalar");
        g.apply_gradients(loss, 0.01).expect("loss tracks gradients");

        if step % 100 == 0 {
            println!("step {step:4}  loss {:.6}", g.data(loss).scalar_value());
        }
    }

    println!("learned w = {:?}", g.data(w).data);
    println!("true    w = [2.0, -3.0]");
}
