mod layer_lstm;

use crate::nn::{Graph, Var};
use crate::tensor::Tensor;

/// 数值梯度：对参数`param`逐元素做中心差分，`build`每次在当前参数值上重建 loss
pub(super) fn numeric_grad(
    graph: &Graph,
    param: &Var,
    build: &dyn Fn() -> Var,
    eps: f32,
) -> Tensor {
    let base = param.value().unwrap();
    let mut grad = Tensor::zeros(base.shape());
    for r in 0..base.rows() {
        for c in 0..base.cols() {
            let mut plus = base.clone();
            plus[[r, c]] += eps;
            param.set_value(&plus).unwrap();
            let loss_plus = build().item().unwrap();

            let mut minus = base.clone();
            minus[[r, c]] -= eps;
            param.set_value(&minus).unwrap();
            let loss_minus = build().item().unwrap();

            grad[[r, c]] = (loss_plus - loss_minus) / (2.0 * eps);
        }
    }
    param.set_value(&base).unwrap();
    graph.release_transients();
    grad
}

/// 解析梯度与数值梯度逐元素比较
pub(super) fn assert_grad_close(analytic: &Tensor, numeric: &Tensor, tol: f32) {
    assert_eq!(analytic.shape(), numeric.shape());
    for (a, n) in analytic.to_vec().iter().zip(numeric.to_vec()) {
        assert!(
            (a - n).abs() <= tol * (1.0 + n.abs()),
            "解析梯度 {a} 与数值梯度 {n} 不符\n解析：{analytic}\n数值：{numeric}"
        );
    }
}
