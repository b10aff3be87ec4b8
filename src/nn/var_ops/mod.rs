/*
 * @Date         : 2026-02-04
 * @Description  : Var 扩展 trait 模块，按功能领域组织 Var 的扩展方法，用户按需 import。
 *
 * - `activation`: 激活函数（sigmoid, tanh, softmax, dropout）
 * - `loss`: 损失函数（softmax_cross_entropy, sigmoid_cross_entropy）
 * - `matrix`: 矩阵运算（matmul）
 * - `shape`: 形状变换与归约（concat_cols, slice_cols, sum, sum_rows, mean）
 */

mod activation;
mod loss;
mod matrix;
mod shape;

pub use activation::VarActivationOps;
pub use loss::VarLossOps;
pub use matrix::VarMatrixOps;
pub use shape::VarShapeOps;
