/*
 * @Date         : 2026-02-05
 * @Description  : Optimizer API - PyTorch 风格
 */

mod adam;

pub use adam::{Adam, AdamState};

use crate::nn::{GraphError, Var};

/// Optimizer trait
///
/// - 优化器绑定特定参数（通过 Var）
/// - `backward()` 计算所有参数的梯度（由 Var 调用）
/// - `step()` 只更新优化器绑定的参数
///
/// ```ignore
/// let mut optimizer = Adam::new(&graph, &model.parameters(), 1e-4)?;
/// let loss_val = optimizer.minimize(&loss)?;
/// ```
pub trait Optimizer {
    /// 清零所有绑定参数的梯度
    fn zero_grad(&mut self) -> Result<(), GraphError>;

    /// 更新参数
    fn step(&mut self) -> Result<(), GraphError>;

    /// 一步完成：zero_grad + backward + step，返回 loss 的标量值
    fn minimize(&mut self, loss: &Var) -> Result<f32, GraphError> {
        self.zero_grad()?;
        let loss_val = loss.backward()?;
        self.step()?;
        Ok(loss_val)
    }

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, lr: f32);

    /// 重置累积状态（如 Adam 的动量）
    fn reset(&mut self);
}
