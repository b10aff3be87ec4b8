/*
 * @Date         : 2026-02-04
 * @Description  : Module trait 定义
 */

use super::Var;

/// 模块 trait
///
/// - `forward()` 不是 trait 方法（各模块签名各异）
/// - `parameters()` 返回 `Vec<Var>`，供优化器绑定参数、统计参数量
pub trait Module {
    /// 获取所有可训练参数
    fn parameters(&self) -> Vec<Var>;

    /// 获取参数数量
    fn num_params(&self) -> usize {
        self.parameters()
            .iter()
            .filter_map(|p| p.shape().ok())
            .map(|shape| shape.iter().product::<usize>())
            .sum()
    }
}
