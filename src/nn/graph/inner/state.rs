/*
 * @Date         : 2026-02-05
 * @Description  : 按参数名组织的参数快照（state dict）：导出、载入、向另一组参数插值
 */

use std::collections::BTreeMap;

use super::GraphInner;
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// 参数名 -> 参数值（按名字有序，便于稳定序列化）
pub type StateDict = BTreeMap<String, Tensor>;

impl GraphInner {
    /// 导出所有参数的当前值
    pub fn state_dict(&self) -> StateDict {
        self.parameter_names
            .iter()
            .filter_map(|(name, id)| {
                self.nodes
                    .get(id)
                    .map(|node| (name.clone(), node.value.clone()))
            })
            .collect()
    }

    /// 载入参数值：图中每个参数都须在`state`中出现且形状一致；`state`中多余的条目被忽略
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<(), GraphError> {
        self.blend_state_dict(state, 1.0)
    }

    /// θ ← (1 - rate)·θ + rate·θ_src；`rate >= 1`时直接复制
    pub fn blend_state_dict(&mut self, source: &StateDict, rate: f32) -> Result<(), GraphError> {
        if !(rate > 0.0) {
            return Err(GraphError::InvalidOperation(format!(
                "插值系数须为正数，实际为{rate}"
            )));
        }
        // 先整体校验，避免只更新了一部分参数
        for (name, id) in &self.parameter_names {
            let src = source
                .get(name)
                .ok_or_else(|| GraphError::MissingParameter(name.clone()))?;
            let current = self.get_node_value(*id)?;
            if current.shape() != src.shape() {
                return Err(GraphError::ShapeMismatch {
                    expected: current.shape().to_vec(),
                    got: src.shape().to_vec(),
                    message: format!("参数{name}的形状与快照不符"),
                });
            }
        }

        let ids: Vec<_> = self.parameter_names.iter().map(|(n, id)| (n.clone(), *id)).collect();
        for (name, id) in ids {
            let src = &source[&name];
            let blended = if rate >= 1.0 {
                src.clone()
            } else {
                let current = self.get_node_value(id)?;
                &(current * (1.0 - rate)) + &(src * rate)
            };
            self.set_node_value(id, &blended)?;
        }
        Ok(())
    }
}
