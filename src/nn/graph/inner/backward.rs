/*
 * @Date         : 2026-02-04
 * @Description  : 反向传播：从标量 loss 节点出发，按节点 ID 逆序做向量-雅可比积，
 *                 参数节点上的梯度累加（直到 zero_grad）
 */

use std::collections::{HashMap, HashSet};

use super::GraphInner;
use crate::nn::nodes::TraitNode;
use crate::nn::{GraphError, NodeId};
use crate::tensor::Tensor;

impl GraphInner {
    /// 对标量节点`loss`反向传播，返回 loss 的值
    pub fn backward(&mut self, loss: NodeId) -> Result<f32, GraphError> {
        let loss_value = self.get_node_value(loss)?.get_data_number().ok_or_else(|| {
            GraphError::InvalidOperation(format!(
                "只能对标量节点反向传播，{}的形状为{:?}",
                loss,
                self.get_node_value(loss).map(|v| v.shape().to_vec()).unwrap_or_default()
            ))
        })?;

        let mut pending: HashMap<NodeId, Tensor> = HashMap::new();
        pending.insert(loss, Tensor::scalar(1.0));
        let mut parameter_grads = Vec::new();

        let needs_grad = self.nodes_needing_grad(loss);
        let ids: Vec<NodeId> = self.nodes.range(..=loss).map(|(id, _)| *id).rev().collect();
        for id in ids {
            let Some(upstream) = pending.remove(&id) else {
                continue;
            };
            let node = self.node(id)?;
            if node.is_parameter() {
                parameter_grads.push((id, upstream));
                continue;
            }
            if node.parents.is_empty() {
                continue;
            }

            let parent_values = node
                .parents
                .iter()
                .map(|p| self.get_node_value(*p))
                .collect::<Result<Vec<_>, _>>()?;
            for (index, parent) in node.parents.iter().enumerate() {
                if !needs_grad.contains(parent) {
                    continue;
                }
                let grad = node
                    .node
                    .calc_grad_to_parent(index, &parent_values, &node.value, &upstream)?;
                match pending.get_mut(parent) {
                    Some(existing) => *existing += &grad,
                    None => {
                        pending.insert(*parent, grad);
                    }
                }
            }
        }

        for (id, grad) in parameter_grads {
            self.accumulate_grad(id, grad)?;
        }
        Ok(loss_value)
    }

    /// 依赖于至少一个参数的节点集合（只依赖输入的子图无需求梯度）
    fn nodes_needing_grad(&self, loss: NodeId) -> HashSet<NodeId> {
        let mut needs = HashSet::new();
        for (id, node) in self.nodes.range(..=loss) {
            if node.is_parameter() || node.parents.iter().any(|p| needs.contains(p)) {
                needs.insert(*id);
            }
        }
        needs
    }
}
