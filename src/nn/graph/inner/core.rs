/*
 * @Date         : 2026-02-04
 * @Description  : GraphInner 的节点创建与访问
 */

use super::GraphInner;
use crate::nn::nodes::{ForwardCtx, Input, NodeHandle, NodeType, Parameter, TraitNode};
use crate::nn::{GraphError, Init, NodeId};
use crate::tensor::Tensor;

impl GraphInner {
    // ==================== 创建 ====================

    fn insert_node(&mut self, name: Option<&str>, parents: Vec<NodeId>, value: Tensor, node: NodeType) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let name = name.map_or_else(|| format!("{}:{}", node.type_name(), id.0), str::to_string);
        self.nodes.insert(
            id,
            NodeHandle {
                name,
                parents,
                value,
                grad: None,
                node,
            },
        );
        id
    }

    /// 创建输入节点（值由调用方给出，不参与梯度计算）
    pub fn new_input_node(&mut self, value: &Tensor, name: Option<&str>) -> NodeId {
        self.insert_node(name, Vec::new(), value.clone(), NodeType::from(Input))
    }

    /// 创建参数节点，参数名在图内须唯一
    pub fn new_parameter_node(&mut self, shape: &[usize], init: &Init, name: &str) -> Result<NodeId, GraphError> {
        if self.parameter_names.contains_key(name) {
            return Err(GraphError::DuplicateNodeName(name.to_string()));
        }
        let value = init.generate_with_rng(shape, &mut self.rng);
        let id = self.insert_node(Some(name), Vec::new(), value, NodeType::from(Parameter));
        self.parameter_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// 创建运算节点并立即由父节点的值计算其值
    pub(in crate::nn) fn new_op_node(&mut self, mut node: NodeType, parents: &[NodeId]) -> Result<NodeId, GraphError> {
        let value = {
            let parent_values = parents
                .iter()
                .map(|id| self.nodes.get(id).map(|n| &n.value).ok_or(GraphError::NodeNotFound(*id)))
                .collect::<Result<Vec<_>, _>>()?;
            let mut ctx = ForwardCtx {
                is_train: self.is_train,
                rng: &mut self.rng,
            };
            node.calc_value_by_parents(&parent_values, &mut ctx)?
        };
        Ok(self.insert_node(None, parents.to_vec(), value, node))
    }

    // ==================== 访问 ====================

    pub(in crate::nn) fn node(&self, id: NodeId) -> Result<&NodeHandle, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeHandle, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn get_node_value(&self, id: NodeId) -> Result<&Tensor, GraphError> {
        Ok(&self.node(id)?.value)
    }

    pub fn get_node_name(&self, id: NodeId) -> Result<&str, GraphError> {
        Ok(&self.node(id)?.name)
    }

    /// 设置叶子节点（输入或参数）的值，形状须与原值一致
    pub fn set_node_value(&mut self, id: NodeId, value: &Tensor) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if !node.parents.is_empty() {
            return Err(GraphError::InvalidOperation(format!(
                "节点{}由父节点计算得到，不能手动设置值",
                node.name
            )));
        }
        if node.value.shape() != value.shape() {
            return Err(GraphError::ShapeMismatch {
                expected: node.value.shape().to_vec(),
                got: value.shape().to_vec(),
                message: format!("设置节点{}的值时形状不符", node.name),
            });
        }
        node.value = value.clone();
        Ok(())
    }

    pub fn get_node_grad(&self, id: NodeId) -> Result<Option<&Tensor>, GraphError> {
        Ok(self.node(id)?.grad.as_ref())
    }

    pub fn clear_node_grad(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.node_mut(id)?.grad = None;
        Ok(())
    }

    pub(super) fn accumulate_grad(&mut self, id: NodeId, grad: Tensor) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        match node.grad.as_mut() {
            Some(existing) => *existing += &grad,
            None => node.grad = Some(grad),
        }
        Ok(())
    }

    /// 清零所有参数节点的梯度
    pub fn zero_grad(&mut self) {
        for node in self.nodes.values_mut() {
            node.grad = None;
        }
    }
}
