/*
 * @Date         : 2026-02-05
 * @Description  : Adam 优化器（可选逐元素梯度截断），动量状态可按参数名导出/载入以便断点续训
 */

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::Optimizer;
use crate::nn::graph::GraphInner;
use crate::nn::{Graph, GraphError, NodeId, Var};
use crate::tensor::Tensor;

/// Adam 的可持久化状态（以参数名为键）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    pub t: usize,
    pub m: BTreeMap<String, Tensor>,
    pub v: BTreeMap<String, Tensor>,
}

/// Adam: Adaptive Moment Estimation
/// - g = clip(g, -c, c)（若设置了截断值 c）
/// - m = β1 * m + (1 - β1) * g
/// - v = β2 * v + (1 - β2) * g²
/// - θ = θ - α * m_hat / (√v_hat + ε)
pub struct Adam {
    graph: Rc<RefCell<GraphInner>>,
    /// 要优化的参数节点 ID 及其参数名
    params: Vec<(NodeId, String)>,
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    clip_value: Option<f32>,
    m: HashMap<NodeId, Tensor>,
    v: HashMap<NodeId, Tensor>,
    t: usize,
}

impl Adam {
    pub fn new(graph: &Graph, params: &[Var], lr: f32) -> Result<Self, GraphError> {
        Self::with_config(graph, params, lr, 0.9, 0.999, 1e-8)
    }

    pub fn with_config(
        graph: &Graph,
        params: &[Var],
        lr: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    ) -> Result<Self, GraphError> {
        let params = {
            let inner = graph.inner();
            params
                .iter()
                .map(|p| Ok((p.node_id(), inner.get_node_name(p.node_id())?.to_string())))
                .collect::<Result<Vec<_>, GraphError>>()?
        };
        Ok(Self {
            graph: graph.inner_rc(),
            params,
            lr,
            beta1,
            beta2,
            epsilon,
            clip_value: None,
            m: HashMap::new(),
            v: HashMap::new(),
            t: 0,
        })
    }

    /// 把梯度逐元素截断到 [-clip_value, clip_value]
    #[must_use]
    pub const fn with_clip_value(mut self, clip_value: f32) -> Self {
        self.clip_value = Some(clip_value);
        self
    }

    /// 导出动量状态
    pub fn state(&self) -> AdamState {
        let by_name = |moments: &HashMap<NodeId, Tensor>| -> BTreeMap<String, Tensor> {
            self.params
                .iter()
                .filter_map(|(id, name)| moments.get(id).map(|t| (name.clone(), t.clone())))
                .collect()
        };
        AdamState {
            t: self.t,
            m: by_name(&self.m),
            v: by_name(&self.v),
        }
    }

    /// 载入动量状态；状态中没有的参数从零动量开始
    pub fn load_state(&mut self, state: &AdamState) {
        self.reset();
        self.t = state.t;
        for (id, name) in &self.params {
            if let Some(m) = state.m.get(name) {
                self.m.insert(*id, m.clone());
            }
            if let Some(v) = state.v.get(name) {
                self.v.insert(*id, v.clone());
            }
        }
    }
}

impl Optimizer for Adam {
    fn zero_grad(&mut self) -> Result<(), GraphError> {
        let mut g = self.graph.borrow_mut();
        for (node_id, _) in &self.params {
            g.clear_node_grad(*node_id)?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), GraphError> {
        self.t += 1;
        let mut g = self.graph.borrow_mut();
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (node_id, _) in &self.params {
            let Some(grad) = g.get_node_grad(*node_id)? else {
                continue;
            };
            let grad = match self.clip_value {
                Some(c) => grad.clip(-c, c),
                None => grad.clone(),
            };

            // 更新一阶矩
            let m = self
                .m
                .entry(*node_id)
                .or_insert_with(|| Tensor::zeros(grad.shape()));
            *m *= self.beta1;
            *m += &(&grad * (1.0 - self.beta1));

            // 更新二阶矩
            let v = self
                .v
                .entry(*node_id)
                .or_insert_with(|| Tensor::zeros(grad.shape()));
            *v *= self.beta2;
            *v += &(&grad.square() * (1.0 - self.beta2));

            // 偏差修正后更新参数
            let m_hat = &*m / bias1;
            let v_hat = &*v / bias2;
            let update = &m_hat / &(v_hat.sqrt() + self.epsilon);
            let new_value = g.get_node_value(*node_id)? - &(update * self.lr);
            g.set_node_value(*node_id, &new_value)?;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn reset(&mut self) {
        self.m.clear();
        self.v.clear();
        self.t = 0;
    }
}
