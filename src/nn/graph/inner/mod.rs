/*
 * @Date         : 2026-02-04
 * @Description  : GraphInner：计算图的底层存储与运算。
 *
 * 节点在创建时即时求值（define-by-run），并按 ID 升序存放于 BTreeMap 中，
 * 因此 ID 逆序遍历即为合法的反向传播顺序。
 * 参数节点长期保留；其它（临时）节点在 no_grad_scope 结束或 release_transients 时回收。
 */

mod backward;
mod core;
mod state;

pub use state::StateDict;

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashMap};

use super::super::nodes::NodeHandle;
use crate::nn::NodeId;

pub struct GraphInner {
    nodes: BTreeMap<NodeId, NodeHandle>,
    next_id: u64,
    is_train: bool,
    rng: StdRng,
    /// 参数名 -> 参数节点
    parameter_names: HashMap<String, NodeId>,
}

impl Default for GraphInner {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphInner {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// 固定随机种子（参数初始化与 Dropout 掩码均由该 RNG 生成）
    pub fn new_with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
            is_train: true,
            rng,
            parameter_names: HashMap::new(),
        }
    }

    // ==================== 模式 ====================

    pub const fn is_train_mode(&self) -> bool {
        self.is_train
    }

    pub fn set_train_mode(&mut self) {
        self.is_train = true;
    }

    pub fn set_eval_mode(&mut self) {
        self.is_train = false;
    }

    // ==================== 节点回收 ====================

    /// 当前下一个将分配的节点 ID（作为 no_grad_scope 的回收水位）
    pub const fn watermark(&self) -> NodeId {
        NodeId(self.next_id)
    }

    /// 回收所有 ID 不小于`watermark`的非参数节点
    pub fn truncate_from(&mut self, watermark: NodeId) {
        let tail = self.nodes.split_off(&watermark);
        for (id, node) in tail {
            if node.is_parameter() {
                self.nodes.insert(id, node);
            }
        }
    }

    /// 回收所有非参数节点（每个训练步结束后调用，避免图无限增长）
    pub fn release_transients(&mut self) {
        self.nodes.retain(|_, node| node.is_parameter());
    }

    /// 当前存活的节点数
    pub fn nodes_count(&self) -> usize {
        self.nodes.len()
    }
}
