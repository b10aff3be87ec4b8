/*
 * @Date         : 2026-02-04
 * @Description  : Graph 句柄：对 Rc<RefCell<GraphInner>> 的轻量包装，
 *                 所有 Var 与优化器共享同一个 GraphInner
 */

use std::cell::RefCell;
use std::rc::Rc;

use super::{GraphError, GraphInner, StateDict};
use crate::nn::{Init, NodeId, Var};
use crate::tensor::Tensor;

/// 计算图句柄（Clone 开销极低）
#[derive(Clone)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    // ==================== 创建 ====================

    pub fn new() -> Self {
        Self::from_inner(GraphInner::new())
    }

    /// 创建固定种子的图，参数初始化与 Dropout 可复现
    pub fn new_with_seed(seed: u64) -> Self {
        Self::from_inner(GraphInner::new_with_seed(seed))
    }

    pub fn from_inner(inner: GraphInner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub(crate) const fn from_rc(inner: Rc<RefCell<GraphInner>>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> std::cell::Ref<'_, GraphInner> {
        self.inner.borrow()
    }

    pub(crate) fn inner_rc(&self) -> Rc<RefCell<GraphInner>> {
        Rc::clone(&self.inner)
    }

    /// 判断两个句柄是否指向同一个图
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn wrap_node_id(&self, node_id: NodeId) -> Var {
        Var::new(node_id, self.inner_rc())
    }

    // ==================== 节点 ====================

    /// 创建输入节点
    pub fn input(&self, data: &Tensor) -> Var {
        let id = self.inner.borrow_mut().new_input_node(data, None);
        self.wrap_node_id(id)
    }

    /// 创建参数节点
    pub fn parameter(&self, shape: &[usize], init: Init, name: &str) -> Result<Var, GraphError> {
        let id = self.inner.borrow_mut().new_parameter_node(shape, &init, name)?;
        Ok(self.wrap_node_id(id))
    }

    pub fn zeros(&self, shape: &[usize]) -> Var {
        self.input(&Tensor::zeros(shape))
    }

    pub fn ones(&self, shape: &[usize]) -> Var {
        self.input(&Tensor::ones(shape))
    }

    // ==================== 训练 ====================

    /// 对标量 loss 反向传播，返回 loss 值
    pub fn backward(&self, loss: &Var) -> Result<f32, GraphError> {
        self.inner.borrow_mut().backward(loss.node_id())
    }

    /// 清零所有参数的梯度
    pub fn zero_grad(&self) {
        self.inner.borrow_mut().zero_grad();
    }

    /// 回收所有非参数节点。调用后，此前创建的非参数 Var 全部失效
    pub fn release_transients(&self) {
        self.inner.borrow_mut().release_transients();
    }

    pub fn nodes_count(&self) -> usize {
        self.inner.borrow().nodes_count()
    }

    // ==================== 模式 ====================

    pub fn train(&self) {
        self.inner.borrow_mut().set_train_mode();
    }

    pub fn eval(&self) {
        self.inner.borrow_mut().set_eval_mode();
    }

    pub fn is_eval(&self) -> bool {
        !self.inner.borrow().is_train_mode()
    }

    /// 在评估模式下执行`f`，结束后恢复原模式，并回收`f`中创建的全部非参数节点。
    ///
    /// 注：回收发生在`f`返回之后，因此`f`应返回`Tensor`等已物化的数据，而不是 Var。
    pub fn no_grad_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Self) -> R,
    {
        let was_train = !self.is_eval();
        let watermark = self.inner.borrow().watermark();
        self.eval();
        let result = f(self);
        self.inner.borrow_mut().truncate_from(watermark);
        if was_train {
            self.train();
        }
        result
    }

    // ==================== 参数快照 ====================

    pub fn state_dict(&self) -> StateDict {
        self.inner.borrow().state_dict()
    }

    pub fn load_state_dict(&self, state: &StateDict) -> Result<(), GraphError> {
        self.inner.borrow_mut().load_state_dict(state)
    }

    /// θ ← (1 - rate)·θ + rate·θ_src
    pub fn blend_state_dict(&self, source: &StateDict, rate: f32) -> Result<(), GraphError> {
        self.inner.borrow_mut().blend_state_dict(source, rate)
    }
}
