/*
 * @Date         : 2026-02-05
 * @Description  : LSTM 单元（单个时间步），由外部循环逐步展开
 *
 * 公式:
 *   i_t = σ(x_t @ W_ii + h_{t-1} @ W_hi + b_i)   # 输入门
 *   f_t = σ(x_t @ W_if + h_{t-1} @ W_hf + b_f)   # 遗忘门
 *   g_t = tanh(x_t @ W_ig + h_{t-1} @ W_hg + b_g) # 候选细胞
 *   o_t = σ(x_t @ W_io + h_{t-1} @ W_ho + b_o)   # 输出门
 *   c_t = f_t ⊙ c_{t-1} + i_t ⊙ g_t              # 细胞状态
 *   h_t = o_t ⊙ tanh(c_t)                        # 隐藏状态
 *
 * 权重布局：每个门各自一组 W_x [input_size, hidden_size]、W_h [hidden_size, hidden_size]、b [1, hidden_size]
 */

use crate::nn::{Graph, GraphError, Init, Module, Var, VarActivationOps, VarMatrixOps};
use crate::tensor::Tensor;

/// LSTM 的循环状态
#[derive(Debug, Clone)]
pub struct LstmState {
    /// 隐藏状态 [batch, hidden_size]
    pub h: Var,
    /// 细胞状态 [batch, hidden_size]
    pub c: Var,
}

struct Gate {
    w_x: Var,
    w_h: Var,
    b: Var,
}

impl Gate {
    fn new(
        graph: &Graph,
        input_size: usize,
        hidden_size: usize,
        bias_init: Init,
        name: &str,
    ) -> Result<Self, GraphError> {
        Ok(Self {
            w_x: graph.parameter(&[input_size, hidden_size], Init::Xavier, &format!("{name}_W_x"))?,
            w_h: graph.parameter(&[hidden_size, hidden_size], Init::Xavier, &format!("{name}_W_h"))?,
            b: graph.parameter(&[1, hidden_size], bias_init, &format!("{name}_b"))?,
        })
    }

    fn pre_activation(&self, x: &Var, h_prev: &Var) -> Result<Var, GraphError> {
        x.matmul(&self.w_x)?
            .try_add(&h_prev.matmul(&self.w_h)?)?
            .try_add(&self.b)
    }

    fn parameters(&self) -> [Var; 3] {
        [self.w_x.clone(), self.w_h.clone(), self.b.clone()]
    }
}

pub struct LstmCell {
    input: Gate,
    forget: Gate,
    cell: Gate,
    output: Gate,
    input_size: usize,
    hidden_size: usize,
}

impl LstmCell {
    pub fn new(graph: &Graph, input_size: usize, hidden_size: usize, name: &str) -> Result<Self, GraphError> {
        Ok(Self {
            input: Gate::new(graph, input_size, hidden_size, Init::Zeros, &format!("{name}_i"))?,
            // 遗忘门偏置初始化为 1（有助于训练初期记住信息）
            forget: Gate::new(graph, input_size, hidden_size, Init::Constant(1.0), &format!("{name}_f"))?,
            cell: Gate::new(graph, input_size, hidden_size, Init::Zeros, &format!("{name}_g"))?,
            output: Gate::new(graph, input_size, hidden_size, Init::Zeros, &format!("{name}_o"))?,
            input_size,
            hidden_size,
        })
    }

    /// 全零初始状态
    pub fn zero_state(&self, graph: &Graph, batch_size: usize) -> LstmState {
        LstmState {
            h: graph.input(&Tensor::zeros(&[batch_size, self.hidden_size])),
            c: graph.input(&Tensor::zeros(&[batch_size, self.hidden_size])),
        }
    }

    /// 前进一个时间步
    pub fn forward(&self, x: &Var, state: &LstmState) -> Result<LstmState, GraphError> {
        let i = self.input.pre_activation(x, &state.h)?.sigmoid()?;
        let f = self.forget.pre_activation(x, &state.h)?.sigmoid()?;
        let g = self.cell.pre_activation(x, &state.h)?.tanh()?;
        let o = self.output.pre_activation(x, &state.h)?.sigmoid()?;

        let c = f.try_mul(&state.c)?.try_add(&i.try_mul(&g)?)?;
        let h = o.try_mul(&c.tanh()?)?;
        Ok(LstmState { h, c })
    }

    pub const fn input_size(&self) -> usize {
        self.input_size
    }

    pub const fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

impl Module for LstmCell {
    fn parameters(&self) -> Vec<Var> {
        [&self.input, &self.forget, &self.cell, &self.output]
            .iter()
            .flat_map(|gate| gate.parameters())
            .collect()
    }
}
