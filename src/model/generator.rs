/*
 * @Date         : 2026-02-08
 * @Description  : 生成器：条件于图像区域特征、风格与隐噪声 z 的注意力 LSTM 解码器
 *
 * 条件化（每个序列一次）：
 *   f      = tanh(W_img · 原始区域特征)                       [batch * R, E]
 *   s      = 风格嵌入                                         [batch, E]
 *   h0, c0 = tanh(Linear([mean_r f, s, z]))
 * 解码一步（t 时刻，输入为上一个 token）：
 *   c_t, α_t = Attention(f, h_{t-1})
 *   h_t      = LSTM([emb(y_{t-1}), c_t], h_{t-1})
 *   logits_t = Linear([dropout(h_t), c_t, s])
 *
 * 第0步的输入为`<start>`。z 对每条序列只采样一次，整个解码过程中保持不变。
 */

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::attention::{Attention, AttentionKeys};
use super::regularizer::AttentionRegularizer;
use super::ModelDims;
use crate::data::Batch;
use crate::nn::{
    Embedding, Graph, GraphError, Linear, LstmCell, LstmState, Module, Var, VarActivationOps,
    VarLossOps, VarShapeOps,
};
use crate::tensor::Tensor;

/// 生成器的结构超参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorHyper {
    pub embedding_units: usize,
    pub attention_units: usize,
    pub lstm_units: usize,
    pub z_units: usize,
    pub dropout: f32,
}

impl Default for GeneratorHyper {
    fn default() -> Self {
        Self {
            embedding_units: 512,
            attention_units: 512,
            lstm_units: 512,
            z_units: 256,
            dropout: 0.2,
        }
    }
}

/// 按给定输入逐步展开后的输出
pub struct TeacherForcedOutput {
    /// 第 t 步的 logits，[batch, vocab]
    pub logits: Vec<Var>,
    /// 第 t 步的注意力权重，[batch, R]
    pub alphas: Vec<Var>,
}

/// 一个批次内不变的条件
struct Conditioning {
    keys: AttentionKeys,
    style: Var,
    initial: LstmState,
}

pub struct Generator {
    graph: Graph,
    dims: ModelDims,
    hyper: GeneratorHyper,
    word_embedding: Embedding,
    style_embedding: Embedding,
    image_proj: Linear,
    attention: Attention,
    init_h: Linear,
    init_c: Linear,
    lstm: LstmCell,
    output: Linear,
}

impl Generator {
    pub fn new(graph: &Graph, dims: ModelDims, hyper: GeneratorHyper) -> Result<Self, GraphError> {
        let e = hyper.embedding_units;
        let h = hyper.lstm_units;
        let init_in = 2 * e + hyper.z_units;
        Ok(Self {
            graph: graph.clone(),
            dims,
            hyper,
            word_embedding: Embedding::new(graph, dims.vocab_size, e, "gen_word")?,
            style_embedding: Embedding::new(graph, dims.num_styles, e, "gen_style")?,
            image_proj: Linear::new(graph, dims.feature_dim, e, true, "gen_image")?,
            attention: Attention::new(graph, e, h, hyper.attention_units, "gen_att")?,
            init_h: Linear::new(graph, init_in, h, true, "gen_init_h")?,
            init_c: Linear::new(graph, init_in, h, true, "gen_init_c")?,
            lstm: LstmCell::new(graph, 2 * e, h, "gen_lstm")?,
            output: Linear::new(graph, h + 2 * e, dims.vocab_size, true, "gen_out")?,
        })
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    pub const fn dims(&self) -> &ModelDims {
        &self.dims
    }

    pub const fn hyper(&self) -> &GeneratorHyper {
        &self.hyper
    }

    /// 每条序列一个 z ~ N(0, I)，[batch, z_units]
    pub fn sample_noise<R: Rng + ?Sized>(&self, batch: usize, rng: &mut R) -> Tensor {
        Tensor::normal_with_rng(0.0, 1.0, &[batch, self.hyper.z_units], rng)
    }

    fn condition(
        &self,
        features: &Tensor,
        styles: &[usize],
        z: &Tensor,
    ) -> Result<Conditioning, GraphError> {
        let regions = self.dims.num_regions;
        let image = self.image_proj.forward(&self.graph.input(features))?.tanh()?;
        let keys = self.attention.prepare(&image, regions)?;
        let batch = keys.batch();
        if styles.len() != batch || z.rows() != batch {
            return Err(GraphError::ShapeMismatch {
                expected: vec![batch, self.hyper.z_units],
                got: vec![styles.len(), z.rows()],
                message: "风格个数与噪声行数须等于批大小".to_string(),
            });
        }

        let mean_image = image.sum_row_groups(regions)?.scale(1.0 / regions as f32)?;
        let style = self.style_embedding.forward(styles)?;
        let init_input = mean_image.concat_cols(&[&style, &self.graph.input(z)])?;
        let initial = LstmState {
            h: self.init_h.forward(&init_input)?.tanh()?,
            c: self.init_c.forward(&init_input)?.tanh()?,
        };
        Ok(Conditioning {
            keys,
            style,
            initial,
        })
    }

    /// 解码一步，返回 (新状态, logits, 注意力权重)
    fn step(
        &self,
        cond: &Conditioning,
        state: &LstmState,
        prev_tokens: &[usize],
    ) -> Result<(LstmState, Var, Var), GraphError> {
        let (context, alpha) = self.attention.forward(&cond.keys, &state.h)?;
        let x = self.word_embedding.forward(prev_tokens)?.concat_cols(&[&context])?;
        let next = self.lstm.forward(&x, state)?;
        let hidden = next.h.dropout(self.hyper.dropout)?;
        let logits = self.output.forward(&hidden.concat_cols(&[&context, &cond.style])?)?;
        Ok((next, logits, alpha))
    }

    /// 沿`batch.tokens`展开`max_len`步；`next_input(logits_t, 真值_t)`决定第 t+1 步的输入
    fn unroll<F>(
        &self,
        features: &Tensor,
        batch: &Batch,
        z: &Tensor,
        mut next_input: F,
    ) -> Result<TeacherForcedOutput, GraphError>
    where
        F: FnMut(&Var, Vec<usize>) -> Result<Vec<usize>, GraphError>,
    {
        let cond = self.condition(features, &batch.styles, z)?;
        let steps = batch.max_len();
        let mut state = cond.initial.clone();
        let mut prev = vec![self.dims.start_id(); batch.len()];
        let mut output = TeacherForcedOutput {
            logits: Vec::with_capacity(steps),
            alphas: Vec::with_capacity(steps),
        };
        for t in 0..steps {
            let (next, logits, alpha) = self.step(&cond, &state, &prev)?;
            if t + 1 < steps {
                prev = next_input(&logits, batch.column(t))?;
            }
            state = next;
            output.logits.push(logits);
            output.alphas.push(alpha);
        }
        Ok(output)
    }

    /// 计划采样（scheduled sampling）下的展开：每一步、每条序列独立地以概率`rate`
    /// 输入真实的上一个 token，否则输入从模型分布中采样的 token
    pub fn teacher_forced(
        &self,
        features: &Tensor,
        batch: &Batch,
        z: &Tensor,
        rate: f32,
        rng: &mut StdRng,
    ) -> Result<TeacherForcedOutput, GraphError> {
        let rate = f64::from(rate.clamp(0.0, 1.0));
        let excluded = self.dims.unsampled_ids();
        self.unroll(features, batch, z, |logits, truth| {
            if rate >= 1.0 {
                return Ok(truth);
            }
            let probs = logits.value()?.softmax_rows();
            Ok(truth
                .into_iter()
                .enumerate()
                .map(|(b, y)| {
                    if rng.gen_bool(rate) {
                        y
                    } else {
                        sample_categorical(&probs.row(b), &excluded, rng)
                    }
                })
                .collect())
        })
    }

    /// 预训练损失：按有效 token 数归一化的交叉熵 + λ·注意力正则
    pub fn sequence_loss(
        &self,
        output: &TeacherForcedOutput,
        batch: &Batch,
        regularizer: &dyn AttentionRegularizer,
        lambda: f32,
    ) -> Result<Var, GraphError> {
        let mask = batch.mask();
        let normalizer = batch.num_tokens().max(1) as f32;
        let mut terms = Vec::with_capacity(output.logits.len() + 1);
        for (t, logits) in output.logits.iter().enumerate() {
            terms.push(logits.softmax_cross_entropy(&batch.column(t), &mask.column(t), normalizer)?);
        }
        self.add_regularizer(terms, &output.alphas, &mask, regularizer, lambda)
    }

    /// 策略梯度损失：-Σ_t Σ_b r_bt · log p(y_bt) / batch，`rewards`为 [batch, max_len]，填充位置为0
    pub fn policy_loss(
        &self,
        features: &Tensor,
        generated: &Batch,
        z: &Tensor,
        rewards: &Tensor,
        regularizer: &dyn AttentionRegularizer,
        lambda: f32,
    ) -> Result<Var, GraphError> {
        if rewards.shape() != [generated.len(), generated.max_len()] {
            return Err(GraphError::ShapeMismatch {
                expected: vec![generated.len(), generated.max_len()],
                got: rewards.shape().to_vec(),
                message: "奖励矩阵须与生成序列同形".to_string(),
            });
        }
        let output = self.unroll(features, generated, z, |_, truth| Ok(truth))?;
        let normalizer = generated.len().max(1) as f32;
        let mut terms = Vec::with_capacity(output.logits.len() + 1);
        for (t, logits) in output.logits.iter().enumerate() {
            terms.push(logits.softmax_cross_entropy(
                &generated.column(t),
                &rewards.column(t),
                normalizer,
            )?);
        }
        self.add_regularizer(terms, &output.alphas, &generated.mask(), regularizer, lambda)
    }

    fn add_regularizer(
        &self,
        mut terms: Vec<Var>,
        alphas: &[Var],
        mask: &Tensor,
        regularizer: &dyn AttentionRegularizer,
        lambda: f32,
    ) -> Result<Var, GraphError> {
        if lambda != 0.0 {
            if let Some(penalty) = regularizer.penalty(alphas, mask)? {
                terms.push(penalty.scale(lambda)?);
            }
        }
        let mut terms = terms.into_iter();
        let first = terms
            .next()
            .ok_or_else(|| GraphError::InvalidOperation("空序列无法计算损失".to_string()))?;
        terms.try_fold(first, |acc, term| acc.try_add(&term))
    }

    /// 自由生成：从`<start>`开始，每步输入自己采样的 token，遇到`<end>`或达到`max_len`停止
    pub fn generate(
        &self,
        features: &Tensor,
        styles: &[usize],
        z: &Tensor,
        max_len: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Vec<usize>>, GraphError> {
        let prefixes = vec![Vec::new(); styles.len()];
        self.generate_from_prefix(features, styles, z, &prefixes, max_len, rng)
    }

    /// 给定前缀补全序列（蒙特卡洛 rollout）。前缀中已含`<end>`或已达`max_len`的序列原样返回。
    /// 在评估模式下运行，不保留计算图
    pub fn generate_from_prefix(
        &self,
        features: &Tensor,
        styles: &[usize],
        z: &Tensor,
        prefixes: &[Vec<usize>],
        max_len: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Vec<usize>>, GraphError> {
        if prefixes.len() != styles.len() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![styles.len()],
                got: vec![prefixes.len()],
                message: "前缀个数须等于批大小".to_string(),
            });
        }
        let end_id = self.dims.end_id();
        let excluded = self.dims.unsampled_ids();
        let mut sequences = prefixes.to_vec();
        let mut finished: Vec<bool> = sequences
            .iter()
            .map(|s| s.contains(&end_id) || s.len() >= max_len)
            .collect();

        self.graph.no_grad_scope(|_| -> Result<Vec<Vec<usize>>, GraphError> {
            let cond = self.condition(features, styles, z)?;
            let mut state = cond.initial.clone();
            let mut prev = vec![self.dims.start_id(); styles.len()];
            let mut t = 0;
            while finished.iter().any(|done| !done) {
                let (next, logits, _) = self.step(&cond, &state, &prev)?;
                let probs = logits.value()?.softmax_rows();
                for (b, seq) in sequences.iter_mut().enumerate() {
                    if t < seq.len() || finished[b] {
                        continue;
                    }
                    let token = sample_categorical(&probs.row(b), &excluded, rng);
                    seq.push(token);
                    finished[b] = token == end_id || seq.len() >= max_len;
                }
                prev = sequences
                    .iter()
                    .map(|seq| seq.get(t).copied().unwrap_or(end_id))
                    .collect();
                state = next;
                t += 1;
            }
            Ok(sequences)
        })
    }
}

impl Module for Generator {
    fn parameters(&self) -> Vec<Var> {
        let mut params = Vec::new();
        params.extend(self.word_embedding.parameters());
        params.extend(self.style_embedding.parameters());
        params.extend(self.image_proj.parameters());
        params.extend(self.attention.parameters());
        params.extend(self.init_h.parameters());
        params.extend(self.init_c.parameters());
        params.extend(self.lstm.parameters());
        params.extend(self.output.parameters());
        params
    }
}

/// 按概率分布采样一个类别，`excluded`中的类别概率视为0
pub(super) fn sample_categorical<R: Rng + ?Sized>(
    probs: &[f32],
    excluded: &[usize],
    rng: &mut R,
) -> usize {
    let allowed = |i: &usize| !excluded.contains(i);
    let total: f32 = (0..probs.len()).filter(allowed).map(|i| probs[i]).sum();
    let u = rng.gen_range(0.0f32..1.0) * total;
    let mut cumulative = 0.0;
    let mut last = 0;
    for i in (0..probs.len()).filter(allowed) {
        cumulative += probs[i];
        last = i;
        if u < cumulative {
            return i;
        }
    }
    last
}
