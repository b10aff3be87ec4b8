/*
 * @Date         : 2026-02-08
 * @Description  : 判别器：对 (图像, 风格, 描述) 三元组给出“真实”的概率
 *
 *   h_T   = 掩码 LSTM(emb(y_1..y_T))，填充位置保持上一步状态
 *   logit = Linear([h_T, mean_r tanh(W_img f_r), 风格嵌入])
 *
 * 判别器只作为奖励来源：`score`在评估模式下运行且不保留计算图。
 */

use serde::{Deserialize, Serialize};

use super::ModelDims;
use crate::data::Batch;
use crate::nn::{
    Embedding, Graph, GraphError, Linear, LstmCell, LstmState, Module, Var, VarActivationOps,
    VarLossOps, VarShapeOps,
};
use crate::tensor::Tensor;

/// 判别器的结构超参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminatorHyper {
    pub embedding_units: usize,
    pub lstm_units: usize,
}

impl Default for DiscriminatorHyper {
    fn default() -> Self {
        Self {
            embedding_units: 512,
            lstm_units: 512,
        }
    }
}

pub struct Discriminator {
    graph: Graph,
    dims: ModelDims,
    word_embedding: Embedding,
    style_embedding: Embedding,
    image_proj: Linear,
    lstm: LstmCell,
    output: Linear,
}

impl Discriminator {
    pub fn new(graph: &Graph, dims: ModelDims, hyper: DiscriminatorHyper) -> Result<Self, GraphError> {
        let e = hyper.embedding_units;
        let h = hyper.lstm_units;
        Ok(Self {
            graph: graph.clone(),
            dims,
            word_embedding: Embedding::new(graph, dims.vocab_size, e, "disc_word")?,
            style_embedding: Embedding::new(graph, dims.num_styles, e, "disc_style")?,
            image_proj: Linear::new(graph, dims.feature_dim, e, true, "disc_image")?,
            lstm: LstmCell::new(graph, e, h, "disc_lstm")?,
            output: Linear::new(graph, h + 2 * e, 1, true, "disc_out")?,
        })
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// 未经 sigmoid 的打分，[batch, 1]
    pub fn logits(&self, features: &Tensor, batch: &Batch) -> Result<Var, GraphError> {
        let regions = self.dims.num_regions;
        if features.rows() != batch.len() * regions {
            return Err(GraphError::ShapeMismatch {
                expected: vec![batch.len() * regions, self.dims.feature_dim],
                got: features.shape().to_vec(),
                message: "图像特征行数须为批大小×区域数".to_string(),
            });
        }

        let mask = batch.mask();
        let mut state: LstmState = self.lstm.zero_state(&self.graph, batch.len());
        for t in 0..batch.max_len() {
            let x = self.word_embedding.forward(&batch.column(t))?;
            let next = self.lstm.forward(&x, &state)?;
            let keep = self.graph.input(&Tensor::new(&mask.column(t), &[batch.len(), 1]));
            let hold = keep.affine(-1.0, 1.0)?;
            state = LstmState {
                h: next.h.try_mul(&keep)?.try_add(&state.h.try_mul(&hold)?)?,
                c: next.c.try_mul(&keep)?.try_add(&state.c.try_mul(&hold)?)?,
            };
        }

        let image = self
            .image_proj
            .forward(&self.graph.input(features))?
            .tanh()?
            .sum_row_groups(regions)?
            .scale(1.0 / regions as f32)?;
        let style = self.style_embedding.forward(&batch.styles)?;
        self.output.forward(&state.h.concat_cols(&[&image, &style])?)
    }

    /// 每个三元组为真实样本的概率（不保留计算图）
    pub fn score(&self, features: &Tensor, batch: &Batch) -> Result<Vec<f32>, GraphError> {
        self.graph
            .no_grad_scope(|_| -> Result<Vec<f32>, GraphError> {
                Ok(self.logits(features, batch)?.value()?.sigmoid().to_vec())
            })
    }

    /// 加权二元交叉熵：mean_pos(bce(·, 1)) + neg_weight · mean_neg(bce(·, 0))。
    /// `real`与`fake`共用同一批图像特征
    pub fn loss(
        &self,
        features: &Tensor,
        real: &Batch,
        fake: &Batch,
        neg_weight: f32,
    ) -> Result<Var, GraphError> {
        let positives = self.logits(features, real)?;
        let negatives = self.logits(features, fake)?;
        let n_pos = real.len();
        let n_neg = fake.len();
        let pos = positives.sigmoid_cross_entropy(&vec![1.0; n_pos], &vec![1.0; n_pos], n_pos as f32)?;
        let neg = negatives.sigmoid_cross_entropy(
            &vec![0.0; n_neg],
            &vec![neg_weight; n_neg],
            n_neg as f32,
        )?;
        pos.try_add(&neg)
    }
}

impl Module for Discriminator {
    fn parameters(&self) -> Vec<Var> {
        let mut params = Vec::new();
        params.extend(self.word_embedding.parameters());
        params.extend(self.style_embedding.parameters());
        params.extend(self.image_proj.parameters());
        params.extend(self.lstm.parameters());
        params.extend(self.output.parameters());
        params
    }
}
