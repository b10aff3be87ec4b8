/*
 * @Date         : 2026-02-10
 * @Description  : 蒙特卡洛奖励：为生成序列的每个 token 估计未来的判别器得分
 *
 * 对序列 b 的第 t 个位置（t < len_b - 1）：
 *   Q_bt = (1/N) Σ_n D(rollout 策略以同一 z 补全前缀 y_0..y_t 的第 n 次结果)
 * 最后一个位置 Q_b(len_b - 1) = D(完整序列)，不做 rollout。
 * 奖励 r_bt = γ^(len_b - 1 - t) · Q_bt，填充位置为0。
 *
 * 每次补全对整个批次并行进行；判别器只打分，不参与求导。
 */

use rand::rngs::StdRng;

use super::rollout::RolloutPolicy;
use crate::data::Batch;
use crate::model::Discriminator;
use crate::nn::GraphError;
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloReward {
    rollout_n: usize,
    gamma: f32,
}

impl MonteCarloReward {
    pub fn new(rollout_n: usize, gamma: f32) -> Self {
        Self {
            rollout_n: rollout_n.max(1),
            gamma,
        }
    }

    pub const fn rollout_n(&self) -> usize {
        self.rollout_n
    }

    /// 未折扣的 Q 值，[batch, max_len]
    pub fn q_values(
        &self,
        rollout: &RolloutPolicy,
        discriminator: &Discriminator,
        features: &Tensor,
        generated: &Batch,
        z: &Tensor,
        rng: &mut StdRng,
    ) -> Result<Tensor, GraphError> {
        let steps = generated.max_len();
        let max_len = rollout.generator().dims().max_seq_len.max(steps);
        let sequences = generated.sequences();
        let mut q = Tensor::zeros(&[generated.len(), steps]);

        let direct = discriminator.score(features, generated)?;
        for (b, &len) in generated.lengths.iter().enumerate() {
            if len > 0 {
                q[[b, len - 1]] = direct[b];
            }
        }

        // 只有 t < len_b - 1 的位置需要补全
        let last_open = generated.lengths.iter().map(|&l| l.saturating_sub(1)).max().unwrap_or(0);
        for t in 0..last_open {
            let prefixes: Vec<Vec<usize>> = sequences
                .iter()
                .map(|seq| seq[..(t + 1).min(seq.len())].to_vec())
                .collect();
            let mut totals = vec![0.0f32; generated.len()];
            for _ in 0..self.rollout_n {
                let completed =
                    rollout.complete(features, &generated.styles, z, &prefixes, max_len, rng)?;
                let scores = discriminator.score(features, &generated.with_tokens(completed))?;
                for (total, score) in totals.iter_mut().zip(scores) {
                    *total += score;
                }
            }
            for (b, &len) in generated.lengths.iter().enumerate() {
                if t + 1 < len {
                    q[[b, t]] = totals[b] / self.rollout_n as f32;
                }
            }
        }
        Ok(q)
    }

    /// 折扣后的逐 token 奖励，[batch, max_len]
    pub fn rewards(
        &self,
        rollout: &RolloutPolicy,
        discriminator: &Discriminator,
        features: &Tensor,
        generated: &Batch,
        z: &Tensor,
        rng: &mut StdRng,
    ) -> Result<Tensor, GraphError> {
        let mut rewards = self.q_values(rollout, discriminator, features, generated, z, rng)?;
        for (b, &len) in generated.lengths.iter().enumerate() {
            for t in 0..len {
                rewards[[b, t]] *= self.gamma.powi((len - 1 - t) as i32);
            }
        }
        Ok(rewards)
    }
}
