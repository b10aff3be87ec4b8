//! 计划采样（scheduled sampling）中输入真实 token 的概率随训练步数的变化

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SamplingSchedule {
    /// p(step) = initial_rate · k / (k + exp(step / k))
    InverseSigmoid { initial_rate: f32, k: f32 },
    /// 固定概率
    Constant(f32),
}

impl SamplingSchedule {
    /// 第`step`步输入真实 token 的概率，始终在 [0, 1] 内
    pub fn rate(&self, step: usize) -> f32 {
        match *self {
            Self::InverseSigmoid { initial_rate, k } => {
                let k = f64::from(k.max(f32::MIN_POSITIVE));
                let decay = k / (k + (step as f64 / k).exp());
                (f64::from(initial_rate) * decay).clamp(0.0, 1.0) as f32
            }
            Self::Constant(p) => p.clamp(0.0, 1.0),
        }
    }
}
