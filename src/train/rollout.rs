/*
 * @Date         : 2026-02-10
 * @Description  : Rollout 策略：生成器参数的慢速副本，只用于蒙特卡洛补全前缀
 *
 * 持有独立的计算图，从不接收梯度；每隔`update_rounds`轮按
 *   θ_r ← (1 - rate)·θ_r + rate·θ_g
 * 向在线生成器靠拢（rate = 1 时为直接复制）。
 */

use rand::rngs::StdRng;
use tracing::debug;

use crate::model::Generator;
use crate::nn::{Graph, GraphError, StateDict};
use crate::tensor::Tensor;

pub struct RolloutPolicy {
    generator: Generator,
    update_rate: f32,
    update_rounds: usize,
}

impl RolloutPolicy {
    /// 以`live`当前的参数构造
    pub fn new(live: &Generator, update_rate: f32, update_rounds: usize) -> Result<Self, GraphError> {
        let graph = Graph::new();
        let generator = Generator::new(&graph, *live.dims(), *live.hyper())?;
        graph.load_state_dict(&live.graph().state_dict())?;
        Ok(Self {
            generator,
            update_rate: update_rate.clamp(0.0, 1.0),
            update_rounds: update_rounds.max(1),
        })
    }

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn state_dict(&self) -> StateDict {
        self.generator.graph().state_dict()
    }

    pub fn load_state_dict(&self, state: &StateDict) -> Result<(), GraphError> {
        self.generator.graph().load_state_dict(state)
    }

    /// 向`live`靠拢一次（rate = 0 时策略保持冻结）
    pub fn refresh(&self, live: &Generator) -> Result<(), GraphError> {
        if self.update_rate <= 0.0 {
            return Ok(());
        }
        let source = live.graph().state_dict();
        self.generator
            .graph()
            .blend_state_dict(&source, self.update_rate)
    }

    /// 第`round`轮（从1开始计）结束时调用：到了刷新周期才刷新，返回是否刷新
    pub fn maybe_refresh(&self, live: &Generator, round: usize) -> Result<bool, GraphError> {
        if round == 0 || round % self.update_rounds != 0 {
            return Ok(false);
        }
        self.refresh(live)?;
        debug!("第{round}轮：rollout 策略已刷新（rate = {}）", self.update_rate);
        Ok(true)
    }

    /// 把每个前缀补全到`<end>`或`max_len`
    pub fn complete(
        &self,
        features: &Tensor,
        styles: &[usize],
        z: &Tensor,
        prefixes: &[Vec<usize>],
        max_len: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Vec<usize>>, GraphError> {
        self.generator
            .generate_from_prefix(features, styles, z, prefixes, max_len, rng)
    }
}
