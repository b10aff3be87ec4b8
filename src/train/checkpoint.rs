/*
 * @Date         : 2026-02-09
 * @Description  : 检查点：参数 + 优化器状态 + 步数，按网络分目录、按步数命名
 *
 * 文件格式：8字节魔数 + u32 版本号(小端) + bincode(Checkpoint)
 * 目录结构：{dir}/{network}/step_{step:08}.ckpt
 *
 * 检查点写入后不再修改；先写临时文件再改名，进程中断不会留下半个检查点。
 */

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::TrainError;
use crate::nn::{AdamState, Graph, StateDict};

const CHECKPOINT_MAGIC: &[u8; 8] = b"CGCKPT\0\0";
const CHECKPOINT_VERSION: u32 = 1;
const HEADER_LEN: usize = CHECKPOINT_MAGIC.len() + 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 已完成的训练步数（对抗训练中为轮数）
    pub step: usize,
    /// 保存时所在的 epoch
    pub epoch: usize,
    pub params: StateDict,
    pub optimizer: AdamState,
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, network: &str, step: usize) -> PathBuf {
        self.dir.join(network).join(format!("step_{step:08}.ckpt"))
    }

    /// 写检查点，失败即返回错误（调用方应停止训练）
    pub fn save(&self, network: &str, checkpoint: &Checkpoint) -> Result<PathBuf, TrainError> {
        let path = self.path(network, checkpoint.step);
        let fail = |reason: String| TrainError::Checkpoint {
            path: path.clone(),
            reason,
        };
        let payload = bincode::serialize(checkpoint).map_err(|e| fail(e.to_string()))?;
        let tmp = path.with_extension("ckpt.tmp");
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&tmp)?;
            file.write_all(CHECKPOINT_MAGIC)?;
            file.write_all(&CHECKPOINT_VERSION.to_le_bytes())?;
            file.write_all(&payload)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| fail(e.to_string()))?;
        debug!("已保存检查点 {path:?}");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Checkpoint, TrainError> {
        let fail = |reason: String| TrainError::Checkpoint {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|e| fail(e.to_string()))?;
        if bytes.len() < HEADER_LEN || &bytes[..CHECKPOINT_MAGIC.len()] != CHECKPOINT_MAGIC {
            return Err(fail("文件头不是检查点".to_string()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[CHECKPOINT_MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != CHECKPOINT_VERSION {
            return Err(fail(format!(
                "版本 {version} 不受支持（当前为 {CHECKPOINT_VERSION}）"
            )));
        }
        bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| fail(e.to_string()))
    }

    /// 某个网络已保存的全部步数，升序
    pub fn steps(&self, network: &str) -> Result<Vec<usize>, TrainError> {
        let dir = self.dir.join(network);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut steps = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let name = entry?.file_name();
            let step = name
                .to_str()
                .and_then(|n| n.strip_prefix("step_"))
                .and_then(|n| n.strip_suffix(".ckpt"))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(step) = step {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }

    /// 最新（步数最大）的检查点
    pub fn latest(&self, network: &str) -> Result<Option<Checkpoint>, TrainError> {
        match self.steps(network)?.last() {
            Some(&step) => Self::load(&self.path(network, step)).map(Some),
            None => Ok(None),
        }
    }
}

/// 把`network`最新检查点中的参数载入`graph`（不含优化器状态），返回其步数
pub fn load_latest_params(
    store: &CheckpointStore,
    network: &str,
    graph: &Graph,
) -> Result<Option<usize>, TrainError> {
    let Some(checkpoint) = store.latest(network)? else {
        return Ok(None);
    };
    graph.load_state_dict(&checkpoint.params)?;
    Ok(Some(checkpoint.step))
}
