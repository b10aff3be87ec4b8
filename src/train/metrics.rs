//! 按阶段写 CSV 指标：`{log_dir}/{phase}.csv`，每行为 step、已用秒数与各指标值。
//! 写入失败只记一条警告，不影响训练。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::warn;

pub struct MetricsLogger {
    path: PathBuf,
    columns: Vec<String>,
    start: Instant,
}

impl MetricsLogger {
    pub fn new(log_dir: &Path, phase: &str, columns: &[&str]) -> Self {
        Self {
            path: log_dir.join(format!("{phase}.csv")),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            start: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, step: usize, values: &[f32]) {
        if values.len() != self.columns.len() {
            warn!(
                "{:?}: 指标个数{}与列数{}不符，已忽略",
                self.path,
                values.len(),
                self.columns.len()
            );
            return;
        }
        if let Err(e) = self.append(step, values) {
            warn!("写入指标文件 {:?} 失败: {e}", self.path);
        }
    }

    fn append(&self, step: usize, values: &[f32]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if is_new {
            writeln!(file, "step,elapsed_secs,{}", self.columns.join(","))?;
        }
        let values: Vec<String> = values.iter().map(f32::to_string).collect();
        writeln!(
            file,
            "{step},{:.3},{}",
            self.start.elapsed().as_secs_f64(),
            values.join(",")
        )
    }
}
