/*
 * @Date         : 2026-02-07
 * @Description  : 已编码样本的磁盘分片缓存
 *
 * 文件格式：8字节魔数 + u32 版本号(小端) + bincode(Vec<Example>)
 * 目录结构：{cache_dir}/{split}/shard_{i:05}.bin
 */

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::batch::Example;
use super::error::DataError;

const SHARD_MAGIC: &[u8; 8] = b"CGSHARD\0";
const SHARD_VERSION: u32 = 1;
const HEADER_LEN: usize = SHARD_MAGIC.len() + 4;

pub fn shard_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("shard_{index:05}.bin"))
}

/// 创建缓存目录；目录已存在时报`CacheCollision`（是否覆盖由调用方先行决定）
pub fn create_cache_dir(dir: &Path) -> Result<(), DataError> {
    if dir.exists() {
        return Err(DataError::CacheCollision(dir.to_path_buf()));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// 写一个分片（先写临时文件再改名，避免留下半个分片）
pub fn write_shard(path: &Path, examples: &[Example]) -> Result<(), DataError> {
    let payload = bincode::serialize(examples).map_err(|e| DataError::CorruptShard {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let tmp = path.with_extension("bin.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(SHARD_MAGIC)?;
        file.write_all(&SHARD_VERSION.to_le_bytes())?;
        file.write_all(&payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    debug!("写入缓存分片 {path:?}（{} 个样本）", examples.len());
    Ok(())
}

/// 读取一个分片；魔数、版本或内容不符时报`CorruptShard`
pub fn read_shard(path: &Path) -> Result<Vec<Example>, DataError> {
    let corrupt = |reason: String| DataError::CorruptShard {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_LEN || &bytes[..SHARD_MAGIC.len()] != SHARD_MAGIC {
        return Err(corrupt("文件头不是缓存分片".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[SHARD_MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != SHARD_VERSION {
        return Err(corrupt(format!("版本 {version} 不受支持（当前为 {SHARD_VERSION}）")));
    }
    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| corrupt(e.to_string()))
}

/// 目录下的全部分片，按序号排序
pub fn list_shards(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    let mut shards = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_shard = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("shard_") && n.ends_with(".bin"));
        if is_shard {
            shards.push(path);
        }
    }
    shards.sort();
    Ok(shards)
}
