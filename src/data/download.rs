//! 通用下载工具
//!
//! 提供 HTTP 下载与 .tgz 解压功能。

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use super::error::DataError;

/// 下载 URL 的全部内容（只尝试一次）
pub fn download_bytes(url: &str) -> Result<Vec<u8>, DataError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| DataError::DownloadError(format!("HTTP 请求失败 {url}: {e}")))?;

    if response.status() != 200 {
        return Err(DataError::DownloadError(format!(
            "HTTP 状态码 {} - {url}",
            response.status()
        )));
    }

    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| DataError::DownloadError(format!("读取响应失败 {url}: {e}")))?;
    Ok(bytes)
}

/// 下载文件并保存到指定路径
pub fn download_file(url: &str, dest_path: &Path) -> Result<(), DataError> {
    let bytes = download_bytes(url)?;
    std::fs::write(dest_path, &bytes)?;
    Ok(())
}

/// 下载 .tgz 归档并解压到`dest_dir`
pub fn download_and_extract_tgz(url: &str, dest_dir: &Path) -> Result<(), DataError> {
    info!("正在下载 {url} ...");
    let bytes = download_bytes(url)?;
    extract_tgz(&bytes, dest_dir)?;
    info!("解压完成: {dest_dir:?}");
    Ok(())
}

/// 解压内存中的 .tgz 数据
pub fn extract_tgz(bytes: &[u8], dest_dir: &Path) -> Result<(), DataError> {
    std::fs::create_dir_all(dest_dir)?;
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive
        .unpack(dest_dir)
        .map_err(|e| DataError::DecompressionError(format!("解压 tgz 失败: {e}")))
}
