//! 图像解码与缩放：任意格式 -> RGB8 -> 固定分辨率的 HWC 字节

use std::path::Path;

use image::imageops::FilterType;

use super::error::DataError;

/// 读取图像并缩放到`size`×`size`，返回 HWC 排列的 RGB 字节（长度 size*size*3）
pub fn load_rgb_resized(path: &Path, size: u32) -> Result<Vec<u8>, DataError> {
    if !path.exists() {
        return Err(DataError::MissingImage(path.to_path_buf()));
    }
    // 按文件内容识别格式，不依赖扩展名
    let img = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| DataError::ImageError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);
    Ok(resized.into_raw())
}

/// 像素字节 -> [-1, 1]
pub fn normalize_pixel(value: u8) -> f32 {
    f32::from(value) / 127.5 - 1.0
}
