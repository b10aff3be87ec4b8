mod personality_captions;
mod stream;

use std::path::Path;

use crate::data::{Example, PersonalityCaptions};

/// 在`dir`下写一个迷你数据集：train 3 条（其中 1 条图像缺失）、val 1 条、test 1 条
pub(super) fn write_fixture(dir: &Path) -> PersonalityCaptions {
    let train = serde_json::json!([
        {"personality": "Happy", "comment": "A sunny day at the beach!", "image_hash": "aaa111"},
        {"personality": "Gloomy", "comment": "The beach is cold.", "additional_comments": ["so cold"], "image_hash": "bbb222"},
        {"personality": "Happy", "comment": "Missing picture", "image_hash": "ccc333"}
    ]);
    let val = serde_json::json!([
        {"personality": "Gloomy", "comment": "A day.", "image_hash": "aaa111"}
    ]);
    let test = serde_json::json!([
        {"personality": "Curious", "comment": "What is that?", "image_hash": "bbb222"}
    ]);
    for (name, content) in [("train.json", train), ("val.json", val), ("test.json", test)] {
        std::fs::write(dir.join(name), content.to_string()).unwrap();
    }
    std::fs::write(dir.join("personalities.json"), "{}").unwrap();
    std::fs::write(dir.join("personalities.txt"), "Happy\nGloomy\nCurious\n").unwrap();

    let image_dir = dir.join("images");
    std::fs::create_dir_all(&image_dir).unwrap();
    for (hash, color) in [("aaa111", [200u8, 10, 10]), ("bbb222", [10u8, 10, 200])] {
        image::RgbImage::from_pixel(12, 10, image::Rgb(color))
            .save(image_dir.join(format!("{hash}.jpg")))
            .unwrap();
    }
    PersonalityCaptions::new(dir)
}

/// 2×2 的纯色图像样本
pub(super) fn toy_example(style: usize, tokens: &[usize]) -> Example {
    Example {
        pixels: vec![255; 2 * 2 * 3],
        image_size: 2,
        style,
        tokens: tokens.to_vec(),
    }
}
