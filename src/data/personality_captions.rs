/*
 * @Date         : 2026-02-06
 * @Description  : Personality-Captions 数据集：描述 JSON 与按内容哈希寻址的图像
 *
 * 目录结构：
 *   {data_dir}/train.json, val.json, test.json, personalities.json, personalities.txt
 *   {data_dir}/images/{hash}.jpg
 */

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::download::{download_and_extract_tgz, download_file};
use super::error::DataError;
use super::styles::StyleVocabulary;

const IMAGE_URL_PREFIX: &str = "https://multimedia-commons.s3-us-west-2.amazonaws.com/data/images";
const CAPTIONS_URL: &str = "http://parl.ai/downloads/personality_captions/personality_captions.tgz";
const METADATA_FILES: [&str; 2] = ["personalities.json", "personalities.txt"];

/// 数据集划分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Self; 3] = [Self::Train, Self::Val, Self::Test];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

impl FromStr for Split {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, DataError> {
        match s {
            "train" => Ok(Self::Train),
            "val" => Ok(Self::Val),
            "test" => Ok(Self::Test),
            other => Err(DataError::UnknownSplit(other.to_string())),
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// JSON 中的原始记录
#[derive(Debug, Deserialize)]
struct RawRecord {
    personality: String,
    comment: String,
    #[serde(default)]
    additional_comments: Vec<String>,
    image_hash: String,
}

/// 一条可用的样本记录（图像已确认存在）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRecord {
    pub style: String,
    pub caption: String,
    pub additional_captions: Vec<String>,
    pub image_path: PathBuf,
}

/// 下载结果汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

pub struct PersonalityCaptions {
    data_dir: PathBuf,
    image_dir: PathBuf,
}

impl PersonalityCaptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let image_dir = data_dir.join("images");
        Self {
            data_dir,
            image_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// 图像的远程地址：`{prefix}/{hash[0:3]}/{hash[3:6]}/{hash}.jpg`
    pub fn image_url(hash: &str) -> String {
        let a = hash.get(..3).unwrap_or(hash);
        let b = hash.get(3..6).unwrap_or_default();
        format!("{IMAGE_URL_PREFIX}/{a}/{b}/{hash}.jpg")
    }

    fn image_path(&self, hash: &str) -> PathBuf {
        self.image_dir.join(format!("{hash}.jpg"))
    }

    /// 下载描述归档（缺任一文件时）与所有图像（已存在的跳过）。
    /// 单张图像下载失败只记录并计数，不中断。
    pub fn download(&self) -> Result<DownloadSummary, DataError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let needs_archive = METADATA_FILES
            .iter()
            .map(|f| (*f).to_string())
            .chain(Split::ALL.iter().map(|s| s.file_name()))
            .any(|f| !self.data_dir.join(f).exists());
        if needs_archive {
            download_and_extract_tgz(CAPTIONS_URL, &self.data_dir)?;
        }

        let mut hashes = Vec::new();
        for split in Split::ALL {
            hashes.extend(self.read_raw(split)?.into_iter().map(|r| r.image_hash));
        }

        std::fs::create_dir_all(&self.image_dir)?;
        let mut present = self.downloaded_images()?;
        let mut summary = DownloadSummary::default();
        info!("共需 {} 张图像，已有 {} 张", hashes.len(), present.len());

        for hash in hashes {
            let file_name = format!("{hash}.jpg");
            if present.contains(&file_name) {
                summary.already_present += 1;
                continue;
            }
            let url = Self::image_url(&hash);
            match download_file(&url, &self.image_path(&hash)) {
                Ok(()) => {
                    present.insert(file_name);
                    summary.downloaded += 1;
                }
                Err(e) => {
                    warn!("跳过图像 {hash}: {e}");
                    summary.failed += 1;
                }
            }
        }

        info!(
            "图像下载完成：新下载 {}，已存在 {}，失败 {}",
            summary.downloaded, summary.already_present, summary.failed
        );
        Ok(summary)
    }

    fn read_raw(&self, split: Split) -> Result<Vec<RawRecord>, DataError> {
        let path = self.data_dir.join(split.file_name());
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn downloaded_images(&self) -> Result<HashSet<String>, DataError> {
        if !self.image_dir.exists() {
            return Ok(HashSet::new());
        }
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(&self.image_dir)? {
            names.insert(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// 读取一个划分；图像不存在的记录被排除
    pub fn load(&self, split: Split) -> Result<Vec<CaptionRecord>, DataError> {
        let present = self.downloaded_images()?;
        let raw = self.read_raw(split)?;
        let total = raw.len();
        let records: Vec<CaptionRecord> = raw
            .into_iter()
            .filter(|r| present.contains(&format!("{}.jpg", r.image_hash)))
            .map(|r| CaptionRecord {
                image_path: self.image_path(&r.image_hash),
                style: r.personality,
                caption: r.comment,
                additional_captions: r.additional_comments,
            })
            .collect();
        if records.len() < total {
            debug!(
                "{split}：{} 条记录因图像缺失被排除",
                total - records.len()
            );
        }
        Ok(records)
    }

    /// 按名字读取划分
    pub fn load_by_name(&self, split: &str) -> Result<Vec<CaptionRecord>, DataError> {
        self.load(split.parse()?)
    }

    /// 风格词表：优先读取 personalities.txt，否则从训练集拟合
    pub fn style_vocabulary(&self) -> Result<StyleVocabulary, DataError> {
        let path = self.data_dir.join("personalities.txt");
        if path.exists() {
            return StyleVocabulary::from_file(&path);
        }
        let raw = self.read_raw(Split::Train)?;
        Ok(StyleVocabulary::fit(raw.iter().map(|r| r.personality.as_str())))
    }
}
