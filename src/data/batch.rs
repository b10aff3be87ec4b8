/*
 * @Date         : 2026-02-07
 * @Description  : 样本与批次
 *
 * 一个批次内的描述按批内最长长度右侧填充`<pad>`(=0)；`mask()`在每条序列真实长度之内为1，之外为0。
 */

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::image::normalize_pixel;
use super::tokenizer::PAD_ID;
use crate::tensor::Tensor;

/// 已编码的单个样本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// HWC 排列的 RGB 字节，长度 image_size²·3
    pub pixels: Vec<u8>,
    pub image_size: u32,
    pub style: usize,
    /// 描述 token id，以`<end>`结尾
    pub tokens: Vec<usize>,
}

impl Example {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// 填充后的批次
#[derive(Debug, Clone)]
pub struct Batch {
    /// [batch, height, width, 3]，取值范围 [-1, 1]
    pub images: Array4<f32>,
    pub styles: Vec<usize>,
    /// 每条长度均为`max_len()`，超出真实长度的位置为`<pad>`
    pub tokens: Vec<Vec<usize>>,
    pub lengths: Vec<usize>,
}

fn pad_sequences(sequences: Vec<Vec<usize>>) -> (Vec<Vec<usize>>, Vec<usize>) {
    let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    let padded = sequences
        .into_iter()
        .map(|mut seq| {
            seq.resize(max_len, PAD_ID);
            seq
        })
        .collect();
    (padded, lengths)
}

impl Batch {
    /// 把若干样本拼成一个批次（所有样本的图像尺寸须一致）
    pub fn collate(examples: &[Example]) -> Result<Self, DataError> {
        let size = examples.first().map_or(0, |e| e.image_size) as usize;
        let mut flat = Vec::with_capacity(examples.len() * size * size * 3);
        for (i, example) in examples.iter().enumerate() {
            if example.pixels.len() != size * size * 3 {
                return Err(DataError::MalformedExample(format!(
                    "第{i}个样本的像素长度为{}，期望{}",
                    example.pixels.len(),
                    size * size * 3
                )));
            }
            flat.extend(example.pixels.iter().copied().map(normalize_pixel));
        }
        let images = Array4::from_shape_vec((examples.len(), size, size, 3), flat)
            .map_err(|e| DataError::MalformedExample(e.to_string()))?;

        let (tokens, lengths) = pad_sequences(examples.iter().map(|e| e.tokens.clone()).collect());
        Ok(Self {
            images,
            styles: examples.iter().map(|e| e.style).collect(),
            tokens,
            lengths,
        })
    }

    /// 图像与风格不变、描述替换为`sequences`的新批次（用于生成的负样本）
    pub fn with_tokens(&self, sequences: Vec<Vec<usize>>) -> Self {
        let (tokens, lengths) = pad_sequences(sequences);
        Self {
            images: self.images.clone(),
            styles: self.styles.clone(),
            tokens,
            lengths,
        }
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// 填充后的序列长度
    pub fn max_len(&self) -> usize {
        self.tokens.first().map_or(0, Vec::len)
    }

    /// 第`t`个位置上所有序列的 token
    pub fn column(&self, t: usize) -> Vec<usize> {
        self.tokens.iter().map(|seq| seq[t]).collect()
    }

    /// [batch, max_len] 的掩码：位置 t < 长度时为1
    pub fn mask(&self) -> Tensor {
        let max_len = self.max_len();
        let mut mask = Tensor::zeros(&[self.len(), max_len]);
        for (b, &len) in self.lengths.iter().enumerate() {
            for t in 0..len.min(max_len) {
                mask[[b, t]] = 1.0;
            }
        }
        mask
    }

    /// 有效 token 总数
    pub fn num_tokens(&self) -> usize {
        self.lengths.iter().sum()
    }

    /// 空批次或含长度为0（全填充）的序列
    pub fn is_malformed(&self) -> bool {
        self.is_empty() || self.lengths.iter().any(|&len| len == 0)
    }

    /// 去掉填充后的序列
    pub fn sequences(&self) -> Vec<Vec<usize>> {
        self.tokens
            .iter()
            .zip(&self.lengths)
            .map(|(seq, &len)| seq[..len].to_vec())
            .collect()
    }
}
