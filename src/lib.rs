//! # Caption GAN
//!
//! 基于即时求值自动微分的图像风格化描述生成器。
//! 生成器（注意力 + LSTM，条件于图像特征、风格与隐噪声）与判别器先各自预训练，
//! 再以 SeqGAN 方式对抗训练：判别器对蒙特卡洛补全的序列打分作为奖励，
//! 经策略梯度回传给生成器。
//!

pub mod data;
pub mod errors;
pub mod model;
pub mod nn;
pub mod tensor;
pub mod train;
pub mod utils;
