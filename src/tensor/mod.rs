/*
 * @Date         : 2026-02-03
 * @Description  : 二维张量（矩阵）。计算图中所有节点的值都是 [行, 列] 形状的 Tensor，
 *                 批处理约定为 [batch, features]。
 */

use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use crate::errors::{ComparisonOperator, TensorError};

mod ops;


/// 定义张量的结构体。这里只支持二维：标量为 [1, 1]，行向量为 [1, n]，列向量为 [n, 1]。
/// 注：图像等更高维的数据不进入计算图，由数据模块以 `ndarray` 数组直接持有。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: Array2<f32>,
}

impl Tensor {
    /// 创建一个张量，`data`的长度必须和`shape`中两个元素的乘积相等。
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let (rows, cols) = Self::check_shape(shape);
        let data = Array2::from_shape_vec((rows, cols), data.to_vec()).unwrap_or_else(|_| {
            panic!(
                "{}",
                TensorError::DataLengthMismatch {
                    len: data.len(),
                    shape: shape.to_vec(),
                }
            )
        });
        Self { data }
    }

    /// 由`ndarray`二维数组直接构造
    pub const fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        let (rows, cols) = Self::check_shape(shape);
        Self {
            data: Array2::zeros((rows, cols)),
        }
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        let (rows, cols) = Self::check_shape(shape);
        Self {
            data: Array2::from_elem((rows, cols), value),
        }
    }

    /// 形状为 [1, 1] 的标量张量
    pub fn scalar(value: f32) -> Self {
        Self::full(&[1, 1], value)
    }

    /// 创建一个服从正态分布的随机张量（Box-Muller 变换，使用指定的 RNG）
    pub fn normal_with_rng<R: Rng + ?Sized>(
        mean: f32,
        std_dev: f32,
        shape: &[usize],
        rng: &mut R,
    ) -> Self {
        let (rows, cols) = Self::check_shape(shape);
        let data_len = rows * cols;
        let mut data = Vec::with_capacity(data_len);

        while data.len() < data_len {
            let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
            let u2: f32 = rng.gen_range(0.0..1.0);
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            data.push(mean + std_dev * r * theta.cos());
            if data.len() < data_len {
                data.push(mean + std_dev * r * theta.sin());
            }
        }

        Self::new(&data, shape)
    }

    /// 创建一个随机张量，其值在[min, max)区间内均匀分布
    pub fn uniform_with_rng<R: Rng + ?Sized>(min: f32, max: f32, shape: &[usize], rng: &mut R) -> Self {
        let (rows, cols) = Self::check_shape(shape);
        let data = Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(min..max));
        Self { data }
    }

    fn check_shape(shape: &[usize]) -> (usize, usize) {
        assert!(
            shape.len() == 2,
            "{}",
            TensorError::ValueMustSatisfyComparison {
                value_name: "张量维数".to_string(),
                operator: ComparisonOperator::Equal,
                threshold: 2,
            }
        );
        (shape[0], shape[1])
    }
}

// 访问器
impl Tensor {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// 元素个数
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 按逻辑（行优先）顺序拷贝出所有元素
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// 取第`i`行
    pub fn row(&self, i: usize) -> Vec<f32> {
        self.data.row(i).to_vec()
    }

    /// 取第`j`列
    pub fn column(&self, j: usize) -> Vec<f32> {
        self.data.column(j).to_vec()
    }

    /// 若张量只含一个元素，则返回该元素
    pub fn get_data_number(&self) -> Option<f32> {
        if self.size() == 1 {
            self.data.iter().next().copied()
        } else {
            None
        }
    }

    /// 是否所有元素都是有限值
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

impl Index<[usize; 2]> for Tensor {
    type Output = f32;

    fn index(&self, index: [usize; 2]) -> &f32 {
        &self.data[index]
    }
}

impl IndexMut<[usize; 2]> for Tensor {
    fn index_mut(&mut self, index: [usize; 2]) -> &mut f32 {
        &mut self.data[index]
    }
}

impl std::fmt::Display for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "形状: {:?}", self.shape())?;
        write!(f, "{:.4}", self.data)
    }
}
