/*
 * @Date         : 2026-02-03
 * @Description  : 张量运算：带广播的四则运算、矩阵乘法、按行 softmax、拼接/切片、
 *                 以及反向传播时把广播梯度归约回原形状的 sum_to_shape
 */

use ndarray::{Array2, Axis, s};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use super::Tensor;
use crate::errors::{Operator, TensorError};

// ==================== 广播检查 ====================

impl Tensor {
    /// 两个形状能否按 numpy 规则广播（二维下：每一维相等或其一为1）
    pub fn is_broadcastable_with(&self, other: &Self) -> bool {
        self.shape()
            .iter()
            .zip(other.shape())
            .all(|(&a, &b)| a == b || a == 1 || b == 1)
    }

    fn assert_broadcastable(&self, other: &Self, operator: Operator) {
        assert!(
            self.is_broadcastable_with(other),
            "{}",
            TensorError::OperatorError {
                operator,
                tensor1_shape: self.shape().to_vec(),
                tensor2_shape: other.shape().to_vec(),
            }
        );
    }
}

macro_rules! impl_broadcast_op {
    ($trait:ident, $method:ident, $operator:expr, $op:tt) => {
        impl<'a> $trait<&'a Tensor> for &'a Tensor {
            type Output = Tensor;

            fn $method(self, other: &'a Tensor) -> Tensor {
                self.assert_broadcastable(other, $operator);
                Tensor::from_array(&self.data $op &other.data)
            }
        }

        impl $trait<Tensor> for Tensor {
            type Output = Tensor;

            fn $method(self, other: Tensor) -> Tensor {
                &self $op &other
            }
        }

        impl<'a> $trait<&'a Tensor> for Tensor {
            type Output = Tensor;

            fn $method(self, other: &'a Tensor) -> Tensor {
                &self $op other
            }
        }

        impl $trait<f32> for &Tensor {
            type Output = Tensor;

            fn $method(self, scalar: f32) -> Tensor {
                Tensor::from_array(&self.data $op scalar)
            }
        }

        impl $trait<f32> for Tensor {
            type Output = Tensor;

            fn $method(self, scalar: f32) -> Tensor {
                Tensor::from_array(self.data $op scalar)
            }
        }
    };
}

impl_broadcast_op!(Add, add, Operator::Add, +);
impl_broadcast_op!(Sub, sub, Operator::Sub, -);
impl_broadcast_op!(Mul, mul, Operator::Mul, *);
impl_broadcast_op!(Div, div, Operator::Div, /);

impl Mul<&Tensor> for f32 {
    type Output = Tensor;

    fn mul(self, tensor: &Tensor) -> Tensor {
        tensor * self
    }
}

impl Sub<&Tensor> for f32 {
    type Output = Tensor;

    fn sub(self, tensor: &Tensor) -> Tensor {
        Tensor::from_array(tensor.data.mapv(|x| self - x))
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        Tensor::from_array(-&self.data)
    }
}

impl AddAssign<&Self> for Tensor {
    fn add_assign(&mut self, other: &Self) {
        self.assert_broadcastable(other, Operator::Add);
        self.data += &other.data;
    }
}

impl SubAssign<&Self> for Tensor {
    fn sub_assign(&mut self, other: &Self) {
        self.assert_broadcastable(other, Operator::Sub);
        self.data -= &other.data;
    }
}

impl MulAssign<f32> for Tensor {
    fn mul_assign(&mut self, scalar: f32) {
        self.data *= scalar;
    }
}

// ==================== 逐元素函数 ====================

impl Tensor {
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self::from_array(self.data.mapv(f))
    }

    pub fn sigmoid(&self) -> Self {
        self.map(|x| 1.0 / (1.0 + (-x).exp()))
    }

    pub fn tanh(&self) -> Self {
        self.map(f32::tanh)
    }

    pub fn sqrt(&self) -> Self {
        self.map(f32::sqrt)
    }

    pub fn square(&self) -> Self {
        self.map(|x| x * x)
    }

    /// 逐元素截断到 [min, max]
    pub fn clip(&self, min: f32, max: f32) -> Self {
        self.map(|x| x.clamp(min, max))
    }
}

// ==================== 矩阵运算 ====================

impl Tensor {
    /// 矩阵乘法：[m, k] @ [k, n] = [m, n]
    pub fn mat_mul(&self, other: &Self) -> Self {
        assert_eq!(
            self.cols(),
            other.rows(),
            "{}",
            TensorError::OperatorError {
                operator: Operator::MatMul,
                tensor1_shape: self.shape().to_vec(),
                tensor2_shape: other.shape().to_vec(),
            }
        );
        Self::from_array(self.data.dot(&other.data))
    }

    pub fn transpose(&self) -> Self {
        Self::from_array(self.data.t().to_owned())
    }
}

// ==================== 归约 ====================

impl Tensor {
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    pub fn mean(&self) -> f32 {
        if self.size() == 0 {
            0.0
        } else {
            self.sum() / self.size() as f32
        }
    }

    /// 每行求和，[r, c] -> [r, 1]
    pub fn sum_rows(&self) -> Self {
        Self::from_array(self.data.sum_axis(Axis(1)).insert_axis(Axis(1)))
    }

    /// 把广播后的梯度归约回`shape`：被广播（原长为1）的维度求和
    pub fn sum_to_shape(&self, shape: &[usize]) -> Self {
        let mut data = self.data.clone();
        for (axis, &target) in shape.iter().enumerate() {
            if target == 1 && data.shape()[axis] != 1 {
                data = data.sum_axis(Axis(axis)).insert_axis(Axis(axis));
            }
        }
        assert_eq!(
            data.shape(),
            shape,
            "{}",
            TensorError::OperatorError {
                operator: Operator::Add,
                tensor1_shape: self.shape().to_vec(),
                tensor2_shape: shape.to_vec(),
            }
        );
        Self::from_array(data)
    }

    /// 每行最大值所在列
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.data
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (j, &x)| {
                        if x > best.1 { (j, x) } else { best }
                    })
                    .0
            })
            .collect()
    }
}

// ==================== 按行 softmax ====================

impl Tensor {
    /// 对每一行做数值稳定的 softmax
    pub fn softmax_rows(&self) -> Self {
        let mut out = self.data.clone();
        for mut row in out.rows_mut() {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            row.mapv_inplace(|x| (x - max).exp());
            let total = row.sum();
            row.mapv_inplace(|x| x / total);
        }
        Self::from_array(out)
    }

    /// 对每一行做 log-softmax
    pub fn log_softmax_rows(&self) -> Self {
        let mut out = self.data.clone();
        for mut row in out.rows_mut() {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_total = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
            row.mapv_inplace(|x| x - log_total);
        }
        Self::from_array(out)
    }
}

// ==================== 拼接、切片、行重排 ====================

impl Tensor {
    /// 按列拼接（各张量行数须一致）
    pub fn concat_cols(tensors: &[&Self]) -> Self {
        assert!(!tensors.is_empty(), "{}", TensorError::EmptyList);
        let rows = tensors[0].rows();
        for t in tensors {
            assert_eq!(
                t.rows(),
                rows,
                "{}",
                TensorError::OperatorError {
                    operator: Operator::Concat,
                    tensor1_shape: tensors[0].shape().to_vec(),
                    tensor2_shape: t.shape().to_vec(),
                }
            );
        }
        let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
        let data = ndarray::concatenate(Axis(1), &views).unwrap_or_else(|e| panic!("{e}"));
        Self::from_array(data)
    }

    /// 取列区间 [start, end)
    pub fn slice_cols(&self, start: usize, end: usize) -> Self {
        assert!(
            start <= end && end <= self.cols(),
            "{}",
            TensorError::IndexOutOfRange {
                index: end,
                len: self.cols(),
            }
        );
        Self::from_array(self.data.slice(s![.., start..end]).to_owned())
    }

    /// 按给定顺序取出若干行
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        for &i in indices {
            assert!(
                i < self.rows(),
                "{}",
                TensorError::IndexOutOfRange {
                    index: i,
                    len: self.rows(),
                }
            );
        }
        Self::from_array(self.data.select(Axis(0), indices))
    }

    /// 每行连续重复`times`次：第 i 行变为第 i*times .. (i+1)*times 行
    pub fn repeat_rows(&self, times: usize) -> Self {
        let indices: Vec<usize> = (0..self.rows())
            .flat_map(|i| std::iter::repeat(i).take(times))
            .collect();
        self.select_rows(&indices)
    }

    /// 把连续的`group`行求和，[r*group, c] -> [r, c]（`repeat_rows`的伴随运算）
    pub fn sum_row_groups(&self, group: usize) -> Self {
        assert!(group > 0 && self.rows() % group == 0, "{}", TensorError::InconsitentShape);
        let out_rows = self.rows() / group;
        let mut out = Array2::zeros((out_rows, self.cols()));
        for (i, mut row) in out.rows_mut().into_iter().enumerate() {
            let block = self.data.slice(s![i * group..(i + 1) * group, ..]);
            row.assign(&block.sum_axis(Axis(0)));
        }
        Self::from_array(out)
    }

    /// 把连续的`group`行求平均，[r*group, c] -> [r, c]
    pub fn mean_row_groups(&self, group: usize) -> Self {
        let mut out = self.sum_row_groups(group);
        out *= 1.0 / group as f32;
        out
    }

    /// 按行优先顺序重排为 [rows, cols]
    pub fn reshape(&self, rows: usize, cols: usize) -> Self {
        assert_eq!(
            rows * cols,
            self.size(),
            "{}",
            TensorError::DataLengthMismatch {
                len: self.size(),
                shape: vec![rows, cols],
            }
        );
        let flat: Vec<f32> = self.data.iter().copied().collect();
        Self::new(&flat, &[rows, cols])
    }
}
