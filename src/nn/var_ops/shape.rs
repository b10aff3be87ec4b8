use crate::nn::nodes::{
    ConcatCols, NodeType, RepeatRows, Reshape, SliceCols, SumAll, SumRowGroups, SumRows,
};
use crate::nn::{GraphError, Var};

/// 形状变换与归约扩展 trait
pub trait VarShapeOps {
    /// 与`others`依次按列拼接
    fn concat_cols(&self, others: &[&Var]) -> Result<Var, GraphError>;

    /// 取列区间 [start, end)
    fn slice_cols(&self, start: usize, end: usize) -> Result<Var, GraphError>;

    /// 所有元素求和，输出 [1, 1]
    fn sum(&self) -> Result<Var, GraphError>;

    /// 每行求和，输出 [rows, 1]
    fn sum_rows(&self) -> Result<Var, GraphError>;

    /// 所有元素的均值，输出 [1, 1]
    fn mean(&self) -> Result<Var, GraphError>;

    /// 每行连续重复`times`次
    fn repeat_rows(&self, times: usize) -> Result<Var, GraphError>;

    /// 连续`group`行求和
    fn sum_row_groups(&self, group: usize) -> Result<Var, GraphError>;

    /// 按行优先顺序重排为 [rows, cols]
    fn reshape(&self, rows: usize, cols: usize) -> Result<Var, GraphError>;
}

impl VarShapeOps for Var {
    fn concat_cols(&self, others: &[&Var]) -> Result<Var, GraphError> {
        let parents: Vec<&Var> = std::iter::once(self).chain(others.iter().copied()).collect();
        self.derive(NodeType::from(ConcatCols), &parents)
    }

    fn slice_cols(&self, start: usize, end: usize) -> Result<Var, GraphError> {
        self.derive(NodeType::from(SliceCols::new(start, end)), &[self])
    }

    fn sum(&self) -> Result<Var, GraphError> {
        self.derive(NodeType::from(SumAll), &[self])
    }

    fn sum_rows(&self) -> Result<Var, GraphError> {
        self.derive(NodeType::from(SumRows), &[self])
    }

    fn mean(&self) -> Result<Var, GraphError> {
        let count = self.shape()?.iter().product::<usize>().max(1);
        self.sum()?.scale(1.0 / count as f32)
    }

    fn repeat_rows(&self, times: usize) -> Result<Var, GraphError> {
        self.derive(NodeType::from(RepeatRows::new(times)), &[self])
    }

    fn sum_row_groups(&self, group: usize) -> Result<Var, GraphError> {
        self.derive(NodeType::from(SumRowGroups::new(group)), &[self])
    }

    fn reshape(&self, rows: usize, cols: usize) -> Result<Var, GraphError> {
        self.derive(NodeType::from(Reshape::new(rows, cols)), &[self])
    }
}
