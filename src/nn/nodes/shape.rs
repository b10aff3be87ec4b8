use super::{ForwardCtx, TraitNode, check_parent_count};
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// 按列拼接任意多个父节点（行数须一致）
pub(in crate::nn) struct ConcatCols;

impl TraitNode for ConcatCols {
    fn type_name(&self) -> &'static str {
        "ConcatCols"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        let first = parents.first().ok_or_else(|| {
            GraphError::InvalidOperation("ConcatCols节点至少需要1个父节点".to_string())
        })?;
        if let Some(bad) = parents.iter().find(|p| p.rows() != first.rows()) {
            return Err(GraphError::ShapeMismatch {
                expected: vec![first.rows(), bad.cols()],
                got: bad.shape().to_vec(),
                message: "ConcatCols节点的各输入行数须一致".to_string(),
            });
        }
        Ok(Tensor::concat_cols(parents))
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let start: usize = parents[..index].iter().map(|p| p.cols()).sum();
        Ok(upstream.slice_cols(start, start + parents[index].cols()))
    }
}

/// 取列区间 [start, end)
pub(in crate::nn) struct SliceCols {
    start: usize,
    end: usize,
}

impl SliceCols {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl TraitNode for SliceCols {
    fn type_name(&self) -> &'static str {
        "SliceCols"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        if self.start >= self.end || self.end > parents[0].cols() {
            return Err(GraphError::InvalidOperation(format!(
                "SliceCols节点的列区间[{}, {})对形状{:?}无效",
                self.start,
                self.end,
                parents[0].shape()
            )));
        }
        Ok(parents[0].slice_cols(self.start, self.end))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let mut grad = Tensor::zeros(parents[0].shape());
        for r in 0..upstream.rows() {
            for c in 0..upstream.cols() {
                grad[[r, self.start + c]] = upstream[[r, c]];
            }
        }
        Ok(grad)
    }
}

/// 所有元素求和，输出 [1, 1]
pub(in crate::nn) struct SumAll;

impl TraitNode for SumAll {
    fn type_name(&self) -> &'static str {
        "SumAll"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        Ok(Tensor::scalar(parents[0].sum()))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(&Tensor::ones(parents[0].shape()) * upstream)
    }
}

/// 每行求和，[r, c] -> [r, 1]
pub(in crate::nn) struct SumRows;

impl TraitNode for SumRows {
    fn type_name(&self) -> &'static str {
        "SumRows"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        Ok(parents[0].sum_rows())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(&Tensor::ones(parents[0].shape()) * upstream)
    }
}

/// 按 id 查表：父节点为 [vocab, dim] 的嵌入矩阵，输出 [ids.len(), dim]
pub(in crate::nn) struct EmbeddingLookup {
    ids: Vec<usize>,
}

impl EmbeddingLookup {
    pub const fn new(ids: Vec<usize>) -> Self {
        Self { ids }
    }
}

impl TraitNode for EmbeddingLookup {
    fn type_name(&self) -> &'static str {
        "EmbeddingLookup"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        let vocab = parents[0].rows();
        if let Some(&bad) = self.ids.iter().find(|&&id| id >= vocab) {
            return Err(GraphError::InvalidOperation(format!(
                "嵌入查表的id {bad} 超出表大小 {vocab}"
            )));
        }
        Ok(parents[0].select_rows(&self.ids))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let mut grad = Tensor::zeros(parents[0].shape());
        for (row, &id) in self.ids.iter().enumerate() {
            for c in 0..upstream.cols() {
                grad[[id, c]] += upstream[[row, c]];
            }
        }
        Ok(grad)
    }
}

/// 每行连续重复`times`次，[r, c] -> [r*times, c]
pub(in crate::nn) struct RepeatRows {
    times: usize,
}

impl RepeatRows {
    pub const fn new(times: usize) -> Self {
        Self { times }
    }
}

impl TraitNode for RepeatRows {
    fn type_name(&self) -> &'static str {
        "RepeatRows"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        if self.times == 0 {
            return Err(GraphError::InvalidOperation(
                "RepeatRows节点的重复次数须大于0".to_string(),
            ));
        }
        Ok(parents[0].repeat_rows(self.times))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream.sum_row_groups(self.times))
    }
}

/// 连续`group`行求和，[r*group, c] -> [r, c]
pub(in crate::nn) struct SumRowGroups {
    group: usize,
}

impl SumRowGroups {
    pub const fn new(group: usize) -> Self {
        Self { group }
    }
}

impl TraitNode for SumRowGroups {
    fn type_name(&self) -> &'static str {
        "SumRowGroups"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        if self.group == 0 || parents[0].rows() % self.group != 0 {
            return Err(GraphError::InvalidOperation(format!(
                "SumRowGroups节点：行数{}不能按{}行分组",
                parents[0].rows(),
                self.group
            )));
        }
        Ok(parents[0].sum_row_groups(self.group))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream.repeat_rows(self.group))
    }
}

/// 按行优先顺序重排形状
pub(in crate::nn) struct Reshape {
    rows: usize,
    cols: usize,
}

impl Reshape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

impl TraitNode for Reshape {
    fn type_name(&self) -> &'static str {
        "Reshape"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        if self.rows * self.cols != parents[0].size() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![self.rows, self.cols],
                got: parents[0].shape().to_vec(),
                message: "Reshape节点的元素个数须保持不变".to_string(),
            });
        }
        Ok(parents[0].reshape(self.rows, self.cols))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream.reshape(parents[0].rows(), parents[0].cols()))
    }
}
