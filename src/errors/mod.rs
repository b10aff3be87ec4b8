use thiserror::Error;

/// 数字比较运算符（用于错误提示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    GreaterOrEqual,
    Greater,
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "等于"),
            Self::GreaterOrEqual => write!(f, "大于等于"),
            Self::Greater => write!(f, "大于"),
        }
    }
}

/// 张量二元运算符（用于错误提示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    MatMul,
    Concat,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "相加"),
            Self::Sub => write!(f, "相减"),
            Self::Mul => write!(f, "相乘"),
            Self::Div => write!(f, "相除"),
            Self::MatMul => write!(f, "矩阵相乘"),
            Self::Concat => write!(f, "拼接"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
    // 数字比较用
    #[error("{value_name}须{operator}{threshold}")]
    ValueMustSatisfyComparison {
        value_name: String,
        operator: ComparisonOperator,
        threshold: usize,
    },
    // 张量二元运算
    #[error(
        "形状不一致，故无法{operator}：第一个张量的形状为{tensor1_shape:?}，第二个张量的形状为{tensor2_shape:?}"
    )]
    OperatorError {
        operator: Operator,
        tensor1_shape: Vec<usize>,
        tensor2_shape: Vec<usize>,
    },
    #[error("数据长度{len}与形状{shape:?}不符")]
    DataLengthMismatch { len: usize, shape: Vec<usize> },
    #[error("张量列表为空")]
    EmptyList,
    #[error("张量形状不一致")]
    InconsitentShape,
    #[error("索引{index}越界（上限{len}）")]
    IndexOutOfRange { index: usize, len: usize },
}
