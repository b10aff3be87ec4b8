use crate::nn::nodes::{EmbeddingLookup, NodeType};
use crate::nn::{Graph, GraphError, Init, Module, Var};

/// 嵌入层：把 id 映射为稠密向量，表形状 [num_embeddings, dim]
pub struct Embedding {
    table: Var,
    num_embeddings: usize,
    dim: usize,
}

impl Embedding {
    pub fn new(graph: &Graph, num_embeddings: usize, dim: usize, name: &str) -> Result<Self, GraphError> {
        let table = graph.parameter(&[num_embeddings, dim], Init::Uniform(0.05), &format!("{name}_table"))?;
        Ok(Self {
            table,
            num_embeddings,
            dim,
        })
    }

    /// 查表，输出 [ids.len(), dim]
    pub fn forward(&self, ids: &[usize]) -> Result<Var, GraphError> {
        self.table
            .derive(NodeType::from(EmbeddingLookup::new(ids.to_vec())), &[&self.table])
    }

    pub const fn num_embeddings(&self) -> usize {
        self.num_embeddings
    }

    pub const fn dim(&self) -> usize {
        self.dim
    }
}

impl Module for Embedding {
    fn parameters(&self) -> Vec<Var> {
        vec![self.table.clone()]
    }
}
