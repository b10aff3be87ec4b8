/*
 * @Date         : 2026-02-04
 * @Description  : 基于 Var 的层：全连接、嵌入查表、LSTM 单元
 */

mod embedding;
mod linear;
mod lstm;

pub use embedding::Embedding;
pub use linear::Linear;
pub use lstm::{LstmCell, LstmState};
