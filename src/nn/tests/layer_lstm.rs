use crate::nn::{Graph, LstmCell, Module};
use crate::tensor::Tensor;

#[test]
fn test_lstm_cell_shapes() {
    let graph = Graph::new_with_seed(42);
    let cell = LstmCell::new(&graph, 5, 4, "lstm").unwrap();
    // 4 个门，每门 W_x、W_h、b
    assert_eq!(cell.parameters().len(), 12);
    assert_eq!(cell.num_params(), 4 * (5 * 4 + 4 * 4 + 4));

    let state = cell.zero_state(&graph, 3);
    let next = cell.forward(&graph.input(&Tensor::ones(&[3, 5])), &state).unwrap();
    assert_eq!(next.h.shape().unwrap(), vec![3, 4]);
    assert_eq!(next.c.shape().unwrap(), vec![3, 4]);
}

#[test]
fn test_lstm_hidden_is_bounded() {
    let graph = Graph::new_with_seed(1);
    let cell = LstmCell::new(&graph, 2, 3, "lstm").unwrap();
    let mut state = cell.zero_state(&graph, 1);
    for _ in 0..5 {
        state = cell
            .forward(&graph.input(&Tensor::new(&[10.0, -10.0], &[1, 2])), &state)
            .unwrap();
    }
    assert!(state.h.value().unwrap().to_vec().iter().all(|h| h.abs() < 1.0));
}

#[test]
fn test_forget_gate_bias_starts_at_one() {
    let graph = Graph::new_with_seed(1);
    let _cell = LstmCell::new(&graph, 2, 3, "lstm").unwrap();
    let state = graph.state_dict();
    assert_eq!(state["lstm_f_b"], Tensor::ones(&[1, 3]));
    assert_eq!(state["lstm_i_b"], Tensor::zeros(&[1, 3]));
}
