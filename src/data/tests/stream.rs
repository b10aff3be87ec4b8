use super::toy_example;
use crate::data::{BatchStream, Example};

fn numbered(n: usize) -> Vec<Example> {
    (0..n).map(|i| toy_example(i, &[i + 1, 9])).collect()
}

fn drain_styles(stream: &mut BatchStream) -> Vec<Vec<usize>> {
    let mut epoch = Vec::new();
    while let Some(batch) = stream.next_batch().unwrap() {
        epoch.push(batch.styles);
    }
    epoch
}

#[test]
fn test_unshuffled_stream_keeps_order_and_last_partial_batch() {
    let mut stream = BatchStream::from_examples(numbered(5), 2);
    assert_eq!(drain_styles(&mut stream), vec![vec![0, 1], vec![2, 3], vec![4]]);
    // epoch 结束后保持结束状态，直到 restart
    assert!(stream.next_batch().unwrap().is_none());
}

#[test]
fn test_restart_begins_new_epoch() {
    let mut stream = BatchStream::from_examples(numbered(4), 3).prefetch(1);
    let first = drain_styles(&mut stream);
    stream.restart();
    assert_eq!(stream.epoch(), 1);
    assert_eq!(drain_styles(&mut stream), first);
}

#[test]
fn test_restart_mid_epoch_discards_rest() {
    let mut stream = BatchStream::from_examples(numbered(10), 2).prefetch(1);
    assert_eq!(stream.next_batch().unwrap().unwrap().styles, vec![0, 1]);
    stream.restart();
    assert_eq!(drain_styles(&mut stream).len(), 5);
}

#[test]
fn test_shuffle_is_a_seeded_permutation() {
    let build = || BatchStream::from_examples(numbered(20), 4).shuffle_buffer(8).seed(3);
    let mut a = build();
    let mut b = build();
    let epoch_a: Vec<usize> = drain_styles(&mut a).into_iter().flatten().collect();
    let epoch_b: Vec<usize> = drain_styles(&mut b).into_iter().flatten().collect();
    assert_eq!(epoch_a, epoch_b);

    let mut sorted = epoch_a.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    assert_ne!(epoch_a, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_iterator_interface() {
    let stream = BatchStream::from_examples(numbered(3), 2);
    let sizes: Vec<usize> = stream.map(|b| b.unwrap().len()).collect();
    assert_eq!(sizes, vec![2, 1]);
}
