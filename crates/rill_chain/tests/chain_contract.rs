// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Contract tests for `Chain` exercised through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rill_chain::{Block, Chain, ChainOptions};

#[test]
fn concatenation_equals_blocks() {
    let mut chain = Chain::new();
    chain.append(b"one");
    chain.append_block(Block::from_vec(vec![b'-'; 1]));
    chain.append(b"two");

    let mut flattened = Vec::new();
    for block in chain.blocks() {
        flattened.extend_from_slice(block);
    }
    assert_eq!(flattened, b"one-two");
    assert_eq!(flattened.len(), chain.len());
}

#[test]
fn prefix_slice_round_trip_for_every_split_point() {
    let mut chain = Chain::with_options(ChainOptions::default().with_max_block_size(8));
    chain.append(b"the quick brown fox jumps over");
    let original = chain.clone();
    let bytes = chain.to_vec();

    for split in 0..=bytes.len() {
        let mut sliced = original.clone();
        sliced.remove_prefix(split);
        sliced.prepend(&bytes[..split]);
        assert_eq!(sliced, original, "split at {split}");
    }
}

#[test]
fn external_region_lives_while_any_chain_references_it() {
    struct Region {
        bytes: Vec<u8>,
        drops: Arc<AtomicUsize>,
    }

    impl AsRef<[u8]> for Region {
        fn as_ref(&self) -> &[u8] {
            &self.bytes
        }
    }

    impl Drop for Region {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let mut chain = Chain::new();
    chain.append_block(Block::external(Region {
        bytes: b"externally owned".to_vec(),
        drops: Arc::clone(&drops),
    }));

    let snapshot = chain.clone();
    chain.clear();
    assert_eq!(drops.load(Ordering::SeqCst), 0, "snapshot still references the region");
    assert_eq!(snapshot, *b"externally owned".as_slice());

    drop(snapshot);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn append_buffer_respects_bounds() {
    let mut chain = Chain::new();
    let span = chain.append_buffer(10, 100, 50);
    assert!(span.capacity() >= 10);
    assert!(span.capacity() <= 50);
    span.commit(10);
    assert_eq!(chain.len(), 10);
}

#[test]
fn interleaved_trims_and_appends_stay_consistent() {
    let mut chain = Chain::with_options(ChainOptions::default().with_max_block_size(16));
    let mut model: Vec<u8> = Vec::new();

    for round in 0_u8..32 {
        let data = vec![round; usize::from(round) % 24 + 1];
        chain.append(&data);
        model.extend_from_slice(&data);

        if round % 3 == 0 && model.len() >= 4 {
            chain.remove_prefix(4);
            model.drain(..4);
        }
        if round % 5 == 0 && model.len() >= 2 {
            chain.remove_suffix(2);
            model.truncate(model.len() - 2);
        }
        assert_eq!(chain.len(), model.len());
        assert_eq!(chain.to_vec(), model, "round {round}");
    }
}
