// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cross-type contract tests for the reader/writer tower.

use rill_base::Object;
use rill_chain::{Block, Chain};
use rill_stream::{
    BackwardWriter, ChainBackwardWriter, ChainReader, ChainWriter, LimitingReader, Reader,
    SliceReader, VecWriter, Writer,
};

#[test]
fn bursty_source_presents_one_contiguous_window() {
    // Three 3-byte bursts; a pull of 7 must present a single window of at
    // least 7 bytes and account for everything it consumed.
    let mut chain = Chain::new();
    for burst in [&b"abc"[..], b"def", b"ghi"] {
        chain.append_block(Block::from_vec(burst.to_vec()));
    }
    let mut reader = ChainReader::new(chain);

    assert!(reader.pull(7, 7));
    let window = &reader.window()[reader.cursor()..];
    assert!(window.len() >= 7);
    assert_eq!(&window[..7], b"abcdefg");
    assert_eq!(reader.limit_pos(), 9);
}

#[test]
fn copy_between_streams_preserves_bytes() {
    let payload: Vec<u8> = (0..=255).cycle().take(40_000).map(|b: u16| b as u8).collect();
    let mut reader = SliceReader::new(&payload);
    let mut writer = ChainWriter::new();
    assert!(reader.copy_to(payload.len() as u64, &mut writer));
    assert_eq!(writer.into_chain().to_vec(), payload);
}

#[test]
fn copy_to_backward_preserves_order() {
    let mut reader = SliceReader::new(b"0123456789");
    let mut writer = ChainBackwardWriter::new();
    assert!(reader.skip(4));
    assert!(reader.copy_to_backward(6, &mut writer));
    writer.write(b"head-");
    assert_eq!(writer.into_chain(), *b"head-456789");
}

#[test]
fn read_all_collects_the_remainder() {
    let payload: Vec<u8> = (0..30_000).map(|i| (i % 241) as u8).collect();
    let mut reader = SliceReader::new(&payload);
    assert!(reader.skip(10_000));
    let mut rest = Chain::new();
    assert!(reader.read_all_to_chain(&mut rest));
    assert_eq!(rest.to_vec(), &payload[10_000..]);
    assert!(reader.verify_end());
}

#[test]
fn sticky_failure_blocks_all_later_operations() {
    let mut writer = VecWriter::new();
    writer.write(b"data");
    // Truncating past the written region is API misuse and fails the writer.
    assert!(!writer.truncate(100));
    assert!(!writer.ok());
    assert!(!writer.write(b"more"));
    assert!(!writer.flush(rill_stream::FlushType::FromProcess));
    let first = writer.status().unwrap().clone();
    assert!(!writer.seek(0));
    assert_eq!(writer.status().unwrap(), &first, "first failure is preserved");
}

#[test]
fn writer_reader_round_trip_with_seek_back() {
    let mut writer = VecWriter::new();
    let payload: Vec<u8> = (0..10_240).map(|i| (i % 251) as u8).collect();
    assert!(writer.write(&payload));

    let mut reader = writer.read_mode(0);
    let mut head = vec![0_u8; 7 * 1024];
    assert_eq!(reader.read(&mut head), 7 * 1024);
    assert!(reader.seek(1024));
    let mut again = vec![0_u8; 512];
    assert_eq!(reader.read(&mut again), 512);
    assert_eq!(again.as_slice(), &payload[1024..1536]);
}

#[test]
fn limiting_and_chain_compose_for_sections() {
    // A chain holding three length-delimited sections, each decoded through
    // an exact-length limiting reader.
    let mut writer = ChainWriter::new();
    for section in [&b"alpha"[..], b"bravo", b"charlie"] {
        let len = u32::try_from(section.len()).unwrap();
        writer.write(&len.to_le_bytes());
        writer.write(section);
    }
    let mut reader = writer.read_mode(0);

    let mut sections = Vec::new();
    loop {
        let mut len_bytes = [0_u8; 4];
        match reader.read(&mut len_bytes) {
            0 => break,
            4 => {}
            _ => panic!("torn length prefix"),
        }
        let len = u64::from(u32::from_le_bytes(len_bytes));
        let mut section = LimitingReader::with_length(&mut reader, len);
        section.set_exact_length(true);
        let mut bytes = Vec::new();
        section.read_to_vec(usize::try_from(len).unwrap(), &mut bytes);
        assert!(section.ok());
        sections.push(bytes);
    }
    assert_eq!(sections, [&b"alpha"[..], b"bravo", b"charlie"]);
}
