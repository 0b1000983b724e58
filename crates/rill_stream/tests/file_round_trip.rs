// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end tests through real files in a temporary directory.

use rill_base::Object;
use rill_stream::{
    BufferOptions, FileReader, FileWriter, FlushType, MmapReader, Reader, Writer,
};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

#[test]
fn write_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let payload = pattern(200_000);

    let mut writer = FileWriter::create(&path).unwrap();
    assert!(writer.write(&payload));
    assert!(writer.close());

    let mut reader = FileReader::open(&path).unwrap();
    let mut out = Vec::new();
    assert_eq!(reader.read_to_vec(payload.len(), &mut out), payload.len());
    assert_eq!(out, payload);
    assert!(reader.verify_end());
}

#[test]
fn small_buffers_still_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.bin");
    let payload = pattern(10_000);
    let options = BufferOptions::default().with_min_buffer_size(16).with_max_buffer_size(64);

    let mut writer = FileWriter::create_with_options(&path, options).unwrap();
    assert!(writer.write(&payload));
    assert!(writer.flush(FlushType::FromMachine));
    drop(writer);

    let mut reader = FileReader::open_with_options(&path, options).unwrap();
    let mut out = Vec::new();
    assert_eq!(reader.read_to_vec(payload.len(), &mut out), payload.len());
    assert_eq!(out, payload);
}

#[test]
fn seek_and_reread_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seek.bin");
    let payload = pattern(50_000);

    let mut writer = FileWriter::create(&path).unwrap();
    writer.write(&payload);
    assert!(writer.close());

    let mut reader = FileReader::open(&path).unwrap();
    assert!(reader.supports_random_access());
    assert_eq!(reader.size(), Some(50_000));
    let mut out = vec![0_u8; 1000];
    assert!(reader.seek(30_000));
    assert_eq!(reader.read(&mut out), 1000);
    assert_eq!(out.as_slice(), &payload[30_000..31_000]);
    assert!(reader.seek(10));
    assert_eq!(reader.read(&mut out), 1000);
    assert_eq!(out.as_slice(), &payload[10..1010]);
}

#[test]
fn mmap_reader_matches_streaming_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapped.bin");
    let payload = pattern(123_456);

    let mut writer = FileWriter::create(&path).unwrap();
    writer.write(&payload);
    assert!(writer.close());

    let mut streamed = Vec::new();
    let mut reader = FileReader::open(&path).unwrap();
    reader.read_to_vec(payload.len(), &mut streamed);

    let mut mapped = Vec::new();
    let mut mmap_reader = MmapReader::open(&path).unwrap();
    mmap_reader.read_to_vec(payload.len(), &mut mapped);

    assert_eq!(streamed, mapped);
    assert_eq!(streamed, payload);
}

#[test]
fn concurrent_range_readers_over_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ranges.bin");
    let payload = pattern(64 * 1024);

    let mut writer = FileWriter::create(&path).unwrap();
    writer.write(&payload);
    assert!(writer.close());

    let reader = FileReader::open(&path).unwrap();
    assert!(reader.supports_new_reader());
    std::thread::scope(|scope| {
        for chunk in 0..4_u64 {
            let expected = &payload;
            let mut range = reader.new_reader(chunk * 16 * 1024).unwrap();
            scope.spawn(move || {
                let mut out = vec![0_u8; 16 * 1024];
                assert_eq!(range.read(&mut out), 16 * 1024);
                let start = usize::try_from(chunk).unwrap() * 16 * 1024;
                assert_eq!(out.as_slice(), &expected[start..start + 16 * 1024]);
            });
        }
    });
}

#[test]
fn truncate_through_the_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.bin");

    let mut writer = FileWriter::create(&path).unwrap();
    writer.write(b"keep-and-drop");
    assert!(writer.flush(FlushType::FromProcess));
    assert!(writer.truncate(4));
    assert!(writer.seek(4));
    writer.write(b"!");
    assert!(writer.close());

    let mut reader = FileReader::open(&path).unwrap();
    let mut out = Vec::new();
    reader.read_to_vec(16, &mut out);
    assert_eq!(out, b"keep!");
}
