// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compresses a file with Brotli and verifies the round trip in memory.
//!
//! Usage: `cargo run --example compress_file -- <path>`

use rill_base::Object;
use rill_codec::{BrotliOptions, CodecReader, CodecWriter};
use rill_stream::{ChainWriter, FileReader, Reader, Writer};

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: compress_file <path>");
        std::process::exit(2);
    };

    let mut reader = FileReader::open(&path).expect("open input");
    let total = reader.size().expect("files report their size");

    let mut compressed = ChainWriter::new();
    {
        let mut encoder = CodecWriter::brotli(&mut compressed, BrotliOptions::default());
        if !reader.copy_to(total, &mut encoder) {
            eprintln!("compression failed: {:?}", encoder.status().or_else(|| reader.status()));
            std::process::exit(1);
        }
        assert!(encoder.close());
    }
    let compressed_len = compressed.written_len();

    // Decode it back and confirm the byte count survived the trip.
    let mut decoder = CodecReader::brotli(compressed.read_mode(0));
    let mut round_trip = 0_u64;
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let n = decoder.read(&mut buf);
        if n == 0 {
            break;
        }
        round_trip += n as u64;
    }
    assert!(decoder.ok(), "decode failed: {:?}", decoder.status());
    assert_eq!(round_trip, total);

    println!("{path}: {total} bytes -> {compressed_len} bytes compressed");
}
