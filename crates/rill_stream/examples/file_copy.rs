// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Copies a file through the buffered reader/writer pair.
//!
//! Usage: `cargo run --example file_copy -- <src> <dst>`

use rill_base::Object;
use rill_stream::{FileReader, FileWriter, FlushType, Reader, Writer};

fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(src_path), Some(dst_path)) = (args.next(), args.next()) else {
        eprintln!("usage: file_copy <src> <dst>");
        std::process::exit(2);
    };

    let mut reader = FileReader::open(&src_path).expect("open source");
    let mut writer = FileWriter::create(&dst_path).expect("create destination");

    let total = reader.size().expect("files report their size");
    if !reader.copy_to(total, &mut writer) {
        report_failure(reader.status().or_else(|| writer.status()));
    }
    if !writer.flush(FlushType::FromMachine) {
        report_failure(writer.status());
    }
    assert!(reader.verify_end());
    println!("copied {total} bytes from {src_path} to {dst_path}");
}

fn report_failure(status: Option<&rill_base::Status>) -> ! {
    match status {
        Some(status) => eprintln!("copy failed: {status}"),
        None => eprintln!("copy failed"),
    }
    std::process::exit(1);
}
