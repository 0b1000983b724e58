// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rill_base::Status;
use rill_stream::{BufferedReader, Reader, Source};

// An in-memory source with a fixed per-read transfer cap, approximating a
// pipe that hands out data in device-sized pieces.
struct CappedSource {
    data: Vec<u8>,
    pos: usize,
    cap: usize,
}

impl Source for CappedSource {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
        let n = dst.len().min(self.cap).min(self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn sequential_scan(c: &mut Criterion) {
    const LEN: usize = 4 * 1024 * 1024;
    let data: Vec<u8> = (0..LEN).map(|i| (i % 251) as u8).collect();

    let mut group = c.benchmark_group("sequential_scan");
    group.throughput(Throughput::Bytes(LEN as u64));
    for cap in [4 * 1024_usize, 64 * 1024] {
        group.bench_function(format!("cap_{cap}"), |b| {
            b.iter(|| {
                let mut reader = BufferedReader::new(CappedSource {
                    data: data.clone(),
                    pos: 0,
                    cap,
                });
                let mut sink = [0_u8; 8 * 1024];
                let mut total = 0_usize;
                loop {
                    let n = reader.read(&mut sink);
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                assert_eq!(total, LEN);
                total
            });
        });
    }
    group.finish();
}

criterion_group!(benches, sequential_scan);
criterion_main!(benches);
