//! Round-trip benchmark over an in-process transport pair.
//!
//! Measures write → pump → transport → pump → read throughput for
//! different message sizes.
//!
//! Run with: cargo bench --bench roundtrip
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use wsconn::{Connection, MemoryTransport};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const MESSAGE_SIZES: &[usize] = &[16, 1024, 64 * 1024];
const MESSAGES_PER_ITER: usize = 1000;

// ============================================================================
// Benchmark: Round Trip
// ============================================================================

fn bench_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("roundtrip");
    group.throughput(Throughput::Elements(MESSAGES_PER_ITER as u64));

    for &size in MESSAGE_SIZES {
        let (a, b) = rt.block_on(async {
            let (a, b) = MemoryTransport::pair();
            (
                Connection::new(a).expect("connection a"),
                Connection::new(b).expect("connection b"),
            )
        });
        let payload = vec![0x5au8; size];

        group.bench_with_input(BenchmarkId::new("bytes", size), &payload, |bench, payload| {
            bench.to_async(&rt).iter(|| async {
                let writer = {
                    let a = a.clone();
                    let payload = payload.clone();
                    tokio::spawn(async move {
                        for _ in 0..MESSAGES_PER_ITER {
                            a.write_message(payload.clone()).await.expect("write");
                        }
                    })
                };

                for _ in 0..MESSAGES_PER_ITER {
                    b.read_message().await.expect("read");
                }
                writer.await.expect("writer");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
