use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rowmpmc::{Message, RowBuffer, SeqMessage};
use std::sync::Arc;
use std::thread;

const CAPACITY: usize = 4096;
const MESSAGES: u64 = 1 << 16; // Per iteration; divisible by every width below

/// One producer and one consumer push a fixed message count through the
/// buffer at the given row width. Wider rows amortize the per-row CAS
/// handoff over more elements.
fn drive(buffer: &Arc<RowBuffer<SeqMessage>>, columns: usize) {
    let rows_target = MESSAGES / columns as u64;

    let producer = {
        let buffer = Arc::clone(buffer);
        thread::spawn(move || {
            for _ in 0..rows_target {
                let mut row = buffer.claim_producer().unwrap();
                let abs = row.abs();
                let width = row.columns() as u64;
                for (col, slot) in row.as_mut_slice().iter_mut().enumerate() {
                    *slot = SeqMessage::from_index(abs * width + col as u64);
                }
                row.commit();
            }
        })
    };

    let consumer = {
        let buffer = Arc::clone(buffer);
        thread::spawn(move || {
            let mut seen = 0u64;
            while seen < MESSAGES {
                let row = buffer.claim_consumer().unwrap();
                black_box(row.as_slice().last());
                seen += row.as_slice().len() as u64;
                row.commit();
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
}

fn bench_row_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_width");
    group.throughput(Throughput::Elements(MESSAGES));

    for columns in [1usize, 4, 16, 64, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(columns),
            &columns,
            |b, &columns| {
                b.iter(|| {
                    let mut buffer = Arc::new(RowBuffer::<SeqMessage>::new(CAPACITY));
                    Arc::get_mut(&mut buffer)
                        .unwrap()
                        .set_rows_columns(CAPACITY / columns, columns)
                        .unwrap();
                    drive(&buffer, columns);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_row_width);
criterion_main!(benches);
