use std::hint::black_box;
use std::thread;
use std::time::Duration;

use mirrorbuf::{Consumer, Producer, RingBuffer};

fn main() {
    divan::main();
}

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

const CAPACITY: usize = 1 << 20;
const TIMEOUT: Duration = Duration::from_millis(500);

fn setup() -> (Producer<u32>, Consumer<u32>) {
    RingBuffer::new(CAPACITY).unwrap().split()
}

#[divan::bench(args = [64, 1024, 16384])]
fn bench_write_then_read(bencher: divan::Bencher, chunk: usize) {
    let (mut producer, mut consumer) = setup();
    bencher.bench_local(move || {
        for _ in 0..100 {
            producer
                .write_at_least(chunk, TIMEOUT, |slice| {
                    slice[..chunk].fill(7);
                    chunk
                })
                .unwrap();
            consumer
                .read_at_least(chunk, TIMEOUT, |slice| {
                    black_box(&slice[..chunk]);
                    chunk
                })
                .unwrap();
        }
    });
}

#[divan::bench(args = [256, 2048, 8192])]
fn bench_cross_thread(bencher: divan::Bencher, chunk: usize) {
    let total = 1 << 22;
    bencher
        .with_inputs(setup)
        .bench_values(|(mut producer, mut consumer)| {
            let handle = thread::spawn(move || {
                let mut sent = 0;
                while sent < total {
                    sent += producer
                        .write_at_least(chunk, TIMEOUT, |slice| {
                            slice[..chunk].fill(1);
                            chunk
                        })
                        .unwrap();
                }
            });

            let mut received = 0;
            while received < total {
                received += consumer
                    .read_at_least(chunk, TIMEOUT, |slice| {
                        black_box(slice);
                        slice.len()
                    })
                    .unwrap();
            }
            handle.join().unwrap();
        });
}
