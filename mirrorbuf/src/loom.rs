#[cfg(all(test, feature = "loom"))]
mod tests {
    use crate::RingBuffer;
    use loom::{model::Builder, thread};
    use std::time::Duration;

    fn builder() -> Builder {
        let mut builder = Builder::new();
        if builder.preemption_bound.is_none() {
            builder.preemption_bound = Some(3);
        }
        builder
    }

    #[test]
    fn test_single_producer_single_consumer() {
        builder().check(|| {
            let (mut producer, mut consumer) = RingBuffer::<u32>::new(1024).unwrap().split();
            let chunks = 2u32;
            let chunk_len = 3usize;

            let producer_handle = thread::spawn(move || {
                for chunk in 0..chunks {
                    producer
                        .write_at_least(chunk_len, Duration::ZERO, |slice| {
                            for (i, value) in slice[..chunk_len].iter_mut().enumerate() {
                                *value = chunk * chunk_len as u32 + i as u32;
                            }
                            chunk_len
                        })
                        .unwrap();
                }
            });

            let mut received = vec![];
            let _ = consumer.read_at_least(1, Duration::ZERO, |slice| {
                received.extend_from_slice(slice);
                slice.len()
            });

            producer_handle.join().unwrap();

            let rest = consumer.read_slice().to_vec();
            consumer.consume(rest.len());
            received.extend(rest);

            let expected: Vec<u32> = (0..chunks * chunk_len as u32).collect();
            assert_eq!(received, expected);
            assert_eq!(consumer.available(0), 0);
        });
    }

    #[test]
    fn test_space_is_returned_across_wrap() {
        builder().check(|| {
            let (mut producer, mut consumer) = RingBuffer::<u8>::new(4096).unwrap().split();
            producer.produce(4090);
            consumer.consume(4090);

            let consumer_handle = thread::spawn(move || {
                let mut seen = vec![];
                let _ = consumer.read_at_least(8, Duration::ZERO, |slice| {
                    seen.extend_from_slice(&slice[..8]);
                    8
                });
                (seen, consumer)
            });

            producer
                .write_at_least(8, Duration::ZERO, |slice| {
                    slice[..8].copy_from_slice(b"abcdefgh");
                    8
                })
                .unwrap();

            let (seen, consumer) = consumer_handle.join().unwrap();
            if seen.is_empty() {
                assert_eq!(consumer.len(), 8);
            } else {
                assert_eq!(seen, b"abcdefgh");
                assert!(consumer.is_empty());
            }
            assert_eq!(producer.free_to_write(0) + consumer.len(), 4096);
        });
    }
}
