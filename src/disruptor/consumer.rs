//! Consumer callback contract
//!
//! A consumer receives contiguous ranges of sequence numbers that are safe to
//! read from the caller's payload array. It reads (or, within its range,
//! updates) the slots at `sequence & (capacity - 1)` and returns; it must not
//! block indefinitely, since its stage, and eventually the producer, wait on it.

/// Processes ranges of available sequences
pub trait Consumer: Send {
    /// Handle the sequences `lower..=upper`
    ///
    /// `end_of_batch` is true on the last range delivered before the listener
    /// goes back to waiting, which makes it the place for flush-style work.
    fn consume(&mut self, lower: i64, upper: i64, end_of_batch: bool);
}

impl<F> Consumer for F
where
    F: FnMut(i64, i64, bool) + Send,
{
    fn consume(&mut self, lower: i64, upper: i64, end_of_batch: bool) {
        self(lower, upper, end_of_batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingConsumer {
        seen: i64,
        batches: usize,
    }

    impl Consumer for CountingConsumer {
        fn consume(&mut self, lower: i64, upper: i64, end_of_batch: bool) {
            self.seen += upper - lower + 1;
            if end_of_batch {
                self.batches += 1;
            }
        }
    }

    #[test]
    fn test_closure_consumer() {
        let mut ranges = Vec::new();
        {
            let mut consumer = |lower: i64, upper: i64, end_of_batch: bool| {
                ranges.push((lower, upper, end_of_batch));
            };
            consumer.consume(0, 3, false);
            consumer.consume(4, 4, true);
        }
        assert_eq!(ranges, vec![(0, 3, false), (4, 4, true)]);
    }

    #[test]
    fn test_boxed_consumer() {
        let mut consumer: Box<dyn Consumer> = Box::new(CountingConsumer { seen: 0, batches: 0 });
        consumer.consume(0, 9, true);
        consumer.consume(10, 10, true);

        let mut direct = CountingConsumer { seen: 0, batches: 0 };
        direct.consume(0, 9, false);
        assert_eq!(direct.seen, 10);
        assert_eq!(direct.batches, 0);
    }
}
