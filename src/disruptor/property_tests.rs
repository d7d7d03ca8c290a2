//! Property-based tests for disruptor components
//!
//! These tests use proptest to verify properties that should hold for all inputs

use crate::disruptor::{
    sequence::Sequence,
    sequencer::{Sequencer, SingleProducerSequencer},
    wait_strategy::BusySpinWaitStrategy,
    wireup::Wireup,
    Barrier, CompositeBarrier, Consumer, DisruptorError,
};
use proptest::prelude::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Property tests for Sequence
mod sequence_properties {
    use super::*;

    proptest! {
        #[test]
        fn sequence_monotonic_set(increments in prop::collection::vec(0i64..100, 1..50)) {
            let seq = Sequence::default();
            let mut expected = seq.get();

            for inc in increments {
                expected += inc;
                seq.set(expected);
                prop_assert_eq!(seq.get(), expected);
            }
        }
    }
}

/// Property tests for `CompositeBarrier`
mod barrier_properties {
    use super::*;

    proptest! {
        #[test]
        fn composite_reports_member_minimum(values in prop::collection::vec(-1i64..10_000, 1..16)) {
            let sequences: Vec<Arc<Sequence>> =
                values.iter().map(|&v| Arc::new(Sequence::new(v))).collect();
            let barrier = CompositeBarrier::new(sequences.clone());

            let minimum = *values.iter().min().unwrap();
            prop_assert_eq!(barrier.get(), minimum);
            for sequence in &sequences {
                prop_assert!(barrier.get() <= sequence.get());
            }
        }
    }
}

/// Property tests for the claim protocol
mod sequencer_properties {
    use super::*;

    fn sequencer(capacity: usize) -> (SingleProducerSequencer, Arc<Sequence>) {
        let consumer = Arc::new(Sequence::default());
        let sequencer = SingleProducerSequencer::new(
            Arc::new(Sequence::default()),
            Arc::new(CompositeBarrier::new(vec![consumer.clone()])),
            capacity,
            Arc::new(BusySpinWaitStrategy::new()),
            Arc::new(AtomicBool::new(false)),
        );
        (sequencer, consumer)
    }

    proptest! {
        #[test]
        fn full_ring_refuses_one_more(power in 0u32..10) {
            let capacity = 1usize << power;
            let (mut sequencer, consumer) = sequencer(capacity);

            let last = sequencer.try_claim(capacity as i64);
            prop_assert_eq!(last, Some(capacity as i64 - 1));
            sequencer.publish(capacity as i64 - 1);
            prop_assert_eq!(sequencer.try_claim(1), None);

            consumer.set(0);
            prop_assert_eq!(sequencer.try_claim(1), Some(capacity as i64));
        }

        #[test]
        fn claims_never_pass_the_wrap_point(
            power in 1u32..6,
            steps in prop::collection::vec((1i64..8, 0i64..8), 1..64)
        ) {
            let capacity = 1usize << power;
            let (mut sequencer, consumer) = sequencer(capacity);
            let mut consumed = -1i64;
            let mut published = -1i64;

            for (claim, consume) in steps {
                let claim = claim.min(capacity as i64);
                if let Some(high) = sequencer.try_claim(claim) {
                    prop_assert!(high - consumed <= capacity as i64);
                    sequencer.publish(high);
                    published = high;
                }

                consumed = (consumed + consume).min(published);
                consumer.set(consumed);
                prop_assert!(sequencer.remaining_capacity() >= 0);
            }
        }

        #[test]
        fn slot_index_wraps(power in 0u32..12, sequence in 0i64..1_000_000) {
            let capacity = 1usize << power;
            let (sequencer, _) = sequencer(capacity);
            prop_assert_eq!(sequencer.index_of(sequence), (sequence % capacity as i64) as usize);
        }
    }
}

/// Property tests for configuration validation
mod wireup_properties {
    use super::*;

    fn noop() -> Box<dyn Consumer> {
        Box::new(|_: i64, _: i64, _: bool| {})
    }

    proptest! {
        #[test]
        fn only_powers_of_two_build(capacity in 1usize..5_000) {
            let result = Wireup::new()
                .with_capacity(capacity)
                .with_consumer_group(vec![noop()])
                .try_build();

            if capacity.is_power_of_two() {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(matches!(
                    result,
                    Err(DisruptorError::CapacityPowerOfTwo(c)) if c == capacity
                ));
            }
        }
    }
}
