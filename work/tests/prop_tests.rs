//! Property tests for work validation.

use proptest::prelude::*;
use strand_types::{Epoch, Root};
use strand_work::{validate_work, work_difficulty, WorkContext, WorkThresholds, WorkVersion};

proptest! {
    #[test]
    fn difficulty_deterministic(
        root in proptest::array::uniform32(any::<u8>()),
        nonce in any::<u64>(),
    ) {
        let root = Root::new(root);
        prop_assert_eq!(
            work_difficulty(WorkVersion::Work1, &root, nonce),
            work_difficulty(WorkVersion::Work1, &root, nonce)
        );
    }

    #[test]
    fn validate_agrees_with_difficulty(
        root in proptest::array::uniform32(any::<u8>()),
        nonce in any::<u64>(),
        threshold in any::<u64>(),
    ) {
        let root = Root::new(root);
        let thresholds = WorkThresholds::uniform(threshold);
        let ctx = WorkContext::new(Epoch::Epoch1, false, false);
        let difficulty = work_difficulty(WorkVersion::Work1, &root, nonce);
        let result = validate_work(&thresholds, WorkVersion::Work1, &ctx, &root, nonce);
        prop_assert_eq!(result.is_ok(), difficulty >= threshold);
    }
}
