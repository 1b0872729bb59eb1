//! Stateless work validation.

use crate::error::WorkError;
use crate::thresholds::{WorkContext, WorkThresholds, WorkVersion};
use strand_crypto::blake2b_256;
use strand_types::Root;

/// Compute the effective difficulty of a nonce against a root.
///
/// The digest input is `root ‖ nonce-LE`; the first 8 bytes of the Blake2b
/// output, read little-endian, are the difficulty.
pub fn work_difficulty(version: WorkVersion, root: &Root, nonce: u64) -> u64 {
    match version {
        WorkVersion::Work1 => {
            let mut input = [0u8; 40];
            input[0..32].copy_from_slice(root.as_bytes());
            input[32..40].copy_from_slice(&nonce.to_le_bytes());
            let hash = blake2b_256(&input);
            u64::from_le_bytes(hash[0..8].try_into().expect("digest shorter than 8 bytes"))
        }
    }
}

/// Validate a block's nonce against the threshold selected by its context.
///
/// Returns the effective difficulty on success so callers can log or compare
/// fork priorities without recomputing.
pub fn validate_work(
    thresholds: &WorkThresholds,
    version: WorkVersion,
    ctx: &WorkContext,
    root: &Root,
    nonce: u64,
) -> Result<u64, WorkError> {
    let threshold = thresholds.threshold(version, ctx);
    let difficulty = work_difficulty(version, root, nonce);
    if difficulty >= threshold {
        Ok(difficulty)
    } else {
        Err(WorkError::Insufficient {
            difficulty,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{CancelToken, WorkGenerator};
    use strand_types::Epoch;

    fn ctx() -> WorkContext {
        WorkContext::new(Epoch::Epoch1, false, false)
    }

    #[test]
    fn zero_threshold_accepts_any_nonce() {
        let t = WorkThresholds::dev();
        let root = Root::new([0x42; 32]);
        assert!(validate_work(&t, WorkVersion::Work1, &ctx(), &root, 0).is_ok());
    }

    #[test]
    fn generated_nonce_validates() {
        let t = WorkThresholds::uniform(1 << 20);
        let root = Root::new([0xDE; 32]);
        let nonce = WorkGenerator::new()
            .generate(WorkVersion::Work1, &root, 1 << 20, &CancelToken::new())
            .unwrap();
        assert!(validate_work(&t, WorkVersion::Work1, &ctx(), &root, nonce).is_ok());
    }

    #[test]
    fn insufficient_work_reports_both_sides() {
        let t = WorkThresholds::uniform(u64::MAX);
        let root = Root::new([0xFF; 32]);
        let err = validate_work(&t, WorkVersion::Work1, &ctx(), &root, 12345).unwrap_err();
        match err {
            WorkError::Insufficient { threshold, .. } => assert_eq!(threshold, u64::MAX),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn difficulty_is_deterministic() {
        let root = Root::new([0x11; 32]);
        assert_eq!(
            work_difficulty(WorkVersion::Work1, &root, 7),
            work_difficulty(WorkVersion::Work1, &root, 7)
        );
    }

    #[test]
    fn difficulty_varies_with_root() {
        let a = work_difficulty(WorkVersion::Work1, &Root::new([0x11; 32]), 7);
        let b = work_difficulty(WorkVersion::Work1, &Root::new([0x22; 32]), 7);
        assert_ne!(a, b);
    }
}
