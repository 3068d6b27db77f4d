// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Two strategies:
//
//   Chronological     — first `train_fraction` of the samples
//                       train, the rest validate. Default for
//                       time series: validation lies strictly
//                       after everything the model trained on.
//
//   Shuffled { seed } — Fisher-Yates shuffle with a seeded
//                       StdRng, then split. The same seed gives
//                       the same split on every run.
//
// Reference: rand crate documentation (SliceRandom, SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    Chronological,
    Shuffled { seed: u64 },
}

impl SplitStrategy {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => SplitStrategy::Shuffled { seed },
            None       => SplitStrategy::Chronological,
        }
    }
}

/// Split `samples` into (train, validation).
///
/// # Example
/// ```ignore
/// let (train, val) = split_train_val(all_samples, 0.8, SplitStrategy::Chronological);
/// ```
pub fn split_train_val<T>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    strategy:       SplitStrategy,
) -> (Vec<T>, Vec<T>) {
    if let SplitStrategy::Shuffled { seed } = strategy {
        let mut rng = StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);
    }

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split ({:?}): {} training, {} validation",
        strategy,
        samples.len(),
        val.len(),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val) = split_train_val(items, 0.8, SplitStrategy::Chronological);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(), 20);
    }

    #[test]
    fn test_chronological_keeps_order() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val) = split_train_val(items, 0.7, SplitStrategy::Chronological);
        assert_eq!(train, (0..7).collect::<Vec<_>>());
        assert_eq!(val, vec![7, 8, 9]);
    }

    #[test]
    fn test_shuffled_split_is_reproducible() {
        let items: Vec<usize> = (0..50).collect();
        let a = split_train_val(items.clone(), 0.7, SplitStrategy::Shuffled { seed: 7 });
        let b = split_train_val(items, 0.7, SplitStrategy::Shuffled { seed: 7 });
        assert_eq!(a, b);
        assert_eq!(a.0.len() + a.1.len(), 50);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val) = split_train_val(items, 0.8, SplitStrategy::Chronological);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_strategy_from_seed() {
        assert_eq!(SplitStrategy::from_seed(None), SplitStrategy::Chronological);
        assert_eq!(SplitStrategy::from_seed(Some(3)), SplitStrategy::Shuffled { seed: 3 });
    }
}
