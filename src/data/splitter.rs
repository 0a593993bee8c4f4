// ============================================================
// Layer 4 — Train/Dev Splitter
// ============================================================
// When no separate dev file is given, a fraction of the training
// records is held out. The shuffle is seeded so the same split
// comes back on every run (and on resume).
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, dev).
pub fn split_train_dev<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let dev = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} dev ({}% / {}%)",
        samples.len(),
        dev.len(),
        (samples.len() * 100) / total.max(1),
        (dev.len() * 100) / total.max(1),
    );

    (samples, dev)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, dev) = split_train_dev(items, 0.8, 7);
        assert_eq!(train.len(), 80);
        assert_eq!(dev.len(), 20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, dev) = split_train_dev(items, 0.7, 7);
        let mut all: Vec<usize> = train.into_iter().chain(dev).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let (a, _) = split_train_dev((0..30).collect::<Vec<usize>>(), 0.5, 42);
        let (b, _) = split_train_dev((0..30).collect::<Vec<usize>>(), 0.5, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, dev) = split_train_dev(Vec::<usize>::new(), 0.8, 1);
        assert!(train.is_empty());
        assert!(dev.is_empty());
    }
}
