use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle `0..n` with `seed` and cut it into (train, test) index sets.
///
/// The test set gets `ceil(test_size * n)` rows. Returns `None` when either
/// side would be empty or `test_size` is outside (0, 1).
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Option<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return None;
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return None;
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(n_test);
    Some((train, indices))
}

/// Fraction of positions where prediction and truth agree
pub fn accuracy(truth: &[i64], predicted: &[i64]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    correct as f64 / truth.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_disjoint() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_degenerate_sizes() {
        assert!(train_test_split(10, 0.0, 1).is_none());
        assert!(train_test_split(10, 1.0, 1).is_none());
        assert!(train_test_split(1, 0.5, 1).is_none());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(50, 0.3, 9), train_test_split(50, 0.3, 9));
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[1, 0, 1, 1], &[1, 0, 0, 1]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
