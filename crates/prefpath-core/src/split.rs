//! Train / cross-validation / test partitioning of subject indices.
//!
//! The partition is generated once when a run is first created and stored in
//! the checkpoint; it is never regenerated on resume.

use crate::errors::{PrefPathError, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Splits dataset-local subject indices into train/cv/test partitions.
///
/// Percentages apply to the shuffled index list; the test partition takes the
/// remainder. A single-subject run degenerates to train = [0].
pub fn train_cv_test_split<R: Rng>(
    n_subjects: usize,
    train_pct: f64,
    cv_pct: f64,
    rng: &mut R,
) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>)> {
    if n_subjects == 0 {
        return Err(PrefPathError::config("cannot partition zero subjects"));
    }
    if !(0.0..=1.0).contains(&train_pct)
        || !(0.0..=1.0).contains(&cv_pct)
        || train_pct + cv_pct > 1.0
    {
        return Err(PrefPathError::config(format!(
            "invalid split percentages: train {train_pct}, cv {cv_pct}"
        )));
    }

    if n_subjects == 1 {
        return Ok((vec![0], Vec::new(), Vec::new()));
    }

    let mut indices: Vec<usize> = (0..n_subjects).collect();
    indices.shuffle(rng);

    let n_train = ((n_subjects as f64) * train_pct).round() as usize;
    let n_cv = ((n_subjects as f64) * cv_pct).round() as usize;
    let n_train = n_train.max(1).min(n_subjects);
    let n_cv = n_cv.min(n_subjects - n_train);

    let train = indices[..n_train].to_vec();
    let cv = indices[n_train..n_train + n_cv].to_vec();
    let test = indices[n_train + n_cv..].to_vec();
    Ok((train, cv, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        let (train, cv, test) = train_cv_test_split(100, 0.6, 0.2, &mut rng).unwrap();
        assert_eq!(train.len(), 60);
        assert_eq!(cv.len(), 20);
        assert_eq!(test.len(), 20);

        let mut all: Vec<usize> = train.iter().chain(&cv).chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_subject_degenerates() {
        let mut rng = StdRng::seed_from_u64(0);
        let (train, cv, test) = train_cv_test_split(1, 0.6, 0.2, &mut rng).unwrap();
        assert_eq!(train, vec![0]);
        assert!(cv.is_empty());
        assert!(test.is_empty());
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let split_a = train_cv_test_split(50, 0.6, 0.2, &mut a).unwrap();
        let split_b = train_cv_test_split(50, 0.6, 0.2, &mut b).unwrap();
        assert_eq!(split_a, split_b);
    }

    #[test]
    fn test_bad_percentages_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(train_cv_test_split(10, 0.9, 0.5, &mut rng).is_err());
        assert!(train_cv_test_split(0, 0.6, 0.2, &mut rng).is_err());
    }
}
