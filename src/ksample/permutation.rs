// Permutation null distributions
//
// Each replicate draws its permutation from its own ChaCha stream
// (seed, stream = replicate index + 1), so the null distribution is
// identical regardless of how rayon schedules replicates across workers.

use super::{PreparedStatistic, Result, TestError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Worker count for the permutation loop
///
/// Mirrors the `workers=-1` convention: `-1` uses every rayon thread,
/// a positive count runs in a dedicated pool of that size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Workers {
    #[default]
    All,
    Fixed(usize),
}

impl TryFrom<i32> for Workers {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(Workers::All),
            n if n > 0 => Ok(Workers::Fixed(n as usize)),
            n => Err(format!("workers must be -1 or a positive count, got {}", n)),
        }
    }
}

impl From<Workers> for i32 {
    fn from(workers: Workers) -> i32 {
        match workers {
            Workers::All => -1,
            Workers::Fixed(n) => n as i32,
        }
    }
}

/// Statistics under `reps` random permutations of `y`
pub fn permutation_null(
    prepared: &dyn PreparedStatistic,
    reps: usize,
    seed: u64,
    workers: Workers,
) -> Result<Vec<f64>> {
    let n = prepared.n_samples();
    let run = || -> Vec<f64> {
        (0..reps)
            .into_par_iter()
            .map(|rep| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(rep as u64 + 1);
                let mut perm: Vec<usize> = (0..n).collect();
                perm.shuffle(&mut rng);
                prepared.statistic(&perm)
            })
            .collect()
    };

    match workers {
        Workers::All => Ok(run()),
        Workers::Fixed(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| TestError::ThreadPool(e.to_string()))?;
            Ok(pool.install(run))
        }
    }
}

/// `(1 + #{null >= observed}) / (1 + reps)`
pub fn permutation_pvalue(observed: f64, null: &[f64]) -> f64 {
    let exceed = null.iter().filter(|&&s| s >= observed).count();
    (1 + exceed) as f64 / (1 + null.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FirstIndex;

    impl PreparedStatistic for FirstIndex {
        fn n_samples(&self) -> usize {
            8
        }

        fn statistic(&self, perm: &[usize]) -> f64 {
            perm[0] as f64
        }
    }

    #[test]
    fn test_workers_conversion() {
        assert_eq!(Workers::try_from(-1), Ok(Workers::All));
        assert_eq!(Workers::try_from(4), Ok(Workers::Fixed(4)));
        assert!(Workers::try_from(0).is_err());
        assert!(Workers::try_from(-3).is_err());
        assert_eq!(i32::from(Workers::Fixed(2)), 2);
    }

    #[test]
    fn test_pvalue_never_zero() {
        let null = vec![0.1, 0.2, 0.3];
        assert_eq!(permutation_pvalue(10.0, &null), 0.25);
        assert_eq!(permutation_pvalue(0.0, &null), 1.0);
    }

    #[test]
    fn test_null_independent_of_worker_count() {
        let all = permutation_null(&FirstIndex, 64, 11, Workers::All).unwrap();
        let two = permutation_null(&FirstIndex, 64, 11, Workers::Fixed(2)).unwrap();
        assert_eq!(all, two);
        assert_eq!(all.len(), 64);
    }

    #[test]
    fn test_null_changes_with_seed() {
        let a = permutation_null(&FirstIndex, 64, 1, Workers::All).unwrap();
        let b = permutation_null(&FirstIndex, 64, 2, Workers::All).unwrap();
        assert_ne!(a, b);
    }
}
