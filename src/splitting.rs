//! Split strategies: how a run partitions a dataset
//!
//! | name       | partitions                                   |
//! |------------|----------------------------------------------|
//! | `random`   | one seeded shuffle cut at `test_ratio`       |
//! | `cv`       | `folds` seeded folds, each the test set once |
//! | `function` | whatever the supplied closure returns        |

use std::fmt;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Index sets of one split.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    /// Training indices.
    pub train: Vec<usize>,
    /// Test indices.
    pub test: Vec<usize>,
    /// Validation indices, if the strategy produces them.
    pub validation: Option<Vec<usize>>,
}

/// Caller-supplied partitioning: dataset size in, partitions out.
pub type SplitFn = Rc<dyn Fn(usize) -> Vec<Partition>>;

/// Strategy used to derive the splits of a run.
#[derive(Clone)]
pub enum SplitStrategy {
    /// Single shuffled train/test cut.
    Random {
        /// Fraction of rows used for testing.
        test_ratio: f64,
        /// Shuffle seed.
        seed: u64,
    },
    /// K-fold cross validation.
    CrossValidation {
        /// Number of folds.
        folds: usize,
        /// Shuffle seed.
        seed: u64,
    },
    /// Caller supplied partitioning.
    Function(SplitFn),
}

impl Default for SplitStrategy {
    fn default() -> Self {
        Self::Random {
            test_ratio: 0.25,
            seed: 0,
        }
    }
}

impl fmt::Debug for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random { test_ratio, seed } => f
                .debug_struct("Random")
                .field("test_ratio", test_ratio)
                .field("seed", seed)
                .finish(),
            Self::CrossValidation { folds, seed } => f
                .debug_struct("CrossValidation")
                .field("folds", folds)
                .field("seed", seed)
                .finish(),
            Self::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

impl SplitStrategy {
    /// Strategy registered under `name` with default settings.
    ///
    /// `function` needs a closure and is built with [`SplitStrategy::function`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "random" => Some(Self::default()),
            "cv" => Some(Self::CrossValidation { folds: 5, seed: 0 }),
            _ => None,
        }
    }

    /// Wrap a partitioning closure.
    pub fn function(split: impl Fn(usize) -> Vec<Partition> + 'static) -> Self {
        Self::Function(Rc::new(split))
    }

    /// Name persisted with the experiment.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Random { .. } => "random",
            Self::CrossValidation { .. } => "cv",
            Self::Function(_) => "function",
        }
    }

    /// Partitions of a dataset with `size` rows, in split order.
    #[must_use]
    pub fn partitions(&self, size: usize) -> Vec<Partition> {
        match self {
            Self::Random { test_ratio, seed } => {
                let indices = shuffled(size, *seed);
                let cut = test_count(size, *test_ratio);
                vec![Partition {
                    test: indices[..cut].to_vec(),
                    train: indices[cut..].to_vec(),
                    validation: None,
                }]
            }
            Self::CrossValidation { folds, seed } => {
                let folds = (*folds).clamp(1, size.max(1));
                let indices = shuffled(size, *seed);
                (0..folds)
                    .map(|fold| {
                        let (start, end) = (fold * size / folds, (fold + 1) * size / folds);
                        Partition {
                            test: indices[start..end].to_vec(),
                            train: indices[..start]
                                .iter()
                                .chain(&indices[end..])
                                .copied()
                                .collect(),
                            validation: None,
                        }
                    })
                    .collect()
            }
            Self::Function(split) => split(size),
        }
    }
}

fn shuffled(size: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..size).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn test_count(size: usize, ratio: f64) -> usize {
    let ratio = ratio.clamp(0.0, 1.0);
    ((size as f64) * ratio).round() as usize
}
