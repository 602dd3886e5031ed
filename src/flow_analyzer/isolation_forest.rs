// isolation_forest.rs
//
// Isolation forest over dense feature rows. Scores follow the usual
// convention: `score_samples` is the negated anomaly score in [-1, 0), and
// `decision_function` shifts it by an offset chosen so that roughly
// `contamination` of the training rows fall below zero.

use crate::error::{EngineError, Result};
use rand::rngs::SmallRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Average path length of an unsuccessful search in a binary search tree
/// built from `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] < *threshold {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub random_state: u64,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, contamination: f64, random_state: u64) -> Self {
        Self {
            n_estimators,
            max_samples: DEFAULT_MAX_SAMPLES,
            contamination,
            random_state,
        }
    }

    pub fn fit(&self, rows: &[Vec<f64>]) -> Result<FittedForest> {
        let n_features = check_rows(rows, None)?;
        if rows.len() < 2 {
            return Err(EngineError::ModelScoring(format!(
                "isolation forest needs at least 2 rows, got {}",
                rows.len()
            )));
        }
        if self.n_estimators == 0 {
            return Err(EngineError::ModelScoring(
                "isolation forest needs at least one tree".to_string(),
            ));
        }

        let sample_size = self.max_samples.min(rows.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = SmallRng::seed_from_u64(self.random_state);

        let trees = (0..self.n_estimators)
            .map(|_| {
                let indices = sample(&mut rng, rows.len(), sample_size).into_vec();
                build_node(rows, indices, 0, height_limit, n_features, &mut rng)
            })
            .collect();

        let mut forest = FittedForest {
            trees,
            sample_size,
            n_features,
            offset: 0.0,
        };
        let mut training_scores = forest.score_samples(rows)?;
        training_scores.sort_by(f64::total_cmp);
        forest.offset = percentile(&training_scores, self.contamination * 100.0);
        Ok(forest)
    }
}

fn build_node(
    rows: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    n_features: usize,
    rng: &mut SmallRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary inside this node can split it.
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|feature| {
            let (lo, hi) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(rows[i][feature]), hi.max(rows[i][feature])),
            );
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = splittable[rng.random_range(0..splittable.len())];
    let mut threshold = rng.random_range(lo..hi);
    if threshold <= lo {
        threshold = (lo + hi) / 2.0;
    }

    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| rows[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_node(rows, left, depth + 1, height_limit, n_features, rng)),
        right: Box::new(build_node(rows, right, depth + 1, height_limit, n_features, rng)),
    }
}

/// A trained forest. Immutable; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FittedForest {
    trees: Vec<Node>,
    sample_size: usize,
    n_features: usize,
    offset: f64,
}

impl FittedForest {
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// `-2^(-E[h(x)] / c(sample_size))` per row.
    pub fn score_samples(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_rows(rows, Some(self.n_features))?;
        let normaliser = average_path_length(self.sample_size).max(f64::MIN_POSITIVE);
        Ok(rows
            .iter()
            .map(|row| {
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(row, 0))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_path / normaliser))
            })
            .collect())
    }

    /// Negative values are outliers.
    pub fn decision_function(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self
            .score_samples(rows)?
            .into_iter()
            .map(|s| s - self.offset)
            .collect())
    }
}

/// Validates shape and finiteness; returns the feature count.
fn check_rows(rows: &[Vec<f64>], expected: Option<usize>) -> Result<usize> {
    let width = match (expected, rows.first()) {
        (Some(width), _) => width,
        (None, Some(first)) => first.len(),
        (None, None) => return Err(EngineError::ModelScoring("no rows to fit".to_string())),
    };
    if width == 0 {
        return Err(EngineError::ModelScoring("rows have no features".to_string()));
    }
    for row in rows {
        if row.len() != width {
            return Err(EngineError::ModelScoring(format!(
                "expected {} features, got {}",
                width,
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::ModelScoring(
                "row contains non-finite values".to_string(),
            ));
        }
    }
    Ok(width)
}

/// Linear-interpolated percentile of sorted values, `q` in [0, 100].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![10.0 + (i % 6) as f64 * 0.1, 20.0 + (i % 5) as f64 * 0.1])
            .collect();
        rows.push(vec![80.0, -40.0]);
        rows
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244_770_920_12).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert!((percentile(&sorted, 10.0) - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
    }

    #[test]
    fn test_outlier_scores_lowest() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::new(100, 0.1, 42).fit(&rows).unwrap();
        let scores = forest.decision_function(&rows).unwrap();

        let outlier = scores[rows.len() - 1];
        assert!(outlier < 0.0);
        assert!(scores[..rows.len() - 1].iter().all(|&s| s > outlier));
    }

    #[test]
    fn test_score_samples_are_in_range() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::new(50, 0.1, 1).fit(&rows).unwrap();
        for s in forest.score_samples(&rows).unwrap() {
            assert!((-1.0..0.0).contains(&s));
        }
    }

    #[test]
    fn test_same_seed_same_scores() {
        let rows = cluster_with_outlier();
        let a = IsolationForest::new(30, 0.1, 9).fit(&rows).unwrap();
        let b = IsolationForest::new(30, 0.1, 9).fit(&rows).unwrap();
        assert_eq!(
            a.decision_function(&rows).unwrap(),
            b.decision_function(&rows).unwrap()
        );
    }

    #[test]
    fn test_wrong_width_is_an_error() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::new(10, 0.1, 42).fit(&rows).unwrap();
        assert!(matches!(
            forest.decision_function(&[vec![1.0, 2.0, 3.0]]),
            Err(EngineError::ModelScoring(_))
        ));
    }

    #[test]
    fn test_constant_rows_fit() {
        let rows = vec![vec![5.0, 5.0]; 20];
        let forest = IsolationForest::new(10, 0.1, 42).fit(&rows).unwrap();
        let scores = forest.decision_function(&rows).unwrap();
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_single_row_is_rejected() {
        assert!(IsolationForest::new(10, 0.1, 42)
            .fit(&[vec![1.0, 2.0]])
            .is_err());
    }
}
