//! Isolation forest outlier model.
//!
//! Points that are isolated by few random axis-aligned splits are anomalous.
//! Scores follow the usual convention: `score_samples` lies in [-1, 0] and
//! `decision_function` is shifted by a fitted offset so that negative values are
//! outliers. Fitting is deterministic for a given seed and row order.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Lower bound of the fitted offset; matches the reference "auto" boundary.
pub const AUTO_OFFSET: f64 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.02,
            seed: 42,
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
                if row[*feature] <= *threshold {
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
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit on `rows`; every row must have the same width.
    pub fn fit(rows: &[Vec<f64>], params: &ForestParams) -> Self {
        let n = rows.len();
        let sample_size = params.max_samples.min(n);
        let height_limit = if sample_size > 1 {
            (sample_size as f64).log2().ceil() as usize
        } else {
            0
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = if n == 0 {
            Vec::new()
        } else {
            (0..params.n_estimators)
                .map(|_| {
                    let sample = index::sample(&mut rng, n, sample_size).into_vec();
                    build_tree(rows, sample, 0, height_limit, &mut rng)
                })
                .collect()
        };

        let mut forest = Self {
            trees,
            sample_size,
            offset: AUTO_OFFSET,
        };

        let training_scores = forest.score_samples(rows);
        forest.offset = quantile(&training_scores, params.contamination)
            .map_or(AUTO_OFFSET, |q| q.max(AUTO_OFFSET));
        forest
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw anomaly score in [-1, 0]; lower is more anomalous.
    pub fn score_sample(&self, row: &[f64]) -> f64 {
        let normalizer = average_path_length(self.sample_size);
        if self.trees.is_empty() || normalizer == 0.0 {
            return AUTO_OFFSET;
        }

        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        -(2f64.powf(-mean_depth / normalizer))
    }

    pub fn score_samples(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.score_sample(row)).collect()
    }

    /// `score_samples - offset`; negative values are outliers.
    pub fn decision_function(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter()
            .map(|row| self.score_sample(row) - self.offset)
            .collect()
    }
}

fn build_tree(
    rows: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary inside this node can split it.
    let width = rows[indices[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = rows[i][feature];
                (lo.min(v), hi.max(v))
            });
            (min < max).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| rows[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(rows, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(rows, right, depth + 1, height_limit, rng)),
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
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

/// Linear-interpolation quantile, `q` in [0, 1].
fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![100.0 + (i % 7) as f64, 18.0 + (i % 3) as f64, 5.0])
            .collect();
        rows.push(vec![50_000.0, 19.0, 5.0]);
        rows
    }

    #[test]
    fn average_path_length_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.2448).abs() < 1e-3, "c(256) = {}", c256);
    }

    #[test]
    fn quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn outlier_scores_lowest() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::fit(&rows, &ForestParams::default());
        let scores = forest.score_samples(&rows);

        let (lowest, _) = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(lowest, rows.len() - 1);
        assert!(scores.iter().all(|s| (-1.0..=0.0).contains(s)));
    }

    #[test]
    fn fitting_is_deterministic() {
        let rows = cluster_with_outlier();
        let a = IsolationForest::fit(&rows, &ForestParams::default()).decision_function(&rows);
        let b = IsolationForest::fit(&rows, &ForestParams::default()).decision_function(&rows);
        assert_eq!(a, b);
    }

    #[test]
    fn offset_never_drops_below_auto() {
        let rows = cluster_with_outlier();
        let forest = IsolationForest::fit(&rows, &ForestParams::default());
        assert!(forest.offset() >= AUTO_OFFSET);
    }

    #[test]
    fn constant_rows_are_neutral() {
        let rows = vec![vec![1.0, 1.0, 1.0]; 12];
        let forest = IsolationForest::fit(&rows, &ForestParams::default());
        let scores = forest.decision_function(&rows);
        let first = scores[0];
        assert!(scores.iter().all(|s| *s == first));
    }

    #[test]
    fn empty_input_fits_empty_forest() {
        let forest = IsolationForest::fit(&[], &ForestParams::default());
        assert!(forest.decision_function(&[]).is_empty());
    }
}
