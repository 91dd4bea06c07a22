//! Isolation forest: unsupervised outlier scoring by random axis-aligned
//! partitioning. Points that isolate in few splits score close to 1.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    External {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &[Vec<f64>], sample: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = IsolationTree { nodes: Vec::new() };
        tree.grow_node(data, sample, 0, height_limit, rng);
        tree
    }

    fn grow_node(
        &mut self,
        data: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node::External { size: indices.len() });

        if depth >= height_limit || indices.len() <= 1 {
            return slot;
        }

        // Only features that still vary inside this node can split it.
        let n_features = data[indices[0]].len();
        let ranges: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(data[i][feature]), hi.max(data[i][feature]))
                });
                (min < max && (max - min).is_finite()).then_some((feature, min, max))
            })
            .collect();

        if ranges.is_empty() {
            return slot;
        }

        let (feature, min, max) = ranges[rng.gen_range(0..ranges.len())];
        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| data[i][feature] <= threshold);

        let left = self.grow_node(data, left, depth + 1, height_limit, rng);
        let right = self.grow_node(data, right, depth + 1, height_limit, rng);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::External { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` points; normalises path lengths across subsample sizes.
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
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit on `data` (rows of equal-length feature vectors). `data` must be non-empty.
    pub fn fit(data: &[Vec<f64>], params: &IsolationForestParams) -> Self {
        debug_assert!(!data.is_empty(), "isolation forest needs at least one row");
        let sample_size = params.max_samples.min(data.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut master = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(master.gen());
                let sample = rand::seq::index::sample(&mut rng, data.len(), sample_size).into_vec();
                IsolationTree::grow(data, sample, height_limit, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    pub fn mean_path_length(&self, point: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(point)).sum();
        total / self.trees.len() as f64
    }

    /// Anomaly score `2^(-E[h(x)] / c(psi))`, in (0, 1].
    pub fn score(&self, point: &[f64]) -> f64 {
        let normaliser = average_path_length(self.sample_size);
        if normaliser == 0.0 {
            // A single-point subsample cannot isolate anything.
            return 0.5;
        }
        2f64.powf(-self.mean_path_length(point) / normaliser)
    }

    pub fn score_samples(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|row| self.score(row)).collect()
    }
}

/// Linear-interpolated quantile, `q` in [0, 1]. `values` must be non-empty.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}
