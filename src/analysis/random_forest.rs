//! Random forest classifier: bootstrap-aggregated CART trees with Gini
//! impurity and a random feature subset examined at every node.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Two values closer than this are treated as equal when placing thresholds.
const FEATURE_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        probabilities: [f64; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [u8],
    max_features: usize,
    total_samples: f64,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: Vec<usize>, rng: &mut StdRng) -> usize {
        let slot = self.nodes.len();
        let counts = class_counts(self.labels, &indices);
        self.nodes.push(TreeNode::Leaf {
            probabilities: probabilities(counts),
        });

        let impurity = gini(counts);
        if indices.len() < 2 || impurity == 0.0 {
            return slot;
        }

        let Some(split) = self.best_split(&indices, rng) else {
            return slot;
        };

        let weight = indices.len() as f64 / self.total_samples;
        self.importances[split.feature] += weight * (impurity - split.impurity);

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][split.feature] <= split.threshold);

        let left = self.build(left, rng);
        let right = self.build(right, rng);
        self.nodes[slot] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    /// Visits features in random order until `max_features` non-constant ones
    /// have been examined, so a node only stays a leaf when no feature varies.
    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        let n_features = self.features[indices[0]].len();
        let mut order: Vec<usize> = (0..n_features).collect();
        order.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        for feature in order {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            let Some(candidate) = self.best_threshold(indices, feature) else {
                continue;
            };
            visited += 1;
            if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_threshold(&self, indices: &[usize], feature: usize) -> Option<SplitCandidate> {
        let mut sorted: Vec<(f64, u8)> = indices
            .iter()
            .map(|&i| (self.features[i][feature], self.labels[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = class_counts_sorted(&sorted);
        let n = sorted.len() as f64;
        let mut left = [0usize; 2];
        let mut best: Option<SplitCandidate> = None;

        for position in 0..sorted.len() - 1 {
            left[sorted[position].1 as usize] += 1;
            let (value, next) = (sorted[position].0, sorted[position + 1].0);
            if next <= value + FEATURE_EPSILON {
                continue;
            }

            let right = [total[0] - left[0], total[1] - left[1]];
            let n_left = (position + 1) as f64;
            let impurity = (n_left * gini(left) + (n - n_left) * gini(right)) / n;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = value / 2.0 + next / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

impl DecisionTree {
    fn fit(
        features: &[Vec<f64>],
        labels: &[u8],
        indices: Vec<usize>,
        max_features: usize,
        rng: &mut StdRng,
    ) -> (Self, Vec<f64>) {
        let n_features = features.first().map_or(0, |row| row.len());
        let mut builder = TreeBuilder {
            features,
            labels,
            max_features,
            total_samples: indices.len() as f64,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.build(indices, rng);
        (
            DecisionTree {
                nodes: builder.nodes,
            },
            builder.importances,
        )
    }

    pub fn predict_proba(&self, point: &[f64]) -> [f64; 2] {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => node = if point[*feature] <= *threshold { *left } else { *right },
                TreeNode::Leaf { probabilities } => return *probabilities,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit on rows of `features` with binary `labels` (0 or 1).
    /// Both slices must be non-empty and of equal length.
    pub fn fit(features: &[Vec<f64>], labels: &[u8], params: &RandomForestParams) -> Self {
        debug_assert!(!features.is_empty(), "random forest needs at least one row");
        debug_assert_eq!(features.len(), labels.len());
        let n_samples = features.len();
        let n_features = features.first().map_or(0, |row| row.len());
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);
        let mut master = StdRng::seed_from_u64(params.seed);

        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..params.n_estimators.max(1) {
            let mut rng = StdRng::seed_from_u64(master.gen());
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let (tree, tree_importances) = DecisionTree::fit(features, labels, bootstrap, max_features, &mut rng);

            let tree_total: f64 = tree_importances.iter().sum();
            if tree_total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&tree_importances) {
                    *acc += value / tree_total;
                }
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        log::debug!(
            "Fitted random forest: {} trees, {} nodes",
            trees.len(),
            trees.iter().map(DecisionTree::node_count).sum::<usize>()
        );

        Self {
            trees,
            feature_importances: importances,
        }
    }

    /// Mean of the per-tree leaf class probabilities.
    pub fn predict_proba(&self, point: &[f64]) -> [f64; 2] {
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let p = tree.predict_proba(point);
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }

    /// Class 1 only when strictly more probable than class 0.
    pub fn predict(&self, point: &[f64]) -> u8 {
        let p = self.predict_proba(point);
        u8::from(p[1] > p[0])
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

fn class_counts(labels: &[u8], indices: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in indices {
        counts[labels[i] as usize] += 1;
    }
    counts
}

fn class_counts_sorted(sorted: &[(f64, u8)]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for (_, label) in sorted {
        counts[*label as usize] += 1;
    }
    counts
}

fn probabilities(counts: [usize; 2]) -> [f64; 2] {
    let total = (counts[0] + counts[1]) as f64;
    if total == 0.0 {
        return [1.0, 0.0];
    }
    [counts[0] as f64 / total, counts[1] as f64 / total]
}

fn gini(counts: [usize; 2]) -> f64 {
    let total = (counts[0] + counts[1]) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / total;
    let p1 = counts[1] as f64 / total;
    1.0 - p0 * p0 - p1 * p1
}
