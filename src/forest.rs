//! Random forest of CART trees (Gini impurity, bootstrap rows, `sqrt(n)` features per split).
//!
//! Training is fully determined by the seed: every tree draws its own seed from a master
//! `StdRng`, so building trees in parallel does not change the result.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn predict_proba(&self, row: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a, R> {
    rows: &'a [R],
    labels: &'a [usize],
    n_classes: usize,
    max_features: usize,
    params: ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl<'a, R: AsRef<[f64]>> TreeBuilder<'a, R> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(indices);
        let node_index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: distribution(&counts),
        });

        let is_pure = counts.iter().filter(|c| **c > 0).count() <= 1;
        if is_pure || depth >= self.params.max_depth || indices.len() < self.params.min_samples_split
        {
            return node_index;
        }

        let Some((feature, threshold)) = self.best_split(indices) else {
            return node_index;
        };

        let split_at = partition(indices, |i| self.value(i, feature) <= threshold);
        let (left_indices, right_indices) = indices.split_at_mut(split_at);
        let left = self.grow(left_indices, depth + 1);
        let right = self.grow(right_indices, depth + 1);
        self.nodes[node_index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_index
    }

    fn value(&self, row: usize, feature: usize) -> f64 {
        self.rows[row].as_ref()[feature]
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }

    // Features are visited in random order until `max_features` non-constant ones were tried.
    fn best_split(&mut self, indices: &[usize]) -> Option<(usize, f64)> {
        let n_features = self.rows.first().map_or(0, |r| r.as_ref().len());
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<(f64, usize, f64)> = None;
        let mut tried = 0;
        for feature in features {
            if tried >= self.max_features {
                break;
            }
            let Some((impurity, threshold)) = self.best_threshold(indices, feature) else {
                continue;
            };
            tried += 1;
            if best.map_or(true, |(b, _, _)| impurity < b) {
                best = Some((impurity, feature, threshold));
            }
        }
        best.map(|(_, feature, threshold)| (feature, threshold))
    }

    /// Lowest weighted Gini over all midpoints of `feature`, `None` if the feature is constant.
    fn best_threshold(&self, indices: &[usize], feature: usize) -> Option<(f64, f64)> {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.value(i, feature), self.labels[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = sorted.len();
        let mut right = vec![0usize; self.n_classes];
        for &(_, label) in &sorted {
            right[label] += 1;
        }
        let mut left = vec![0usize; self.n_classes];

        let mut best: Option<(f64, f64)> = None;
        for i in 0..total - 1 {
            let (value, label) = sorted[i];
            left[label] += 1;
            right[label] -= 1;

            let next = sorted[i + 1].0;
            if next <= value {
                continue;
            }
            let n_left = (i + 1) as f64;
            let n_right = (total - i - 1) as f64;
            let impurity = (n_left * gini(&left) + n_right * gini(&right)) / total as f64;
            if best.map_or(true, |(b, _)| impurity < b) {
                best = Some((impurity, value + (next - value) / 2.0));
            }
        }
        best
    }
}

fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

fn distribution(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![1.0 / counts.len().max(1) as f64; counts.len()];
    }
    counts.iter().map(|&c| c as f64 / total as f64).collect()
}

// In-place partition, returns the number of elements for which `keep_left` holds.
fn partition(indices: &mut [usize], keep_left: impl Fn(usize) -> bool) -> usize {
    let mut boundary = 0;
    for i in 0..indices.len() {
        if keep_left(indices[i]) {
            indices.swap(i, boundary);
            boundary += 1;
        }
    }
    boundary
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    params: ForestParams,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit<R>(rows: &[R], labels: &[usize], n_classes: usize, params: ForestParams, seed: u64) -> Self
    where
        R: AsRef<[f64]> + Sync,
    {
        let n_features = rows.first().map_or(0, |r| r.as_ref().len());
        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        let mut master = StdRng::seed_from_u64(seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.random()).collect();

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let mut sample: Vec<usize> = (0..rows.len())
                    .map(|_| rng.random_range(0..rows.len()))
                    .collect();
                let mut builder = TreeBuilder {
                    rows,
                    labels,
                    n_classes,
                    max_features,
                    params,
                    rng,
                    nodes: Vec::new(),
                };
                builder.grow(&mut sample, 0);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Self {
            params,
            n_classes,
            n_features,
            trees,
        }
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean of the per-tree class distributions.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut total = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (sum, p) in total.iter_mut().zip(tree.predict_proba(row)) {
                *sum += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        total.iter().map(|s| s / n).collect()
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn accuracy<R: AsRef<[f64]>>(&self, rows: &[R], labels: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = rows
            .iter()
            .zip(labels)
            .filter(|(row, label)| self.predict(row.as_ref()) == **label)
            .count();
        correct as f64 / rows.len() as f64
    }
}
