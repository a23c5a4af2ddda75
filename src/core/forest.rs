use crate::core::classifier::{rows_for_features, Classifier, ModelError};
use crate::core::table::FeatureTable;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File holding the serialized forest inside a logged model directory
pub const MODEL_FILE: &str = "model.json";

/// File holding a few training rows next to the model
pub const INPUT_EXAMPLE_FILE: &str = "input_example.json";

const ARTIFACT_FORMAT: &str = "random_forest/v1";

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{features} rows but {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },

    #[error("non-finite value in training row {0}")]
    NonFinite(usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hyper-parameters of the forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Leaf {
        class_index: usize,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> usize {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { class_index, .. } => return *class_index,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if value <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn max_feature(&self) -> Option<usize> {
        match self {
            Node::Leaf { .. } => None,
            Node::Split { feature, left, right, .. } => [Some(*feature), left.max_feature(), right.max_feature()]
                .into_iter()
                .flatten()
                .max(),
        }
    }

    fn max_class(&self) -> usize {
        match self {
            Node::Leaf { class_index, .. } => *class_index,
            Node::Split { left, right, .. } => left.max_class().max(right.max_class()),
        }
    }
}

/// Ensemble of Gini CART trees grown on bootstrap samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    format: String,
    feature_names: Vec<String>,
    classes: Vec<i64>,
    params: ForestParams,
    trees: Vec<Node>,
}

/// Training data borrowed by the tree builder
struct TrainingSet<'a> {
    rows: &'a [Vec<f64>],
    labels: Vec<usize>,
    n_classes: usize,
    max_features: usize,
    params: ForestParams,
}

impl RandomForest {
    /// Fit a forest on row-major `rows` with integer class `labels`
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[i64],
        feature_names: Vec<String>,
        params: ForestParams,
    ) -> Result<Self, ForestError> {
        if params.n_estimators == 0 {
            return Err(ForestError::InvalidParameter("n_estimators must be at least 1".into()));
        }
        if params.min_samples_split < 2 {
            return Err(ForestError::InvalidParameter("min_samples_split must be at least 2".into()));
        }
        if feature_names.is_empty() {
            return Err(ForestError::InvalidParameter("at least one feature is required".into()));
        }
        if rows.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }
        if rows.len() != labels.len() {
            return Err(ForestError::LabelCountMismatch {
                features: rows.len(),
                labels: labels.len(),
            });
        }
        let n_features = feature_names.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(ForestError::RaggedRow {
                    row: i,
                    expected: n_features,
                    actual: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ForestError::NonFinite(i));
            }
        }

        let mut classes: Vec<i64> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let encoded: Vec<usize> = labels
            .iter()
            .filter_map(|l| classes.binary_search(l).ok())
            .collect();

        let max_features = ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1));
        let set = TrainingSet {
            rows,
            labels: encoded,
            n_classes: classes.len(),
            max_features,
            params,
        };

        let mut rng = StdRng::seed_from_u64(params.random_state);
        let n = rows.len();
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                set.grow(bootstrap, 0, &mut tree_rng)
            })
            .collect();

        Ok(Self {
            format: ARTIFACT_FORMAT.to_string(),
            feature_names,
            classes,
            params,
            trees,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_depth_reached(&self) -> usize {
        self.trees.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Majority vote over all trees; ties go to the smallest class label
    pub fn predict_row(&self, row: &[f64]) -> Result<i64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            let class = tree.predict(row);
            if let Some(v) = votes.get_mut(class) {
                *v += 1;
            }
        }
        let mut best = 0;
        for (idx, count) in votes.iter().enumerate() {
            if *count > votes[best] {
                best = idx;
            }
        }
        self.classes
            .get(best)
            .copied()
            .ok_or_else(|| ModelError::Other("model has no classes".into()))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ForestError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and sanity-check a serialized forest
    pub fn from_json(bytes: &[u8]) -> Result<Self, ForestError> {
        let forest: RandomForest = serde_json::from_slice(bytes)?;

        if forest.format != ARTIFACT_FORMAT {
            return Err(ForestError::InvalidArtifact(format!(
                "unsupported format '{}'",
                forest.format
            )));
        }
        if forest.trees.is_empty() || forest.classes.is_empty() {
            return Err(ForestError::InvalidArtifact("forest has no trees or classes".into()));
        }
        for tree in &forest.trees {
            if tree.max_feature().map_or(false, |f| f >= forest.feature_names.len()) {
                return Err(ForestError::InvalidArtifact("split on unknown feature".into()));
            }
            if tree.max_class() >= forest.classes.len() {
                return Err(ForestError::InvalidArtifact("leaf with unknown class".into()));
            }
        }
        Ok(forest)
    }
}

impl Classifier for RandomForest {
    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        let rows = rows_for_features(table, &self.feature_names)?;
        rows.iter()
            .map(|row| self.predict_row(row).map(|class| class as f64))
            .collect()
    }

    fn describe(&self) -> String {
        format!(
            "RandomForest(n_estimators={}, features={}, classes={:?})",
            self.trees.len(),
            self.feature_names.len(),
            self.classes
        )
    }
}

impl TrainingSet<'_> {
    fn grow(&self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let counts = self.class_counts(&indices);
        let majority = argmax(&counts);
        let pure = counts.iter().filter(|c| **c > 0).count() <= 1;
        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);

        if pure || depth_reached || indices.len() < self.params.min_samples_split {
            return Node::Leaf {
                class_index: majority,
                samples: indices.len(),
            };
        }

        let n_features = self.rows[0].len();
        let candidates = sample(rng, n_features, self.max_features).into_vec();
        let best = self.best_split(&indices, &candidates).or_else(|| {
            // None of the sampled features separate these rows; fall back to the rest
            let rest: Vec<usize> = (0..n_features).filter(|f| !candidates.contains(f)).collect();
            self.best_split(&indices, &rest)
        });

        let Some((feature, threshold)) = best else {
            return Node::Leaf {
                class_index: majority,
                samples: indices.len(),
            };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.rows[i][feature] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }

    /// Lowest weighted Gini impurity split over `features`, if any feature
    /// takes more than one value on `indices`
    fn best_split(&self, indices: &[usize], features: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let total = self.class_counts(indices);
        let mut best: Option<(f64, usize, f64)> = None;

        for &feature in features {
            let mut pairs: Vec<(f64, usize)> = indices
                .iter()
                .map(|&i| (self.rows[i][feature], self.labels[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            for k in 0..pairs.len() - 1 {
                left[pairs[k].1] += 1;
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }
                let n_left = (k + 1) as f64;
                let n_right = n - n_left;
                let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
                let score = (n_left * gini(&left, n_left) + n_right * gini(&right, n_right)) / n;

                if best.map_or(true, |(s, _, _)| score < s) {
                    let threshold = (pairs[k].0 + pairs[k + 1].0) / 2.0;
                    best = Some((score, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

fn gini(counts: &[usize], n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (idx, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::ColumnData;

    fn separable() -> (Vec<Vec<f64>>, Vec<i64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x = i as f64;
            rows.push(vec![x, (i % 3) as f64]);
            labels.push(if x < 20.0 { 0 } else { 1 });
        }
        (rows, labels)
    }

    fn names() -> Vec<String> {
        vec!["x".to_string(), "noise".to_string()]
    }

    #[test]
    fn test_fit_learns_threshold() {
        let (rows, labels) = separable();
        let forest = RandomForest::fit(&rows, &labels, names(), ForestParams { n_estimators: 15, ..Default::default() }).unwrap();

        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.classes(), &[0, 1]);
        assert_eq!(forest.predict_row(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(forest.predict_row(&[37.0, 1.0]).unwrap(), 1);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let (rows, labels) = separable();
        let params = ForestParams { n_estimators: 5, random_state: 7, ..Default::default() };
        let a = RandomForest::fit(&rows, &labels, names(), params).unwrap();
        let b = RandomForest::fit(&rows, &labels, names(), params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_depth_respected() {
        let (rows, labels) = separable();
        let params = ForestParams { n_estimators: 3, max_depth: Some(1), ..Default::default() };
        let forest = RandomForest::fit(&rows, &labels, names(), params).unwrap();
        assert!(forest.max_depth_reached() <= 1);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let (rows, labels) = separable();
        assert!(matches!(
            RandomForest::fit(&[], &[], names(), ForestParams::default()),
            Err(ForestError::EmptyTrainingSet)
        ));
        assert!(matches!(
            RandomForest::fit(&rows, &labels[..3], names(), ForestParams::default()),
            Err(ForestError::LabelCountMismatch { .. })
        ));
        assert!(matches!(
            RandomForest::fit(&rows, &labels, names(), ForestParams { n_estimators: 0, ..Default::default() }),
            Err(ForestError::InvalidParameter(_))
        ));
        assert!(matches!(
            RandomForest::fit(&[vec![f64::NAN, 0.0]], &[1], names(), ForestParams::default()),
            Err(ForestError::NonFinite(0))
        ));
    }

    #[test]
    fn test_json_artifact_round_trip_and_validation() {
        let (rows, labels) = separable();
        let forest = RandomForest::fit(&rows, &labels, names(), ForestParams { n_estimators: 3, ..Default::default() }).unwrap();

        let restored = RandomForest::from_json(&forest.to_json().unwrap()).unwrap();
        assert_eq!(restored, forest);

        assert!(RandomForest::from_json(b"{\"not\": \"a model\"}").is_err());

        let mut tampered: serde_json::Value = serde_json::from_slice(&forest.to_json().unwrap()).unwrap();
        tampered["feature_names"] = serde_json::json!([]);
        let bytes = serde_json::to_vec(&tampered).unwrap();
        assert!(matches!(
            RandomForest::from_json(&bytes),
            Err(ForestError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_classifier_matches_columns_by_name() {
        let (rows, labels) = separable();
        let forest = RandomForest::fit(&rows, &labels, names(), ForestParams { n_estimators: 9, ..Default::default() }).unwrap();

        let table = FeatureTable::new()
            .with_column("noise", ColumnData::Float(vec![0.0, 2.0]))
            .unwrap()
            .with_column("x", ColumnData::Float(vec![1.0, 39.0]))
            .unwrap();

        assert_eq!(forest.predict(&table).unwrap(), vec![0.0, 1.0]);

        let missing = FeatureTable::new()
            .with_column("x", ColumnData::Float(vec![1.0]))
            .unwrap();
        assert!(matches!(forest.predict(&missing), Err(ModelError::MissingFeature(_))));
    }
}
