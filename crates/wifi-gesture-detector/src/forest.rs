//! Tree-ensemble classifier loaded from a JSON artifact.
//!
//! The artifact lists the class labels, the feature arity and a set of
//! decision trees stored as flat node arrays:
//!
//! ```json
//! {
//!   "classes": ["circle", "wave"],
//!   "n_features": 14,
//!   "trees": [
//!     { "nodes": [
//!         { "split": { "feature": 0, "threshold": 1.5, "left": 1, "right": 2 } },
//!         { "leaf": { "distribution": [3.0, 1.0] } },
//!         { "leaf": { "distribution": [0.0, 4.0] } }
//!     ] }
//!   ]
//! }
//! ```
//!
//! A sample goes left when `x[feature] <= threshold`. Leaf distributions are
//! normalised at load time and the ensemble output is their average.
//!
//! # Exporting a scikit-learn forest
//!
//! A fitted `RandomForestClassifier` maps onto this layout directly: its
//! trees are numbered depth-first (children after parents), use the same
//! `<=` split rule, and store per-class counts or fractions at the leaves,
//! both of which are accepted. Train on the 14 columns written by
//! `wifi-gesture extract`, in that order, then dump the model with:
//!
//! ```text
//! import json
//!
//! def export_forest(clf, path):
//!     trees = []
//!     for est in clf.estimators_:
//!         t = est.tree_
//!         nodes = []
//!         for i in range(t.node_count):
//!             if t.children_left[i] == -1:
//!                 nodes.append({"leaf": {"distribution": t.value[i][0].tolist()}})
//!             else:
//!                 nodes.append({"split": {
//!                     "feature": int(t.feature[i]),
//!                     "threshold": float(t.threshold[i]),
//!                     "left": int(t.children_left[i]),
//!                     "right": int(t.children_right[i]),
//!                 }})
//!         trees.append({"nodes": nodes})
//!     with open(path, "w") as f:
//!         json.dump({"classes": [str(c) for c in clf.classes_],
//!                    "n_features": int(clf.n_features_in_),
//!                    "trees": trees}, f)
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};
use wifi_gesture_core::{ClassProbabilities, FeatureVector, GestureClassifier};

/// Errors from loading a model artifact. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The artifact file could not be read.
    #[error("Cannot read model artifact `{}`: {source}", path.display())]
    FileAccess {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not valid JSON for the expected layout.
    #[error("Malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    /// The artifact parsed but is structurally unusable.
    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

impl ModelError {
    fn invalid(message: impl Into<String>) -> Self {
        ModelError::Invalid(message.into())
    }
}

/// One node of a persisted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node.
    Split {
        /// Feature index
        feature: usize,
        /// Go left when the feature is `<=` this value
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
    },
    /// Terminal node holding per-class weights (counts or probabilities).
    Leaf {
        /// One weight per class
        distribution: Vec<f64>,
    },
}

/// One persisted tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArtifact {
    /// Flat node array
    pub nodes: Vec<TreeNode>,
}

/// On-disk model layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestArtifact {
    /// Class labels in output order
    pub classes: Vec<String>,
    /// Feature arity the model was trained on
    pub n_features: usize,
    /// Ensemble members
    pub trees: Vec<TreeArtifact>,
}

/// A validated tree ensemble.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<Vec<TreeNode>>,
}

impl ForestClassifier {
    /// Load an artifact from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the file cannot be read, parsed or
    /// validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json_str(&contents)?;
        info!(
            classes = model.classes.len(),
            trees = model.trees.len(),
            n_features = model.n_features,
            "Loaded gesture model"
        );
        Ok(model)
    }

    /// Parse and validate an artifact held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Parse`] or [`ModelError::Invalid`].
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let artifact: ForestArtifact = serde_json::from_str(json)?;
        Self::from_artifact(artifact)
    }

    /// Validate an artifact and normalise its leaves.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Invalid`] describing the first structural problem.
    pub fn from_artifact(artifact: ForestArtifact) -> Result<Self, ModelError> {
        let ForestArtifact {
            classes,
            n_features,
            trees,
        } = artifact;

        if classes.is_empty() {
            return Err(ModelError::invalid("class list is empty"));
        }
        let mut seen = HashSet::new();
        for label in &classes {
            if !seen.insert(label.as_str()) {
                return Err(ModelError::invalid(format!("duplicate class label `{label}`")));
            }
        }
        if trees.is_empty() {
            return Err(ModelError::invalid("model has no trees"));
        }

        let n_classes = classes.len();
        let trees = trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| validate_tree(t, tree.nodes, n_features, n_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            classes,
            n_features,
            trees,
        })
    }

    /// Number of trees in the ensemble.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn accumulate(&self, nodes: &[TreeNode], x: &[f64], acc: &mut [f64]) {
        let mut idx = 0;
        loop {
            match &nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // Missing or NaN features compare false and go right.
                    let value = x.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if value <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { distribution } => {
                    for (a, p) in acc.iter_mut().zip(distribution) {
                        *a += p;
                    }
                    return;
                }
            }
        }
    }
}

fn validate_tree(
    t: usize,
    nodes: Vec<TreeNode>,
    n_features: usize,
    n_classes: usize,
) -> Result<Vec<TreeNode>, ModelError> {
    if nodes.is_empty() {
        return Err(ModelError::invalid(format!("tree {t} has no nodes")));
    }
    let len = nodes.len();
    nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| match node {
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if feature >= n_features {
                    return Err(ModelError::invalid(format!(
                        "tree {t} node {i}: feature {feature} out of range (n_features = {n_features})"
                    )));
                }
                // Children after the parent means every path terminates.
                for child in [left, right] {
                    if child <= i || child >= len {
                        return Err(ModelError::invalid(format!(
                            "tree {t} node {i}: child index {child} must be in {}..{len}",
                            i + 1
                        )));
                    }
                }
                if threshold.is_nan() {
                    return Err(ModelError::invalid(format!("tree {t} node {i}: threshold is NaN")));
                }
                Ok(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                })
            }
            TreeNode::Leaf { distribution } => {
                if distribution.len() != n_classes {
                    return Err(ModelError::invalid(format!(
                        "tree {t} node {i}: leaf has {} weights, expected {n_classes}",
                        distribution.len()
                    )));
                }
                if distribution.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(ModelError::invalid(format!(
                        "tree {t} node {i}: leaf weights must be finite and non-negative"
                    )));
                }
                let sum: f64 = distribution.iter().sum();
                if !(sum.is_finite() && sum > 0.0) {
                    return Err(ModelError::invalid(format!(
                        "tree {t} node {i}: leaf weights must have a positive sum"
                    )));
                }
                Ok(TreeNode::Leaf {
                    distribution: distribution.into_iter().map(|w| w / sum).collect(),
                })
            }
        })
        .collect()
}

impl GestureClassifier for ForestClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn labels(&self) -> &[String] {
        &self.classes
    }

    fn class_probabilities(&self, features: &FeatureVector) -> ClassProbabilities {
        let x = features.as_slice();
        let mut acc = vec![0.0; self.classes.len()];
        for nodes in &self.trees {
            self.accumulate(nodes, x, &mut acc);
        }
        let n = self.trees.len() as f64;
        let pairs = self
            .classes
            .iter()
            .zip(acc)
            .map(|(label, sum)| (label.as_str(), sum / n));
        match ClassProbabilities::from_pairs(pairs) {
            Some(probabilities) => probabilities,
            None => unreachable!("validated model has at least one class"),
        }
    }
}
