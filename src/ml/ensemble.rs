//! Gradient-boosted tree ensemble loaded from a LightGBM `dump_model()` JSON
//! artifact. Only binary objectives with numerical `<=` splits are accepted.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::core::features::FEATURE_NAMES;
use crate::core::hash::sha256_hex;
use crate::ml::{Classifier, ModelError};

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default = "default_num_class")]
    num_class: usize,
    objective: String,
    feature_names: Vec<String>,
    tree_info: Vec<RawTree>,
}

fn default_num_class() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct RawTree {
    tree_structure: RawNode,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNode {
    Split {
        split_feature: usize,
        threshold: f64,
        #[serde(default = "default_decision_type")]
        decision_type: String,
        #[serde(default = "default_missing_type")]
        missing_type: String,
        #[serde(default)]
        internal_count: f64,
        left_child: Box<RawNode>,
        right_child: Box<RawNode>,
    },
    Leaf {
        leaf_value: f64,
        #[serde(default)]
        leaf_count: f64,
    },
}

fn default_decision_type() -> String {
    "<=".to_string()
}

fn default_missing_type() -> String {
    "None".to_string()
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub(crate) fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// One regression tree flattened into an arena; the root is node 0.
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    pub(crate) nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(raw: &RawNode, num_features: usize) -> Result<Self, ModelError> {
        let mut nodes = Vec::new();
        flatten(raw, num_features, &mut nodes)?;
        Ok(Self { nodes })
    }

    pub(crate) fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Cover-weighted mean of the leaves.
    pub(crate) fn expected_value(&self) -> f64 {
        self.conditional_expectation(0, &[], 0)
    }

    /// Expected output when only the features in `known` (bitmask) are fixed to
    /// their values in `x`; unknown splits are averaged by child cover.
    pub(crate) fn conditional_expectation(&self, idx: usize, x: &[f64], known: u32) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf { value, .. } => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if known & (1 << feature) != 0 {
                    let next = if x[*feature] <= *threshold { *left } else { *right };
                    return self.conditional_expectation(next, x, known);
                }
                let left_cover = self.nodes[*left].cover();
                let right_cover = self.nodes[*right].cover();
                let total = left_cover + right_cover;
                let (wl, wr) = if total > 0.0 {
                    (left_cover / total, right_cover / total)
                } else {
                    (0.5, 0.5)
                };
                wl * self.conditional_expectation(*left, x, known)
                    + wr * self.conditional_expectation(*right, x, known)
            }
        }
    }
}

fn flatten(raw: &RawNode, num_features: usize, nodes: &mut Vec<Node>) -> Result<usize, ModelError> {
    let idx = nodes.len();
    match raw {
        RawNode::Leaf {
            leaf_value,
            leaf_count,
        } => {
            if !leaf_value.is_finite() {
                return Err(ModelError::Format("non-finite leaf value".into()));
            }
            nodes.push(Node::Leaf {
                value: *leaf_value,
                cover: *leaf_count,
            });
        }
        RawNode::Split {
            split_feature,
            threshold,
            decision_type,
            missing_type,
            internal_count,
            left_child,
            right_child,
        } => {
            if *split_feature >= num_features {
                return Err(ModelError::Format(format!(
                    "split on feature {} but model has {} features",
                    split_feature, num_features
                )));
            }
            if decision_type != "<=" {
                return Err(ModelError::Unsupported(format!(
                    "decision type '{}'",
                    decision_type
                )));
            }
            // NaN routing never applies: non-finite inputs are rejected before traversal.
            // Zero-as-missing would route zeros by `default_left`, which is not modelled.
            if missing_type != "None" && missing_type != "NaN" {
                return Err(ModelError::Unsupported(format!(
                    "missing value handling '{}'",
                    missing_type
                )));
            }
            // placeholder, patched once both children have indices
            nodes.push(Node::Leaf {
                value: 0.0,
                cover: 0.0,
            });
            let left = flatten(left_child, num_features, nodes)?;
            let right = flatten(right_child, num_features, nodes)?;
            let cover = if *internal_count > 0.0 {
                *internal_count
            } else {
                nodes[left].cover() + nodes[right].cover()
            };
            nodes[idx] = Node::Split {
                feature: *split_feature,
                threshold: *threshold,
                left,
                right,
                cover,
            };
        }
    }
    Ok(idx)
}

#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    feature_names: Vec<String>,
    sigmoid: f64,
    digest: String,
}

impl TreeEnsemble {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path)
            .map_err(|e| ModelError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        let raw: RawModel =
            serde_json::from_slice(bytes).map_err(|e| ModelError::Format(e.to_string()))?;

        if raw.num_class != 1 {
            return Err(ModelError::Unsupported(format!(
                "{} output classes; expected a binary model",
                raw.num_class
            )));
        }
        let sigmoid = parse_sigmoid(&raw.objective)?;

        if raw.feature_names.len() != FEATURE_NAMES.len()
            || raw
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .any(|(have, want)| have != want)
        {
            return Err(ModelError::Format(format!(
                "feature schema mismatch: artifact has [{}], extractor produces [{}]",
                raw.feature_names.join(", "),
                FEATURE_NAMES.join(", ")
            )));
        }
        if raw.tree_info.is_empty() {
            return Err(ModelError::Format("model contains no trees".into()));
        }

        let num_features = raw.feature_names.len();
        let trees = raw
            .tree_info
            .iter()
            .map(|t| Tree::from_raw(&t.tree_structure, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            feature_names: raw.feature_names,
            sigmoid,
            digest: sha256_hex(bytes),
        })
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// SHA-256 of the artifact bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub(crate) fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Raw boosted score (log-odds) before the sigmoid link.
    pub fn margin(&self, features: &[f64]) -> Result<f64, ModelError> {
        self.check_input(features)?;
        Ok(self.trees.iter().map(|t| t.predict(features)).sum())
    }

    pub(crate) fn check_input(&self, features: &[f64]) -> Result<(), ModelError> {
        if features.len() != self.num_features() {
            return Err(ModelError::Shape {
                expected: self.num_features(),
                actual: features.len(),
            });
        }
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::Numeric(format!(
                "feature '{}' is not finite",
                self.feature_names[pos]
            )));
        }
        Ok(())
    }
}

impl Classifier for TreeEnsemble {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        let margin = self.margin(features)?;
        let prob = 1.0 / (1.0 + (-self.sigmoid * margin).exp());
        if prob.is_finite() {
            Ok(prob)
        } else {
            Err(ModelError::Numeric(format!("sigmoid of margin {} overflowed", margin)))
        }
    }
}

fn parse_sigmoid(objective: &str) -> Result<f64, ModelError> {
    let mut parts = objective.split_whitespace();
    if parts.next() != Some("binary") {
        return Err(ModelError::Unsupported(format!("objective '{}'", objective)));
    }
    for part in parts {
        if let Some(value) = part.strip_prefix("sigmoid:") {
            return value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| ModelError::Format(format!("bad sigmoid parameter '{}'", value)));
        }
    }
    Ok(1.0)
}
