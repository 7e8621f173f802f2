// SPDX-License-Identifier: Apache-2.0
//! Transfer function: scalar values to color and opacity.

use serde::{Deserialize, Serialize};

/// Lookup table mapping scalar simulation values to color/opacity.
///
/// Carries its own modified flag; commit re-uploads it to the backend only
/// when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TransferFunction {
    /// RGBA control points, evenly spaced over `value_range`.
    pub diffuse: Vec<[f32; 4]>,
    /// Scalar range the table spans.
    pub value_range: [f32; 2],
    #[serde(skip)]
    modified: bool,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            // black→white ramp, fully opaque
            diffuse: vec![[0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0]],
            value_range: [0.0, 1.0],
            modified: false,
        }
    }
}

impl TransferFunction {
    /// Replace the whole table and mark modified.
    pub fn set(&mut self, diffuse: Vec<[f32; 4]>, value_range: [f32; 2]) {
        self.diffuse = diffuse;
        self.value_range = value_range;
        self.modified = true;
    }

    /// Mark modified (e.g. after deserializing a remote update in place).
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Whether the table changed since the last commit.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clear the modified flag after the backend consumed the table.
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Opacity values extracted from the control points.
    pub fn opacities(&self) -> Vec<f32> {
        self.diffuse.iter().map(|c| c[3]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_marks_modified() {
        let mut tf = TransferFunction::default();
        assert!(!tf.is_modified());
        tf.set(vec![[1.0, 0.0, 0.0, 0.5]], [0.0, 10.0]);
        assert!(tf.is_modified());
        assert_eq!(tf.opacities(), vec![0.5]);
        tf.clear_modified();
        assert!(!tf.is_modified());
    }

    #[test]
    fn modified_flag_is_not_serialized() {
        let mut tf = TransferFunction::default();
        tf.mark_modified();
        let value = serde_json::to_value(&tf).expect("encode");
        assert!(value.get("modified").is_none());
        let back: TransferFunction = serde_json::from_value(value).expect("decode");
        assert!(!back.is_modified());
    }
}
