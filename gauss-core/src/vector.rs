use serde::{Deserialize, Serialize};

use crate::traits::Vector;

/// Solution of `Ax = b`: index `i` holds the value of unknown `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Solution {
    values: Vec<f64>,
}

impl Solution {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Largest absolute component-wise difference, or None if the lengths differ.
    pub fn max_abs_diff(&self, other: &[f64]) -> Option<f64> {
        if self.values.len() != other.len() {
            return None;
        }
        Some(
            self.values
                .iter()
                .zip(other)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max),
        )
    }

    /// True when every component lies within `tolerance` of `other`.
    pub fn approx_eq(&self, other: &[f64], tolerance: f64) -> bool {
        self.max_abs_diff(other).is_some_and(|d| d <= tolerance)
    }
}

impl Vector for Solution {
    type Value = f64;

    fn len(&self) -> usize {
        self.values.len()
    }
}

impl From<Vec<f64>> for Solution {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}
