//! Pure vector math for similarity computation.
//!
//! All functions operate on `f64` slices. When operand lengths differ the
//! shorter side is treated as zero-padded; the collection boundary rejects
//! mismatched dimensions before they reach this layer, so padding only
//! matters for direct library use.
//!
//! [`Metric`] unifies the three supported similarity measures behind a
//! single `score` function where **higher is always better** — Euclidean
//! distance is negated.

use serde::{Deserialize, Serialize};

/// Dot product of two vectors. Missing components are treated as zero.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let mut sum = 0.0f64;
    for i in 0..n {
        sum += a[i] * b[i];
    }
    sum
}

/// L2 magnitude (Euclidean norm) of a vector.
pub fn magnitude(a: &[f64]) -> f64 {
    let mut sum = 0.0f64;
    for &x in a {
        sum += x * x;
    }
    sum.sqrt()
}

/// Cosine similarity in `[-1, 1]`. Returns 0 when either magnitude is zero.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let ma = magnitude(a);
    let mb = magnitude(b);
    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (ma * mb)
}

/// Euclidean (L2) distance. Missing components are treated as zero.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().max(b.len());
    let mut sum = 0.0f64;
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0.0);
        let y = b.get(i).copied().unwrap_or(0.0);
        let d = x - y;
        sum += d * d;
    }
    sum.sqrt()
}

/// Unit-normalize a vector. Returns the input unchanged when its magnitude is zero.
pub fn normalize(a: &[f64]) -> Vec<f64> {
    let m = magnitude(a);
    if m == 0.0 {
        return a.to_vec();
    }
    a.iter().map(|x| x / m).collect()
}

/// Similarity metric used for vector scoring.
///
/// All metrics score through [`Metric::score`], where **higher is better**:
/// cosine and dot return the raw similarity, Euclidean returns the negated
/// distance so result ordering is uniform across metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity. Range: `[-1, 1]`.
    Cosine,
    /// Negated Euclidean distance. Range: `(-∞, 0]`.
    Euclidean,
    /// Raw dot product. Unbounded.
    Dot,
}

impl Metric {
    /// Score two vectors under this metric. Higher is better.
    pub fn score(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Cosine => cosine(a, b),
            Metric::Euclidean => -euclidean(a, b),
            Metric::Dot => dot(a, b),
        }
    }

    /// Lowercase wire name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Dot => "dot",
        }
    }
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            "dot" => Ok(Metric::Dot),
            other => Err(format!("unrecognized metric '{other}'")),
        }
    }
}
