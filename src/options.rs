//! Option sets: flat maps of named numeric knobs
//!
//! Every layout descriptor carries a default [`LayoutOptions`]; callers pass
//! overrides which are merged on top before each run. Strategies pull typed,
//! validated values out of the merged set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};

/// Well-known option keys
pub mod keys {
    pub const ITERATIONS: &str = "iterations";
    pub const REPULSION_STRENGTH: &str = "repulsionStrength";
    pub const ATTRACTION_STRENGTH: &str = "attractionStrength";
    pub const DAMPING: &str = "damping";
    pub const MIN_ENERGY_THRESHOLD: &str = "minEnergyThreshold";
    pub const SEED: &str = "seed";
    pub const NORMALIZE_EXTENT: &str = "normalizeExtent";

    pub const AREA: &str = "area";
    pub const TEMPERATURE: &str = "temperature";
    pub const COOLING: &str = "cooling";

    pub const SPRING_CONSTANT: &str = "springConstant";
    pub const REPULSION_CONSTANT: &str = "repulsionConstant";
    pub const NATURAL_LENGTH: &str = "naturalLength";

    pub const RADIUS: &str = "radius";
    pub const HEIGHT: &str = "height";
    pub const SPACING: &str = "spacing";
    pub const RANGE: &str = "range";
    pub const LEVEL_HEIGHT: &str = "levelHeight";
    pub const NODE_SPACING: &str = "nodeSpacing";
}

// =============================================================================
// Default Constants
// =============================================================================

/// Default iteration budget for the force-directed kernel
pub const DEFAULT_ITERATIONS: f64 = 100.0;

/// Default inverse-square repulsion constant
pub const DEFAULT_REPULSION_STRENGTH: f64 = 75.0;

/// Default Hooke spring constant along edges
pub const DEFAULT_ATTRACTION_STRENGTH: f64 = 0.1;

/// Default velocity damping per iteration
pub const DEFAULT_DAMPING: f64 = 0.9;

/// Default total-force level below which the kernel stops early
pub const DEFAULT_MIN_ENERGY_THRESHOLD: f64 = 0.001;

/// Default circle radius for the circular layout
pub const DEFAULT_RADIUS: f64 = 10.0;

/// Default cell size for the grid layout
pub const DEFAULT_SPACING: f64 = 2.0;

/// Default cube edge length for the random layout
pub const DEFAULT_RANGE: f64 = 20.0;

/// Extent the supplementary simulations are scaled to after a run
pub const DEFAULT_NORMALIZE_EXTENT: f64 = 10.0;

/// A flat mapping of option names to numeric values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutOptions {
    values: BTreeMap<String, f64>,
}

impl LayoutOptions {
    /// Create an empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// These options with `overrides` layered on top
    ///
    /// Override values win; keys only present here are kept.
    pub fn merged(&self, overrides: &LayoutOptions) -> LayoutOptions {
        let mut merged = self.clone();
        for (key, value) in overrides.iter() {
            merged.set(key, value);
        }
        merged
    }

    /// A strictly positive whole number, e.g. an iteration count
    pub fn positive_count(&self, key: &str, default: f64) -> LayoutResult<usize> {
        let value = self.get_or(key, default);
        if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
            return Err(invalid_option(key, value, "a positive integer"));
        }
        Ok(value as usize)
    }

    /// A finite value that is zero or greater
    pub fn non_negative(&self, key: &str, default: f64) -> LayoutResult<f64> {
        let value = self.get_or(key, default);
        if !value.is_finite() || value < 0.0 {
            return Err(invalid_option(key, value, "finite and >= 0"));
        }
        Ok(value)
    }

    /// A finite value that is strictly greater than zero
    pub fn positive(&self, key: &str, default: f64) -> LayoutResult<f64> {
        let value = self.get_or(key, default);
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid_option(key, value, "finite and > 0"));
        }
        Ok(value)
    }

    /// A factor in `(0, 1]`
    pub fn unit_fraction(&self, key: &str, default: f64) -> LayoutResult<f64> {
        let value = self.get_or(key, default);
        if !(value > 0.0 && value <= 1.0) {
            return Err(invalid_option(key, value, "in (0, 1]"));
        }
        Ok(value)
    }

    /// Any finite value
    pub fn finite(&self, key: &str, default: f64) -> LayoutResult<f64> {
        let value = self.get_or(key, default);
        if !value.is_finite() {
            return Err(invalid_option(key, value, "finite"));
        }
        Ok(value)
    }

    /// An optional RNG seed; absent means "seed from entropy"
    pub fn seed(&self) -> LayoutResult<Option<u64>> {
        match self.get(keys::SEED) {
            None => Ok(None),
            Some(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
                Ok(Some(value as u64))
            }
            Some(value) => Err(invalid_option(keys::SEED, value, "a non-negative integer")),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for LayoutOptions {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut options = LayoutOptions::new();
        for (key, value) in iter {
            options.set(key, value);
        }
        options
    }
}

fn invalid_option(key: &str, value: f64, expected: &str) -> LayoutError {
    LayoutError::invalid(format!("option '{key}' must be {expected}, got {value}"))
}

/// Parse a `key=value` override as given on the command line
pub fn parse_assignment(text: &str) -> LayoutResult<(String, f64)> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| LayoutError::invalid(format!("expected key=value, got '{text}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(LayoutError::invalid(format!("missing option name in '{text}'")));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| LayoutError::invalid(format!("option '{key}' is not a number: '{value}'")))?;
    Ok((key.to_string(), value))
}
