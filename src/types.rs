//! Data model shared by every layout strategy
//!
//! Layouts consume a snapshot of [`NodePosition`]s plus [`EdgeRef`] index
//! pairs and produce a fresh snapshot. Nothing here holds references into the
//! caller's graph.

use std::collections::{HashMap, HashSet};
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};

/// A 3D vector in double precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Linear interpolation, `t = 0` yields `self`, `t = 1` yields `other`
    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        self + (other - self) * t
    }

    /// Unit direction for sample `index` of `total` on a Fibonacci sphere
    ///
    /// Used wherever a well-spread, reproducible direction is needed without
    /// consulting an RNG.
    pub fn fibonacci_direction(index: usize, total: usize) -> Vec3 {
        let golden_ratio = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let i = index as f64;
        let n = total.max(1) as f64;

        let theta = 2.0 * std::f64::consts::PI * i / golden_ratio;
        let phi = (1.0 - 2.0 * ((i % n) + 0.5) / n).acos();

        Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

/// A node's identifier and its position in 3D space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    /// Stable identifier, unique within one snapshot
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl NodePosition {
    pub fn new(id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            z,
        }
    }

    /// A node without a prior position (every coordinate zero, so all three get seeded)
    pub fn unplaced(id: impl Into<String>) -> Self {
        Self::new(id, 0.0, 0.0, 0.0)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Same identifier, new coordinates
    pub fn moved_to(&self, position: Vec3) -> Self {
        Self::new(self.id.clone(), position.x, position.y, position.z)
    }
}

/// An edge between two nodes, given as indices into the node slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub source: usize,
    pub target: usize,
}

impl EdgeRef {
    pub fn new(source: usize, target: usize) -> Self {
        Self { source, target }
    }

    /// Both endpoints fall inside `[0, node_count)`
    pub fn is_within(&self, node_count: usize) -> bool {
        self.source < node_count && self.target < node_count
    }
}

/// Map identifier-based edges onto node indices
///
/// Pairs naming an unknown node are dropped.
pub fn index_edges<S: AsRef<str>>(nodes: &[NodePosition], pairs: &[(S, S)]) -> Vec<EdgeRef> {
    let node_id_to_index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    pairs
        .iter()
        .filter_map(|(source, target)| {
            let source = node_id_to_index.get(source.as_ref())?;
            let target = node_id_to_index.get(target.as_ref())?;
            Some(EdgeRef::new(*source, *target))
        })
        .collect()
}

/// Reject snapshots no layout can work with
///
/// Coordinates must be finite and identifiers unique.
pub fn validate_nodes(nodes: &[NodePosition]) -> LayoutResult<()> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        if !node.position().is_finite() {
            return Err(LayoutError::invalid(format!(
                "node '{}' at index {index} has a non-finite coordinate",
                node.id
            )));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(LayoutError::invalid(format!(
                "duplicate node id '{}' at index {index}",
                node.id
            )));
        }
    }
    Ok(())
}
