//! Deterministic placement strategies
//!
//! Circular, grid, random and hierarchical layouts are cheap enough to run on
//! the caller's thread. Each is a pure function from a snapshot (plus options)
//! to a new snapshot; identifiers and order are preserved.

use std::collections::{BTreeMap, VecDeque};
use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::LayoutResult;
use crate::options::{DEFAULT_RADIUS, DEFAULT_RANGE, DEFAULT_SPACING, LayoutOptions, keys};
use crate::types::{EdgeRef, NodePosition, Vec3};

/// Place nodes evenly on a circle in the XZ-plane
///
/// Node `k` of `n` sits at angle `2πk/n`. A single node is placed on the
/// axis at the configured height.
pub fn circular(
    nodes: &[NodePosition],
    _edges: &[EdgeRef],
    options: &LayoutOptions,
) -> LayoutResult<Vec<NodePosition>> {
    let radius = options.non_negative(keys::RADIUS, DEFAULT_RADIUS)?;
    let height = options.finite(keys::HEIGHT, 0.0)?;

    let n = nodes.len();
    if n == 1 {
        return Ok(vec![nodes[0].moved_to(Vec3::new(0.0, height, 0.0))]);
    }

    let angle_step = 2.0 * PI / n.max(1) as f64;
    Ok(nodes
        .iter()
        .enumerate()
        .map(|(k, node)| {
            let angle = k as f64 * angle_step;
            node.moved_to(Vec3::new(
                radius * angle.cos(),
                height,
                radius * angle.sin(),
            ))
        })
        .collect())
}

/// Arrange nodes row by row in a square grid centered on the origin
pub fn grid(
    nodes: &[NodePosition],
    _edges: &[EdgeRef],
    options: &LayoutOptions,
) -> LayoutResult<Vec<NodePosition>> {
    let spacing = options.non_negative(keys::SPACING, DEFAULT_SPACING)?;
    let height = options.finite(keys::HEIGHT, 0.0)?;

    let n = nodes.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let side = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(side);
    let col_offset = (side - 1) as f64 / 2.0;
    let row_offset = (rows - 1) as f64 / 2.0;

    Ok(nodes
        .iter()
        .enumerate()
        .map(|(k, node)| {
            let row = (k / side) as f64;
            let col = (k % side) as f64;
            node.moved_to(Vec3::new(
                (col - col_offset) * spacing,
                height,
                (row - row_offset) * spacing,
            ))
        })
        .collect())
}

/// Scatter nodes uniformly in a box above the ground plane
///
/// X and Z fall in `[-range/2, range/2]`, Y in `[0, range/2]`. Without a
/// `seed` option every call yields a different arrangement.
pub fn random(
    nodes: &[NodePosition],
    _edges: &[EdgeRef],
    options: &LayoutOptions,
) -> LayoutResult<Vec<NodePosition>> {
    let range = options.non_negative(keys::RANGE, DEFAULT_RANGE)?;
    let mut rng = match options.seed()? {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let half = range / 2.0;
    Ok(nodes
        .iter()
        .map(|node| {
            node.moved_to(Vec3::new(
                rng.gen_range(-half..=half),
                rng.gen_range(0.0..=half),
                rng.gen_range(-half..=half),
            ))
        })
        .collect())
}

/// Stack nodes in levels by breadth-first distance from the roots
///
/// Roots are nodes without incoming edges. Nodes not reachable from any root
/// stay on the top level. Each level is spread along X and centered on 0; the
/// top level sits highest.
pub fn hierarchical(
    nodes: &[NodePosition],
    edges: &[EdgeRef],
    options: &LayoutOptions,
) -> LayoutResult<Vec<NodePosition>> {
    let level_height = options.finite(keys::LEVEL_HEIGHT, 3.0)?;
    let node_spacing = options.non_negative(keys::NODE_SPACING, 2.0)?;

    let levels = node_levels(nodes.len(), edges);
    let max_level = levels.iter().copied().max().unwrap_or(0);

    let mut by_level: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, level) in levels.iter().enumerate() {
        by_level.entry(*level).or_default().push(index);
    }

    let mut positions = vec![Vec3::ZERO; nodes.len()];
    for (level, members) in &by_level {
        let total_width = (members.len() - 1) as f64 * node_spacing;
        let y = (max_level - level) as f64 * level_height;
        for (slot, index) in members.iter().enumerate() {
            positions[*index] = Vec3::new(slot as f64 * node_spacing - total_width / 2.0, y, 0.0);
        }
    }

    Ok(nodes
        .iter()
        .zip(positions)
        .map(|(node, position)| node.moved_to(position))
        .collect())
}

/// Breadth-first level of every node, starting from nodes with no incoming edge
fn node_levels(node_count: usize, edges: &[EdgeRef]) -> Vec<usize> {
    let mut adjacency = vec![Vec::new(); node_count];
    let mut incoming = vec![0usize; node_count];
    for edge in edges.iter().filter(|e| e.is_within(node_count)) {
        adjacency[edge.source].push(edge.target);
        incoming[edge.target] += 1;
    }

    let mut levels = vec![0usize; node_count];
    let mut visited = vec![false; node_count];
    let mut queue: VecDeque<(usize, usize)> = (0..node_count)
        .filter(|&i| incoming[i] == 0)
        .map(|i| (i, 0))
        .collect();

    while let Some((index, level)) = queue.pop_front() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        levels[index] = level;
        for &next in &adjacency[index] {
            if !visited[next] {
                queue.push_back((next, level + 1));
            }
        }
    }

    levels
}

/// Recenter positions on the origin and scale the widest axis to `max_extent`
///
/// A snapshot with zero extent (all nodes coincident) is only recentered.
pub fn normalize_positions(positions: &mut [NodePosition], max_extent: f64) {
    let Some(first) = positions.first() else {
        return;
    };

    let mut min = first.position();
    let mut max = first.position();
    for p in positions.iter() {
        min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
        max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
    }

    let extent = max - min;
    let current = extent.x.max(extent.y).max(extent.z);
    let scale = if current > 0.0 {
        max_extent / current
    } else {
        1.0
    };
    let center = (min + max) * 0.5;

    for p in positions.iter_mut() {
        let moved = (p.position() - center) * scale;
        p.x = moved.x;
        p.y = moved.y;
        p.z = moved.z;
    }
}
