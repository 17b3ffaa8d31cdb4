//! Numeric layout kernels
//!
//! Iterative physical simulations that turn graph connectivity into 3D
//! positions. They are CPU-bound (O(n²) per iteration for the all-pairs
//! repulsion) and are normally run on the execution host's worker thread
//! rather than on the caller's thread.
//!
//! # Simulations
//!
//! - **Force-directed**: inverse-square repulsion between all nodes, Hooke
//!   springs along edges, damped velocity integration and an energy-based
//!   early exit
//! - **Fruchterman-Reingold**: displacement capped by a cooling temperature
//! - **Spring embedder**: springs with a natural length, no velocity memory
//!
//! # Example
//!
//! ```rust
//! use netlayout::kernel::{self, Algorithm};
//! use netlayout::{EdgeRef, LayoutOptions, NodePosition};
//!
//! let nodes = vec![
//!     NodePosition::new("a", 1.0, 0.5, 0.2),
//!     NodePosition::new("b", -1.0, -0.5, 0.3),
//! ];
//! let edges = vec![EdgeRef::new(0, 1)];
//!
//! let report = kernel::run(Algorithm::ForceDirected, &nodes, &edges, &LayoutOptions::new())
//!     .unwrap();
//! assert_eq!(report.positions.len(), 2);
//! ```

mod force;
mod fruchterman;
mod spring;

use std::fmt;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};
use crate::options::LayoutOptions;
use crate::types::{EdgeRef, NodePosition, Vec3, validate_nodes};

pub use force::{ForceConfig, ForceSimulation};
pub use fruchterman::FruchtermanConfig;
pub use spring::SpringConfig;

/// Floor applied to pairwise distances so forces stay bounded
pub const DISTANCE_EPSILON: f64 = 0.01;

/// Edge length of the cube zero coordinates are seeded in, centered at the origin
pub const SEED_CUBE_SIZE: f64 = 10.0;

/// Number of Fibonacci-sphere samples used to separate coincident nodes
const FALLBACK_DIRECTIONS: usize = 64;

/// The simulations the execution host knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    ForceDirected,
    FruchtermanReingold,
    SpringEmbedder,
}

impl Algorithm {
    /// Layout identifier this algorithm is registered under by default
    pub fn id(&self) -> &'static str {
        match self {
            Algorithm::ForceDirected => "force-directed",
            Algorithm::FruchtermanReingold => "fruchterman-reingold",
            Algorithm::SpringEmbedder => "spring-embedder",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// How a simulation run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    /// Iterations actually executed
    pub iterations: usize,
    /// Whether the run stopped early because it settled
    pub converged: bool,
    /// Total force (or movement) measured in the last iteration
    pub energy: f64,
}

/// Result of one kernel run
#[derive(Debug, Clone, PartialEq)]
pub struct KernelReport {
    /// Final positions, same order and identifiers as the input
    pub positions: Vec<NodePosition>,
    pub iterations: usize,
    pub converged: bool,
    pub energy: f64,
    /// Edges ignored because an endpoint was out of range
    pub skipped_edges: usize,
}

impl KernelReport {
    fn empty(skipped_edges: usize) -> Self {
        Self {
            positions: Vec::new(),
            iterations: 0,
            converged: true,
            energy: 0.0,
            skipped_edges,
        }
    }
}

/// Run `algorithm` over a snapshot
///
/// Nodes and options are validated before any computation starts. Out-of-range edges
/// are skipped and counted. A run whose output contains a non-finite
/// coordinate is reported as [`LayoutError::ExecutionFailure`].
pub fn run(
    algorithm: Algorithm,
    nodes: &[NodePosition],
    edges: &[EdgeRef],
    options: &LayoutOptions,
) -> LayoutResult<KernelReport> {
    let started = Instant::now();
    validate_nodes(nodes)?;
    let (edges, skipped_edges) = valid_edges(edges, nodes.len());
    if skipped_edges > 0 {
        tracing::warn!(
            %algorithm,
            skipped_edges,
            node_count = nodes.len(),
            "ignoring edges with out-of-range endpoints"
        );
    }

    let seed = options.seed()?;
    let simulation = Simulation::configure(algorithm, options)?;

    if nodes.is_empty() {
        return Ok(KernelReport::empty(skipped_edges));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let initial = seed_positions(nodes, &mut rng);

    let (positions, convergence) = simulation.run(initial, &edges);

    tracing::debug!(
        %algorithm,
        node_count = nodes.len(),
        edge_count = edges.len(),
        iterations = convergence.iterations,
        converged = convergence.converged,
        energy = convergence.energy,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "kernel run finished"
    );

    let positions = nodes
        .iter()
        .zip(&positions)
        .map(|(node, position)| {
            if position.is_finite() {
                Ok(node.moved_to(*position))
            } else {
                Err(LayoutError::execution(format!(
                    "node '{}' reached a non-finite position after {} iterations",
                    node.id, convergence.iterations
                )))
            }
        })
        .collect::<LayoutResult<Vec<_>>>()?;

    Ok(KernelReport {
        positions,
        iterations: convergence.iterations,
        converged: convergence.converged,
        energy: convergence.energy,
        skipped_edges,
    })
}

/// A validated simulation, ready to run
enum Simulation {
    Force(ForceConfig),
    Fruchterman(FruchtermanConfig),
    Spring(SpringConfig),
}

impl Simulation {
    fn configure(algorithm: Algorithm, options: &LayoutOptions) -> LayoutResult<Self> {
        Ok(match algorithm {
            Algorithm::ForceDirected => Simulation::Force(ForceConfig::from_options(options)?),
            Algorithm::FruchtermanReingold => {
                Simulation::Fruchterman(FruchtermanConfig::from_options(options)?)
            }
            Algorithm::SpringEmbedder => Simulation::Spring(SpringConfig::from_options(options)?),
        })
    }

    fn run(self, positions: Vec<Vec3>, edges: &[EdgeRef]) -> (Vec<Vec3>, Convergence) {
        match self {
            Simulation::Force(config) => {
                let mut sim = ForceSimulation::new(positions, edges.to_vec(), config);
                let convergence = sim.run_to_convergence();
                (sim.into_positions(), convergence)
            }
            Simulation::Fruchterman(config) => fruchterman::simulate(positions, edges, &config),
            Simulation::Spring(config) => spring::simulate(positions, edges, &config),
        }
    }
}

/// Split off edges whose endpoints are out of range; returns the kept edges and the skip count
fn valid_edges(edges: &[EdgeRef], node_count: usize) -> (Vec<EdgeRef>, usize) {
    let kept: Vec<EdgeRef> = edges
        .iter()
        .copied()
        .filter(|e| e.is_within(node_count))
        .collect();
    let skipped = edges.len() - kept.len();
    (kept, skipped)
}

/// Initial positions: prior coordinates where present, a random offset in
/// the seed cube for every coordinate that is exactly zero
///
/// Coordinates are seeded one by one, so a flat layout (all `y == 0`) gains
/// depth before the simulation starts.
pub fn seed_positions<R: Rng>(nodes: &[NodePosition], rng: &mut R) -> Vec<Vec3> {
    let half = SEED_CUBE_SIZE / 2.0;
    let mut seed = |c: f64| {
        if c == 0.0 {
            rng.gen_range(-half..half)
        } else {
            c
        }
    };
    nodes
        .iter()
        .map(|node| Vec3::new(seed(node.x), seed(node.y), seed(node.z)))
        .collect()
}

/// Unit vector pointing from `b` to `a` and their floored distance
///
/// Coincident points get a reproducible direction derived from `pair`, so
/// repulsion can still push them apart.
fn separation(a: Vec3, b: Vec3, pair: usize) -> (Vec3, f64) {
    let delta = a - b;
    let raw = delta.length();
    let direction = if raw > 0.0 {
        delta * (1.0 / raw)
    } else {
        Vec3::fibonacci_direction(pair, FALLBACK_DIRECTIONS)
    };
    (direction, raw.max(DISTANCE_EPSILON))
}

/// Like [`separation`] but yields nothing for coincident points
///
/// Springs between coincident endpoints have no direction to pull along.
fn spring_axis(a: Vec3, b: Vec3) -> Option<(Vec3, f64)> {
    let delta = a - b;
    let raw = delta.length();
    (raw > 0.0).then(|| (delta * (1.0 / raw), raw.max(DISTANCE_EPSILON)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::keys;

    fn seeded(seed: u64) -> LayoutOptions {
        LayoutOptions::new().with(keys::SEED, seed as f64)
    }

    #[test]
    fn algorithm_ids_round_trip_through_serde() {
        let json = serde_json::to_string(&Algorithm::FruchtermanReingold).unwrap();
        assert_eq!(json, "\"fruchterman-reingold\"");
        assert_eq!(Algorithm::ForceDirected.to_string(), "force-directed");
    }

    #[test]
    fn seed_positions_keeps_prior_coordinates() {
        let nodes = vec![
            NodePosition::new("placed", 1.0, 2.0, 3.0),
            NodePosition::unplaced("fresh"),
            NodePosition::new("flat", 4.0, 0.0, -2.0),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let positions = seed_positions(&nodes, &mut rng);

        assert_eq!(positions[0], Vec3::new(1.0, 2.0, 3.0));
        let half = SEED_CUBE_SIZE / 2.0;
        for c in [positions[1].x, positions[1].y, positions[1].z] {
            assert!((-half..half).contains(&c));
        }

        // Only the zero coordinate is replaced
        assert_eq!(positions[2].x, 4.0);
        assert_eq!(positions[2].z, -2.0);
        assert_ne!(positions[2].y, 0.0);
        assert!((-half..half).contains(&positions[2].y));
    }

    #[test]
    fn flat_input_gains_depth() {
        // A 2x3 grid in the XZ-plane, connected as a chain
        let nodes: Vec<NodePosition> = (0..6)
            .map(|k| {
                let (row, col) = ((k / 3) as f64, (k % 3) as f64);
                NodePosition::new(format!("n{k}"), col * 2.0 - 2.0, 0.0, row * 2.0 - 1.0)
            })
            .collect();
        let edges: Vec<EdgeRef> = (1..6).map(|i| EdgeRef::new(i - 1, i)).collect();

        let report = run(Algorithm::ForceDirected, &nodes, &edges, &seeded(1)).unwrap();

        assert!(report.positions.iter().any(|p| p.y.abs() > 1e-6));
    }

    #[test]
    fn separation_handles_coincident_points() {
        let p = Vec3::new(1.0, 1.0, 1.0);
        let (dir, dist) = separation(p, p, 3);
        assert!((dir.length() - 1.0).abs() < 1e-9);
        assert_eq!(dist, DISTANCE_EPSILON);
        assert!(spring_axis(p, p).is_none());
    }

    #[test]
    fn empty_input_yields_empty_report() {
        for algorithm in [
            Algorithm::ForceDirected,
            Algorithm::FruchtermanReingold,
            Algorithm::SpringEmbedder,
        ] {
            let report = run(algorithm, &[], &[], &LayoutOptions::new()).unwrap();
            assert!(report.positions.is_empty());
        }
    }

    #[test]
    fn invalid_options_fail_before_running() {
        let nodes = vec![NodePosition::new("a", 1.0, 0.0, 0.0)];
        let opts = LayoutOptions::new().with(keys::DAMPING, 0.0);
        let err = run(Algorithm::ForceDirected, &nodes, &[], &opts).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidInput(_)));

        let opts = LayoutOptions::new().with(keys::SEED, 1.5);
        assert!(run(Algorithm::ForceDirected, &nodes, &[], &opts).is_err());
    }

    #[test]
    fn unplaced_nodes_are_reproducible_with_a_seed() {
        let nodes: Vec<NodePosition> = (0..5)
            .map(|i| NodePosition::unplaced(format!("n{i}")))
            .collect();
        let edges = vec![EdgeRef::new(0, 1), EdgeRef::new(2, 3)];

        let a = run(Algorithm::ForceDirected, &nodes, &edges, &seeded(9)).unwrap();
        let b = run(Algorithm::ForceDirected, &nodes, &edges, &seeded(9)).unwrap();
        assert_eq!(a.positions, b.positions);
    }

    #[test]
    fn out_of_range_edges_are_counted_not_fatal() {
        let nodes = vec![
            NodePosition::new("a", 1.0, 0.0, 0.0),
            NodePosition::new("b", -1.0, 0.0, 0.0),
        ];
        let edges = vec![EdgeRef::new(0, 1), EdgeRef::new(0, 2), EdgeRef::new(5, 1)];

        for algorithm in [
            Algorithm::ForceDirected,
            Algorithm::FruchtermanReingold,
            Algorithm::SpringEmbedder,
        ] {
            let report = run(algorithm, &nodes, &edges, &LayoutOptions::new()).unwrap();
            assert_eq!(report.skipped_edges, 2, "{algorithm}");
            assert_eq!(report.positions.len(), 2);
        }
    }

    #[test]
    fn supplementary_simulations_are_deterministic() {
        let nodes = vec![
            NodePosition::new("a", 1.0, 0.3, 0.5),
            NodePosition::new("b", 0.4, 1.0, -0.5),
            NodePosition::new("c", -1.0, 0.2, 0.1),
        ];
        let edges = vec![EdgeRef::new(0, 1), EdgeRef::new(1, 2)];

        for algorithm in [Algorithm::FruchtermanReingold, Algorithm::SpringEmbedder] {
            let a = run(algorithm, &nodes, &edges, &LayoutOptions::new()).unwrap();
            let b = run(algorithm, &nodes, &edges, &LayoutOptions::new()).unwrap();
            assert_eq!(a.positions, b.positions, "{algorithm}");
            assert!(a.positions.iter().all(|p| p.position().is_finite()));
        }
    }

    #[test]
    fn report_preserves_identifiers_and_order() {
        let nodes = vec![
            NodePosition::new("first", 3.0, 0.0, 0.0),
            NodePosition::new("second", -3.0, 0.0, 0.0),
        ];
        let report = run(
            Algorithm::ForceDirected,
            &nodes,
            &[EdgeRef::new(0, 1)],
            &LayoutOptions::new(),
        )
        .unwrap();
        let ids: Vec<&str> = report.positions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
    }
}
