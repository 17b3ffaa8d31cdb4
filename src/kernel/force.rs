//! Force-directed simulation
//!
//! Nodes are charged particles that repel with an inverse-square law and
//! edges are springs pulling their endpoints together. Velocities are damped
//! every iteration and the run stops once the total force falls under the
//! energy threshold.

use super::{Convergence, DISTANCE_EPSILON, separation, spring_axis};
use crate::error::LayoutResult;
use crate::options::{
    DEFAULT_ATTRACTION_STRENGTH, DEFAULT_DAMPING, DEFAULT_ITERATIONS,
    DEFAULT_MIN_ENERGY_THRESHOLD, DEFAULT_REPULSION_STRENGTH, LayoutOptions, keys,
};
use crate::types::{EdgeRef, Vec3};

/// Configuration for the force-directed simulation
#[derive(Debug, Clone, PartialEq)]
pub struct ForceConfig {
    /// Upper bound on iterations
    pub iterations: usize,
    /// Inverse-square repulsion constant
    pub repulsion_strength: f64,
    /// Spring constant along edges
    pub attraction_strength: f64,
    /// Velocity retained per iteration, in (0, 1]
    pub damping: f64,
    /// Total force below which the run counts as settled
    pub min_energy_threshold: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS as usize,
            repulsion_strength: DEFAULT_REPULSION_STRENGTH,
            attraction_strength: DEFAULT_ATTRACTION_STRENGTH,
            damping: DEFAULT_DAMPING,
            min_energy_threshold: DEFAULT_MIN_ENERGY_THRESHOLD,
        }
    }
}

impl ForceConfig {
    /// Read and validate the force-directed knobs from an option set
    pub fn from_options(options: &LayoutOptions) -> LayoutResult<Self> {
        Ok(Self {
            iterations: options.positive_count(keys::ITERATIONS, DEFAULT_ITERATIONS)?,
            repulsion_strength: options
                .non_negative(keys::REPULSION_STRENGTH, DEFAULT_REPULSION_STRENGTH)?,
            attraction_strength: options
                .non_negative(keys::ATTRACTION_STRENGTH, DEFAULT_ATTRACTION_STRENGTH)?,
            damping: options.unit_fraction(keys::DAMPING, DEFAULT_DAMPING)?,
            min_energy_threshold: options
                .non_negative(keys::MIN_ENERGY_THRESHOLD, DEFAULT_MIN_ENERGY_THRESHOLD)?,
        })
    }
}

/// CPU force simulation over a fixed set of nodes
pub struct ForceSimulation {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    forces: Vec<Vec3>,
    edges: Vec<EdgeRef>,
    config: ForceConfig,
}

impl ForceSimulation {
    /// Create a simulation; every edge must reference an index below `positions.len()`
    pub fn new(positions: Vec<Vec3>, edges: Vec<EdgeRef>, config: ForceConfig) -> Self {
        let n = positions.len();
        debug_assert!(edges.iter().all(|e| e.is_within(n)));
        Self {
            positions,
            velocities: vec![Vec3::ZERO; n],
            forces: vec![Vec3::ZERO; n],
            edges,
            config,
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<Vec3> {
        self.positions
    }

    /// Run one iteration and return the total force magnitude it applied
    pub fn tick(&mut self) -> f64 {
        self.forces.fill(Vec3::ZERO);

        let mut energy = self.apply_repulsion();
        energy += self.apply_attraction();

        let damping = self.config.damping;
        for ((position, velocity), force) in self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(&self.forces)
        {
            *velocity = (*velocity + *force) * damping;
            *position += *velocity;
        }

        energy
    }

    /// Inverse-square repulsion between every unordered pair
    fn apply_repulsion(&mut self) -> f64 {
        let n = self.positions.len();
        let strength = self.config.repulsion_strength;
        let mut energy = 0.0;

        for i in 0..n {
            for j in (i + 1)..n {
                let (direction, distance) =
                    separation(self.positions[i], self.positions[j], i * n + j);

                // Coulomb's law: F = k / r^2
                let magnitude = strength / (distance * distance);
                let push = direction * magnitude;

                self.forces[i] += push;
                self.forces[j] -= push;
                energy += magnitude.abs();
            }
        }

        energy
    }

    /// Hooke springs along every edge
    fn apply_attraction(&mut self) -> f64 {
        let strength = self.config.attraction_strength;
        let mut energy = 0.0;

        for edge in &self.edges {
            let (source, target) = (edge.source, edge.target);
            let Some((direction, distance)) =
                spring_axis(self.positions[source], self.positions[target])
            else {
                // Coincident endpoints: no direction, but the floored spring still counts
                energy += strength * DISTANCE_EPSILON;
                continue;
            };

            // Hooke's law: F = k * x
            let magnitude = strength * distance;
            let pull = direction * magnitude;

            self.forces[source] -= pull;
            self.forces[target] += pull;
            energy += magnitude.abs();
        }

        energy
    }

    /// Iterate until the energy threshold is reached or the budget runs out
    pub fn run_to_convergence(&mut self) -> Convergence {
        let mut convergence = Convergence {
            iterations: 0,
            converged: false,
            energy: 0.0,
        };

        for _ in 0..self.config.iterations {
            convergence.energy = self.tick();
            convergence.iterations += 1;
            if convergence.energy < self.config.min_energy_threshold {
                convergence.converged = true;
                break;
            }
        }

        convergence
    }
}
