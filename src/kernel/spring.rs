//! Spring-embedder simulation
//!
//! Edges are springs with a natural length; all pairs repel. Nodes move by
//! the damped net force each iteration, without carrying velocity over.

use super::{Convergence, separation, spring_axis};
use crate::error::LayoutResult;
use crate::options::{DEFAULT_MIN_ENERGY_THRESHOLD, LayoutOptions, keys};
use crate::types::{EdgeRef, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct SpringConfig {
    pub iterations: usize,
    pub spring_constant: f64,
    pub repulsion_constant: f64,
    pub damping: f64,
    /// Rest length of every spring
    pub natural_length: f64,
    pub min_energy_threshold: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            spring_constant: 0.1,
            repulsion_constant: 1000.0,
            damping: 0.95,
            natural_length: 2.0,
            min_energy_threshold: DEFAULT_MIN_ENERGY_THRESHOLD,
        }
    }
}

impl SpringConfig {
    pub fn from_options(options: &LayoutOptions) -> LayoutResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            iterations: options.positive_count(keys::ITERATIONS, defaults.iterations as f64)?,
            spring_constant: options.non_negative(keys::SPRING_CONSTANT, defaults.spring_constant)?,
            repulsion_constant: options
                .non_negative(keys::REPULSION_CONSTANT, defaults.repulsion_constant)?,
            damping: options.unit_fraction(keys::DAMPING, defaults.damping)?,
            natural_length: options.non_negative(keys::NATURAL_LENGTH, defaults.natural_length)?,
            min_energy_threshold: options
                .non_negative(keys::MIN_ENERGY_THRESHOLD, defaults.min_energy_threshold)?,
        })
    }
}

pub(super) fn simulate(
    mut positions: Vec<Vec3>,
    edges: &[EdgeRef],
    config: &SpringConfig,
) -> (Vec<Vec3>, Convergence) {
    let n = positions.len();
    let mut forces = vec![Vec3::ZERO; n];
    let mut convergence = Convergence {
        iterations: 0,
        converged: false,
        energy: 0.0,
    };

    for _ in 0..config.iterations {
        forces.fill(Vec3::ZERO);
        let mut energy = 0.0;

        for edge in edges {
            // Axis points from source towards target
            let Some((direction, distance)) =
                spring_axis(positions[edge.target], positions[edge.source])
            else {
                continue;
            };
            let magnitude = config.spring_constant * (distance - config.natural_length);
            forces[edge.source] += direction * magnitude;
            forces[edge.target] -= direction * magnitude;
            energy += magnitude.abs();
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let (direction, distance) = separation(positions[i], positions[j], i * n + j);
                let magnitude = config.repulsion_constant / (distance * distance);
                forces[i] += direction * magnitude;
                forces[j] -= direction * magnitude;
                energy += magnitude;
            }
        }

        for (position, force) in positions.iter_mut().zip(&forces) {
            *position += *force * config.damping;
        }

        convergence.iterations += 1;
        convergence.energy = energy;
        if energy < config.min_energy_threshold {
            convergence.converged = true;
            break;
        }
    }

    (positions, convergence)
}
