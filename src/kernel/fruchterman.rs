//! Fruchterman-Reingold simulation
//!
//! Forces are scaled by the ideal edge length `k = sqrt(area / n)` and each
//! node's displacement per iteration is capped by a temperature that cools
//! geometrically.

use super::{Convergence, separation, spring_axis};
use crate::error::LayoutResult;
use crate::options::{LayoutOptions, keys};
use crate::types::{EdgeRef, Vec3};

/// Total movement below which a run counts as settled
const MIN_MOVEMENT: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct FruchtermanConfig {
    pub iterations: usize,
    /// Area the layout should fill; sets the ideal edge length
    pub area: f64,
    /// Initial displacement cap
    pub temperature: f64,
    /// Factor applied to the temperature after every iteration
    pub cooling: f64,
}

impl Default for FruchtermanConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            area: 400.0,
            temperature: 10.0,
            cooling: 0.95,
        }
    }
}

impl FruchtermanConfig {
    pub fn from_options(options: &LayoutOptions) -> LayoutResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            iterations: options.positive_count(keys::ITERATIONS, defaults.iterations as f64)?,
            area: options.positive(keys::AREA, defaults.area)?,
            temperature: options.non_negative(keys::TEMPERATURE, defaults.temperature)?,
            cooling: options.unit_fraction(keys::COOLING, defaults.cooling)?,
        })
    }
}

pub(super) fn simulate(
    mut positions: Vec<Vec3>,
    edges: &[EdgeRef],
    config: &FruchtermanConfig,
) -> (Vec<Vec3>, Convergence) {
    let n = positions.len();
    let k = (config.area / n as f64).sqrt();
    let mut temperature = config.temperature;
    let mut displacement = vec![Vec3::ZERO; n];
    let mut convergence = Convergence {
        iterations: 0,
        converged: false,
        energy: 0.0,
    };

    for _ in 0..config.iterations {
        displacement.fill(Vec3::ZERO);

        for i in 0..n {
            for j in (i + 1)..n {
                let (direction, distance) = separation(positions[i], positions[j], i * n + j);
                let push = direction * (k * k / distance);
                displacement[i] += push;
                displacement[j] -= push;
            }
        }

        for edge in edges {
            let Some((direction, distance)) =
                spring_axis(positions[edge.source], positions[edge.target])
            else {
                continue;
            };
            let pull = direction * (distance * distance / k);
            displacement[edge.source] -= pull;
            displacement[edge.target] += pull;
        }

        let mut moved = 0.0;
        for (position, disp) in positions.iter_mut().zip(&displacement) {
            let length = disp.length();
            if length > 0.0 {
                let step = length.min(temperature);
                *position += *disp * (step / length);
                moved += step;
            }
        }

        temperature *= config.cooling;
        convergence.iterations += 1;
        convergence.energy = moved;
        if moved < MIN_MOVEMENT {
            convergence.converged = true;
            break;
        }
    }

    (positions, convergence)
}
