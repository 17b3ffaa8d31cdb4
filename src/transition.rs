//! Animated transitions between layouts
//!
//! A [`Transition`] holds the displayed positions before a layout was applied
//! and the positions the layout produced, and interpolates between them over
//! a fixed duration. Whatever draws the nodes implements [`TransitionSink`].

use std::collections::HashMap;
use std::time::Duration;

use crate::types::{NodePosition, Vec3};

/// Duration used by [`Transition::with_default_duration`]
pub const DEFAULT_TRANSITION_DURATION: Duration = Duration::from_secs(1);

/// Consumer of interpolated frames
pub trait TransitionSink {
    fn apply_frame(&mut self, frame: &[NodePosition]);
}

impl TransitionSink for Vec<NodePosition> {
    fn apply_frame(&mut self, frame: &[NodePosition]) {
        self.clear();
        self.extend_from_slice(frame);
    }
}

/// Interpolation from one snapshot to another
#[derive(Debug, Clone)]
pub struct Transition {
    /// Start point for each target node, in target order
    start: Vec<Vec3>,
    target: Vec<NodePosition>,
    duration: Duration,
}

impl Transition {
    /// Prepare a transition from `from` to `to`
    ///
    /// Nodes are matched by id. A target node with no counterpart in `from`
    /// starts at its target, so it appears in place.
    pub fn new(from: &[NodePosition], to: Vec<NodePosition>, duration: Duration) -> Self {
        let previous: HashMap<&str, Vec3> = from
            .iter()
            .map(|node| (node.id.as_str(), node.position()))
            .collect();
        let start = to
            .iter()
            .map(|node| {
                previous
                    .get(node.id.as_str())
                    .copied()
                    .unwrap_or_else(|| node.position())
            })
            .collect();

        Self {
            start,
            target: to,
            duration,
        }
    }

    pub fn with_default_duration(from: &[NodePosition], to: Vec<NodePosition>) -> Self {
        Self::new(from, to, DEFAULT_TRANSITION_DURATION)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Positions the transition ends at
    pub fn target(&self) -> &[NodePosition] {
        &self.target
    }

    /// Eased progress in `[0, 1]` after `elapsed`
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let t = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);
        smoothstep(t)
    }

    /// Interpolated frame after `elapsed`
    pub fn sample(&self, elapsed: Duration) -> Vec<NodePosition> {
        let t = self.progress(elapsed);
        self.start
            .iter()
            .zip(&self.target)
            .map(|(start, node)| node.moved_to(start.lerp(node.position(), t)))
            .collect()
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    /// Push the frame for `elapsed` into `sink`, returning whether the
    /// transition has finished
    pub fn drive<S: TransitionSink + ?Sized>(&self, sink: &mut S, elapsed: Duration) -> bool {
        if self.is_finished(elapsed) {
            sink.apply_frame(&self.target);
            return true;
        }
        sink.apply_frame(&self.sample(elapsed));
        false
    }
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}
