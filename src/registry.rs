//! Layout registry and dispatch
//!
//! The registry maps layout identifiers to descriptors (display name, default
//! options, strategy). It is an ordinary value built once at startup and
//! handed to whoever needs it; there is no global instance.
//!
//! Strategies come in two flavors: inline placements computed on the calling
//! thread, and offloaded simulations shipped to the [`LayoutHost`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{LayoutError, LayoutResult, panic_message};
use crate::host::{LayoutHost, LayoutRequest};
use crate::kernel::{Algorithm, FruchtermanConfig, SpringConfig};
use crate::layouts::{self, normalize_positions};
use crate::options::{
    DEFAULT_ATTRACTION_STRENGTH, DEFAULT_DAMPING, DEFAULT_ITERATIONS,
    DEFAULT_MIN_ENERGY_THRESHOLD, DEFAULT_NORMALIZE_EXTENT, DEFAULT_RADIUS, DEFAULT_RANGE,
    DEFAULT_REPULSION_STRENGTH, DEFAULT_SPACING, LayoutOptions, keys,
};
use crate::types::{EdgeRef, NodePosition, validate_nodes};

/// A synchronous placement function
pub type PlacementFn = Arc<
    dyn Fn(&[NodePosition], &[EdgeRef], &LayoutOptions) -> LayoutResult<Vec<NodePosition>>
        + Send
        + Sync,
>;

/// How a layout computes positions
#[derive(Clone)]
pub enum Strategy {
    /// Computed on the calling thread
    Inline(PlacementFn),
    /// Run by the execution host on its worker thread
    Offloaded(Algorithm),
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Inline(_) => f.write_str("Inline"),
            Strategy::Offloaded(algorithm) => write!(f, "Offloaded({algorithm})"),
        }
    }
}

/// Registered metadata and strategy for one layout
#[derive(Debug, Clone)]
pub struct LayoutDescriptor {
    pub display_name: String,
    /// Options used when the caller does not override them
    pub defaults: LayoutOptions,
    pub strategy: Strategy,
}

impl LayoutDescriptor {
    /// Describe a layout computed on the calling thread
    pub fn inline<F>(display_name: impl Into<String>, defaults: LayoutOptions, place: F) -> Self
    where
        F: Fn(&[NodePosition], &[EdgeRef], &LayoutOptions) -> LayoutResult<Vec<NodePosition>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            display_name: display_name.into(),
            defaults,
            strategy: Strategy::Inline(Arc::new(place)),
        }
    }

    /// Describe a layout run by the execution host
    pub fn offloaded(
        display_name: impl Into<String>,
        defaults: LayoutOptions,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            defaults,
            strategy: Strategy::Offloaded(algorithm),
        }
    }
}

/// Identifier and display name of a registered layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutSummary {
    pub id: String,
    pub display_name: String,
}

/// Registry of available layouts
pub struct LayoutRegistry {
    layouts: Vec<(String, LayoutDescriptor)>,
    host: LayoutHost,
    timeout: Option<Duration>,
}

impl LayoutRegistry {
    /// Create an empty registry that offloads simulations to `host`
    pub fn new(host: LayoutHost) -> Self {
        Self {
            layouts: Vec::new(),
            host,
            timeout: None,
        }
    }

    /// Create a registry with all built-in layouts registered
    ///
    /// Registration order: force-directed, fruchterman-reingold,
    /// spring-embedder, hierarchical, tree, circular, grid, random. `tree`
    /// is the hierarchical placement under its own name.
    pub fn with_defaults(host: LayoutHost) -> Self {
        let mut registry = Self::new(host);

        registry.register(
            Algorithm::ForceDirected.id(),
            LayoutDescriptor::offloaded(
                "Force-Directed",
                LayoutOptions::new()
                    .with(keys::ITERATIONS, DEFAULT_ITERATIONS)
                    .with(keys::REPULSION_STRENGTH, DEFAULT_REPULSION_STRENGTH)
                    .with(keys::ATTRACTION_STRENGTH, DEFAULT_ATTRACTION_STRENGTH)
                    .with(keys::DAMPING, DEFAULT_DAMPING)
                    .with(keys::MIN_ENERGY_THRESHOLD, DEFAULT_MIN_ENERGY_THRESHOLD),
                Algorithm::ForceDirected,
            ),
        );

        let fr = FruchtermanConfig::default();
        registry.register(
            Algorithm::FruchtermanReingold.id(),
            LayoutDescriptor::offloaded(
                "Fruchterman-Reingold",
                LayoutOptions::new()
                    .with(keys::ITERATIONS, fr.iterations as f64)
                    .with(keys::AREA, fr.area)
                    .with(keys::TEMPERATURE, fr.temperature)
                    .with(keys::COOLING, fr.cooling)
                    .with(keys::NORMALIZE_EXTENT, DEFAULT_NORMALIZE_EXTENT),
                Algorithm::FruchtermanReingold,
            ),
        );

        let spring = SpringConfig::default();
        registry.register(
            Algorithm::SpringEmbedder.id(),
            LayoutDescriptor::offloaded(
                "Spring-Embedder",
                LayoutOptions::new()
                    .with(keys::ITERATIONS, spring.iterations as f64)
                    .with(keys::SPRING_CONSTANT, spring.spring_constant)
                    .with(keys::REPULSION_CONSTANT, spring.repulsion_constant)
                    .with(keys::DAMPING, spring.damping)
                    .with(keys::NATURAL_LENGTH, spring.natural_length)
                    .with(keys::NORMALIZE_EXTENT, DEFAULT_NORMALIZE_EXTENT),
                Algorithm::SpringEmbedder,
            ),
        );

        registry.register(
            "hierarchical",
            LayoutDescriptor::inline(
                "Hierarchical",
                LayoutOptions::new()
                    .with(keys::LEVEL_HEIGHT, 3.0)
                    .with(keys::NODE_SPACING, 2.0),
                layouts::hierarchical,
            ),
        );
        registry.register(
            "tree",
            LayoutDescriptor::inline(
                "Tree",
                LayoutOptions::new()
                    .with(keys::LEVEL_HEIGHT, 3.0)
                    .with(keys::NODE_SPACING, 2.0),
                layouts::hierarchical,
            ),
        );
        registry.register(
            "circular",
            LayoutDescriptor::inline(
                "Circular",
                LayoutOptions::new()
                    .with(keys::RADIUS, DEFAULT_RADIUS)
                    .with(keys::HEIGHT, 0.0),
                layouts::circular,
            ),
        );
        registry.register(
            "grid",
            LayoutDescriptor::inline(
                "Grid",
                LayoutOptions::new()
                    .with(keys::SPACING, DEFAULT_SPACING)
                    .with(keys::HEIGHT, 0.0),
                layouts::grid,
            ),
        );
        registry.register(
            "random",
            LayoutDescriptor::inline(
                "Random",
                LayoutOptions::new().with(keys::RANGE, DEFAULT_RANGE),
                layouts::random,
            ),
        );

        registry
    }

    /// Fail offloaded runs that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a layout, replacing any existing one with the same id in place
    pub fn register(&mut self, id: impl Into<String>, descriptor: LayoutDescriptor) {
        let id = id.into();
        match self.layouts.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = descriptor,
            None => self.layouts.push((id, descriptor)),
        }
    }

    /// Look up a layout by id
    pub fn get(&self, id: &str) -> Option<&LayoutDescriptor> {
        self.layouts
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, descriptor)| descriptor)
    }

    /// All registered layouts in registration order
    pub fn list_available(&self) -> Vec<LayoutSummary> {
        self.layouts
            .iter()
            .map(|(id, descriptor)| LayoutSummary {
                id: id.clone(),
                display_name: descriptor.display_name.clone(),
            })
            .collect()
    }

    /// The execution host offloaded layouts run on
    pub fn host(&self) -> &LayoutHost {
        &self.host
    }

    /// Compute new positions for `nodes` with the layout registered as `id`
    ///
    /// `overrides` are merged over the descriptor's defaults. Every failure,
    /// including a panicking inline strategy, comes back as an `Err`.
    pub async fn apply(
        &self,
        id: &str,
        nodes: &[NodePosition],
        edges: &[EdgeRef],
        overrides: &LayoutOptions,
    ) -> LayoutResult<Vec<NodePosition>> {
        let started = Instant::now();
        let result = self.dispatch(id, nodes, edges, overrides).await;

        match &result {
            Ok(_) => tracing::info!(
                layout = id,
                node_count = nodes.len(),
                edge_count = edges.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "layout applied"
            ),
            Err(error) => tracing::warn!(layout = id, %error, "layout failed"),
        }

        result
    }

    async fn dispatch(
        &self,
        id: &str,
        nodes: &[NodePosition],
        edges: &[EdgeRef],
        overrides: &LayoutOptions,
    ) -> LayoutResult<Vec<NodePosition>> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| LayoutError::UnknownLayout(id.to_string()))?;
        validate_nodes(nodes)?;
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let options = descriptor.defaults.merged(overrides);
        let normalize_extent = options.non_negative(keys::NORMALIZE_EXTENT, 0.0)?;

        let mut positions = match &descriptor.strategy {
            Strategy::Inline(place) => {
                panic::catch_unwind(AssertUnwindSafe(|| place(nodes, edges, &options)))
                    .unwrap_or_else(|payload| {
                        Err(LayoutError::execution(format!(
                            "layout '{id}' panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    })?
            }
            Strategy::Offloaded(algorithm) => {
                let request = LayoutRequest {
                    algorithm: *algorithm,
                    nodes: nodes.to_vec(),
                    edges: edges.to_vec(),
                    options,
                };
                let report = match self.timeout {
                    Some(timeout) => self.host.run_with_timeout(request, timeout).await?,
                    None => self.host.run(request).await?,
                };
                report.positions
            }
        };

        if positions.len() != nodes.len() {
            return Err(LayoutError::execution(format!(
                "layout '{id}' returned {} positions for {} nodes",
                positions.len(),
                nodes.len()
            )));
        }
        if normalize_extent > 0.0 {
            normalize_positions(&mut positions, normalize_extent);
        }

        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Vec3;

    fn registry() -> LayoutRegistry {
        LayoutRegistry::with_defaults(LayoutHost::spawn().unwrap())
    }

    fn square() -> (Vec<NodePosition>, Vec<EdgeRef>) {
        let nodes = vec![
            NodePosition::new("a", 4.0, 3.0, 3.0),
            NodePosition::new("b", 3.0, 4.0, 3.5),
            NodePosition::new("c", 2.0, 3.0, 3.2),
            NodePosition::new("d", 3.0, 2.0, 2.7),
        ];
        let edges = vec![
            EdgeRef::new(0, 1),
            EdgeRef::new(1, 2),
            EdgeRef::new(2, 3),
            EdgeRef::new(3, 0),
        ];
        (nodes, edges)
    }

    fn pin_to(point: Vec3) -> LayoutDescriptor {
        LayoutDescriptor::inline("Pinned", LayoutOptions::new(), move |nodes, _, _| {
            Ok(nodes.iter().map(|n| n.moved_to(point)).collect())
        })
    }

    #[test]
    fn with_defaults_lists_builtin_layouts_in_order() {
        let ids: Vec<String> = registry()
            .list_available()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(
            ids,
            [
                "force-directed",
                "fruchterman-reingold",
                "spring-embedder",
                "hierarchical",
                "tree",
                "circular",
                "grid",
                "random"
            ]
        );
    }

    #[test]
    fn get_returns_none_for_unknown_ids() {
        let registry = registry();
        assert!(registry.get("circular").is_some());
        assert!(registry.get("spiral").is_none());
        assert!(registry.get("CIRCULAR").is_none());
    }

    #[test]
    fn register_overwrites_in_place() {
        let mut registry = registry();
        registry.register("grid", pin_to(Vec3::ZERO));
        registry.register("pinned", pin_to(Vec3::ZERO));

        let summaries = registry.list_available();
        assert_eq!(summaries.len(), 9);
        assert_eq!(summaries[6].id, "grid");
        assert_eq!(summaries[6].display_name, "Pinned");
        assert_eq!(summaries[8].id, "pinned");
    }

    #[test]
    fn force_directed_defaults_are_registered() {
        let registry = registry();
        let defaults = &registry.get("force-directed").unwrap().defaults;
        assert_eq!(defaults.get(keys::ITERATIONS), Some(100.0));
        assert_eq!(defaults.get(keys::REPULSION_STRENGTH), Some(75.0));
        assert_eq!(defaults.get(keys::ATTRACTION_STRENGTH), Some(0.1));
        assert_eq!(defaults.get(keys::DAMPING), Some(0.9));
        assert_eq!(defaults.get(keys::MIN_ENERGY_THRESHOLD), Some(0.001));
    }

    #[tokio::test]
    async fn every_layout_accepts_empty_input() {
        let registry = registry();
        for summary in registry.list_available() {
            let out = registry
                .apply(&summary.id, &[], &[], &LayoutOptions::new())
                .await
                .unwrap();
            assert!(out.is_empty(), "{}", summary.id);
        }
    }

    #[tokio::test]
    async fn tree_places_like_hierarchical() {
        let registry = registry();
        let (nodes, _) = square();
        let edges = vec![EdgeRef::new(0, 1), EdgeRef::new(0, 2), EdgeRef::new(2, 3)];

        let tree = registry
            .apply("tree", &nodes, &edges, &LayoutOptions::new())
            .await
            .unwrap();
        let hierarchical = registry
            .apply("hierarchical", &nodes, &edges, &LayoutOptions::new())
            .await
            .unwrap();

        assert_eq!(tree, hierarchical);
        assert_eq!(registry.get("tree").unwrap().display_name, "Tree");
    }

    #[tokio::test]
    async fn unknown_layout_is_an_error_not_a_panic() {
        let err = registry()
            .apply("spiral", &[], &[], &LayoutOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, LayoutError::UnknownLayout("spiral".to_string()));
    }

    #[tokio::test]
    async fn invalid_input_is_reported() {
        let registry = registry();
        let nodes = vec![NodePosition::unplaced("a"), NodePosition::unplaced("a")];
        let err = registry
            .apply("circular", &nodes, &[], &LayoutOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let (nodes, edges) = square();
        let err = registry
            .apply(
                "force-directed",
                &nodes,
                &edges,
                &LayoutOptions::new().with(keys::ITERATIONS, 0.0),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn overrides_win_over_defaults() {
        let registry = registry();
        let (nodes, edges) = square();
        let out = registry
            .apply(
                "circular",
                &nodes,
                &edges,
                &LayoutOptions::new().with(keys::RADIUS, 3.0),
            )
            .await
            .unwrap();
        for p in &out {
            assert!(((p.x * p.x + p.z * p.z).sqrt() - 3.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn force_directed_runs_on_the_host() {
        let registry = registry();
        let (nodes, edges) = square();
        let opts = LayoutOptions::new().with(keys::ITERATIONS, 50.0);

        let first = registry
            .apply("force-directed", &nodes, &edges, &opts)
            .await
            .unwrap();
        let second = registry
            .apply("force-directed", &nodes, &edges, &opts)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_ne!(first, nodes);
    }

    #[tokio::test]
    async fn supplementary_simulations_are_normalized() {
        let registry = registry();
        let (nodes, edges) = square();
        for id in ["fruchterman-reingold", "spring-embedder"] {
            let out = registry
                .apply(id, &nodes, &edges, &LayoutOptions::new().with(keys::ITERATIONS, 40.0))
                .await
                .unwrap();
            let widest = ["x", "y", "z"]
                .iter()
                .map(|axis| {
                    let values = out.iter().map(|p| match *axis {
                        "x" => p.x,
                        "y" => p.y,
                        _ => p.z,
                    });
                    let (lo, hi) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                    hi - lo
                })
                .fold(0.0, f64::max);
            assert!((widest - DEFAULT_NORMALIZE_EXTENT).abs() < 1e-9, "{id}: {widest}");
        }
    }

    #[tokio::test]
    async fn panicking_strategy_is_contained() {
        let mut registry = registry();
        registry.register(
            "broken",
            LayoutDescriptor::inline("Broken", LayoutOptions::new(), |_, _, _| {
                panic!("strategy exploded")
            }),
        );

        let err = registry
            .apply("broken", &[NodePosition::unplaced("a")], &[], &LayoutOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
        assert!(err.to_string().contains("strategy exploded"));
    }

    #[tokio::test]
    async fn short_results_are_rejected() {
        let mut registry = registry();
        registry.register(
            "lossy",
            LayoutDescriptor::inline("Lossy", LayoutOptions::new(), |_, _, _| Ok(Vec::new())),
        );

        let err = registry
            .apply("lossy", &[NodePosition::unplaced("a")], &[], &LayoutOptions::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("returned 0 positions for 1 nodes"));
    }
}
