//! The strut-and-node graph and concentric grouping
//!
//! The installation frame is an undirected graph given as an edge list. An
//! edge's position in that list is the strut's global index, and the listed
//! `(a, b)` order is its default direction. Concentric expansion walks the
//! graph outward from seed points, consuming every edge at most once, and
//! produces the segment layouts the painting algorithms address.

use std::collections::HashSet;

use tracing::debug;

use crate::{Layout, Result, Segment, StrutHandle, StrutRegistry, TopologyError};

/// Node in the frame graph.
pub type PointId = usize;

#[derive(Debug, Clone, Copy)]
struct Edge {
    a: PointId,
    b: PointId,
}

/// Undirected strut-and-node graph built once from a fixed edge list.
pub struct Graph {
    edges: Vec<Edge>,
    incident: Vec<Vec<usize>>,
}

/// The three layouts produced by [`Graph::concentric_from_starting_points`].
pub struct ConcentricLayouts {
    /// One segment per expansion layer: the struts walked outward from the
    /// previous frontier during that layer.
    pub spokes: Layout,
    /// One segment per seed group: every strut the group touched across all
    /// layers, spokes and circles alike.
    pub groups: Layout,
    /// One segment per expansion layer: the ring paths walked along each
    /// group's new frontier.
    pub circles: Layout,
}

impl Graph {
    /// Build the graph from an edge list. Point ids are dense; the graph
    /// covers `0..=max point id` appearing in the list.
    pub fn new(edge_list: &[(PointId, PointId)]) -> Self {
        let point_count = edge_list
            .iter()
            .map(|&(a, b)| a.max(b) + 1)
            .max()
            .unwrap_or(0);
        let edges: Vec<Edge> = edge_list.iter().map(|&(a, b)| Edge { a, b }).collect();
        let mut incident = vec![Vec::new(); point_count];
        for (index, edge) in edges.iter().enumerate() {
            incident[edge.a].push(index);
            incident[edge.b].push(index);
        }
        Self { edges, incident }
    }

    /// Number of points in the graph.
    pub fn point_count(&self) -> usize {
        self.incident.len()
    }

    /// Number of struts (edges) in the graph.
    pub fn strut_count(&self) -> usize {
        self.edges.len()
    }

    /// Concentric two-phase expansion from seed point groups.
    ///
    /// Per layer, per group: the *spoke* phase consumes every unused edge
    /// incident to the group's current frontier, oriented away from the
    /// known endpoint, and collects the far endpoints as the next frontier.
    /// The *circle* phase then walks that new frontier as open or closed
    /// paths over the unused edges lying entirely on the frontier.
    ///
    /// A global used-edge set guarantees every edge is consumed at most
    /// once, which terminates the walk and prevents double-addressing.
    pub fn concentric_from_starting_points(
        &self,
        registry: &StrutRegistry,
        seed_groups: &[Vec<PointId>],
        num_layers: usize,
    ) -> Result<ConcentricLayouts> {
        for group in seed_groups {
            for &point in group {
                if point >= self.incident.len() {
                    return Err(TopologyError::UnknownPoint(point));
                }
            }
        }

        let mut used = vec![false; self.edges.len()];
        let mut group_struts: Vec<Vec<StrutHandle>> = vec![Vec::new(); seed_groups.len()];
        let mut spoke_layers: Vec<Vec<StrutHandle>> = Vec::with_capacity(num_layers);
        let mut circle_layers: Vec<Vec<StrutHandle>> = Vec::with_capacity(num_layers);
        let mut frontiers: Vec<Vec<PointId>> = seed_groups.to_vec();

        for layer in 0..num_layers {
            // Spoke phase: expand every group's frontier outward.
            let mut spokes = Vec::new();
            for (group, frontier) in frontiers.iter_mut().enumerate() {
                let mut next = Vec::new();
                for &point in frontier.iter() {
                    for &edge_index in &self.incident[point] {
                        if used[edge_index] {
                            continue;
                        }
                        used[edge_index] = true;
                        let edge = self.edges[edge_index];
                        // Oriented away from the known endpoint: the flag is
                        // fixed here and preserved exactly from now on.
                        let reversed = edge.b == point;
                        let far = if reversed { edge.a } else { edge.b };
                        let handle = registry.intern(edge_index, reversed)?;
                        spokes.push(handle);
                        group_struts[group].push(handle);
                        if !next.contains(&far) {
                            next.push(far);
                        }
                    }
                }
                *frontier = next;
            }

            // Circle phase: walk each group's new frontier.
            let mut circles = Vec::new();
            for (group, frontier) in frontiers.iter().enumerate() {
                let ring = self.walk_frontier(registry, frontier, &mut used)?;
                group_struts[group].extend_from_slice(&ring);
                circles.extend_from_slice(&ring);
            }

            debug!(
                layer,
                spokes = spokes.len(),
                circles = circles.len(),
                "concentric layer walked"
            );
            spoke_layers.push(spokes);
            circle_layers.push(circles);
        }

        let spokes = Layout::new(
            registry,
            spoke_layers
                .into_iter()
                .map(|s| Segment::new(registry, s))
                .collect(),
        );
        let groups = Layout::new(
            registry,
            group_struts
                .into_iter()
                .map(|s| Segment::new(registry, s))
                .collect(),
        );
        let circles = Layout::new(
            registry,
            circle_layers
                .into_iter()
                .map(|s| Segment::new(registry, s))
                .collect(),
        );

        Ok(ConcentricLayouts {
            spokes,
            groups,
            circles,
        })
    }

    /// Walk the unused edges lying entirely on `frontier` as open or closed
    /// paths: an open path starts at a degree-1 point, a closed ring at any
    /// point with remaining edges. Greedily follows unused edges until none
    /// remain anywhere on the frontier.
    fn walk_frontier(
        &self,
        registry: &StrutRegistry,
        frontier: &[PointId],
        used: &mut [bool],
    ) -> Result<Vec<StrutHandle>> {
        let on_frontier: HashSet<PointId> = frontier.iter().copied().collect();
        let unused_intra = |used: &[bool], point: PointId| {
            self.incident[point]
                .iter()
                .copied()
                .filter(|&ei| {
                    let edge = self.edges[ei];
                    !used[ei] && on_frontier.contains(&edge.a) && on_frontier.contains(&edge.b)
                })
                .collect::<Vec<_>>()
        };

        let mut out = Vec::new();
        loop {
            let start = frontier
                .iter()
                .copied()
                .find(|&p| unused_intra(used, p).len() == 1)
                .or_else(|| {
                    frontier
                        .iter()
                        .copied()
                        .find(|&p| !unused_intra(used, p).is_empty())
                });
            let Some(mut current) = start else {
                break;
            };
            while let Some(&edge_index) = unused_intra(used, current).first() {
                used[edge_index] = true;
                let edge = self.edges[edge_index];
                let reversed = edge.b == current;
                out.push(registry.intern(edge_index, reversed)?);
                current = if reversed { edge.a } else { edge.b };
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Hub 0 with five rim points 1..=5: spokes are edges 0..=4, the rim is
    /// edges 5..=9.
    fn wheel() -> Graph {
        Graph::new(&[
            (0, 1),
            (0, 2),
            (0, 3),
            (0, 4),
            (0, 5),
            (1, 2),
            (2, 3),
            (3, 4),
            (4, 5),
            (5, 1),
        ])
    }

    fn strut_indices(registry: &StrutRegistry, layout: &Layout) -> Vec<usize> {
        layout
            .segments()
            .iter()
            .flat_map(|s| s.struts().iter().map(|&h| registry.get(h).index))
            .collect()
    }

    #[test]
    fn test_wheel_single_seed() {
        let graph = wheel();
        let registry = StrutRegistry::uniform(graph.strut_count(), 30, 0);

        let layouts = graph
            .concentric_from_starting_points(&registry, &[vec![0]], 1)
            .unwrap();

        // Layer 0: five spokes out of the hub, one closed rim circle.
        assert_eq!(layouts.spokes.segments()[0].len(), 5);
        assert_eq!(layouts.circles.segments()[0].len(), 5);
        assert_eq!(layouts.groups.segments()[0].len(), 10);

        // Spokes leave the hub along the default direction.
        for &handle in layouts.spokes.segments()[0].struts() {
            assert!(!registry.get(handle).reversed);
        }

        let mut indices = strut_indices(&registry, &layouts.groups);
        indices.sort_unstable();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_reversed_flag_fixed_by_known_endpoint() {
        // Single edge (0, 1) expanded from point 1: the known endpoint is
        // the edge's b side, so the strut is recorded reversed.
        let graph = Graph::new(&[(0, 1)]);
        let registry = StrutRegistry::uniform(1, 30, 0);

        let layouts = graph
            .concentric_from_starting_points(&registry, &[vec![1]], 1)
            .unwrap();

        let handle = layouts.spokes.segments()[0].struts()[0];
        assert!(registry.get(handle).reversed);
    }

    #[test]
    fn test_open_circle_starts_at_endpoint() {
        // Seed 0 spokes to 1 and 2; the single rim edge (1, 2) is an open
        // path and must be walked from a degree-1 point.
        let graph = Graph::new(&[(0, 1), (0, 2), (1, 2)]);
        let registry = StrutRegistry::uniform(3, 30, 0);

        let layouts = graph
            .concentric_from_starting_points(&registry, &[vec![0]], 1)
            .unwrap();

        let circle = &layouts.circles.segments()[0];
        assert_eq!(circle.len(), 1);
        // Frontier order is (1, 2), so the walk starts at 1 and follows the
        // edge's default direction.
        assert!(!registry.get(circle.struts()[0]).reversed);
    }

    #[test]
    fn test_two_groups_share_nothing() {
        // Path 0-1-2-3: seeds at both ends race toward the middle.
        let graph = Graph::new(&[(0, 1), (1, 2), (2, 3)]);
        let registry = StrutRegistry::uniform(3, 30, 0);

        let layouts = graph
            .concentric_from_starting_points(&registry, &[vec![0], vec![3]], 2)
            .unwrap();

        let mut all = strut_indices(&registry, &layouts.groups);
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 3, "every edge consumed exactly once");

        // The strut walked from point 3 runs against its default direction.
        let group_b = &layouts.groups.segments()[1];
        assert!(registry.get(group_b.struts()[0]).reversed);
    }

    #[test]
    fn test_unknown_seed_rejected() {
        let graph = wheel();
        let registry = StrutRegistry::uniform(graph.strut_count(), 30, 0);
        assert!(graph
            .concentric_from_starting_points(&registry, &[vec![99]], 1)
            .is_err());
    }

    proptest! {
        /// Every edge is consumed at most once: the union of struts across
        /// all three layouts never repeats a strut index.
        #[test]
        fn prop_no_duplicate_struts(
            edges in proptest::collection::vec((0usize..12, 0usize..12), 1..40),
            seeds in proptest::collection::vec(0usize..12, 1..4),
            layers in 1usize..5,
        ) {
            let graph = Graph::new(&edges);
            let registry = StrutRegistry::uniform(graph.strut_count(), 30, 0);
            let groups: Vec<Vec<PointId>> =
                seeds.iter().map(|&s| vec![s % graph.point_count().max(1)]).collect();

            let layouts = graph
                .concentric_from_starting_points(&registry, &groups, layers)
                .unwrap();

            for layout in [&layouts.spokes, &layouts.circles] {
                let mut seen = HashSet::new();
                for index in strut_indices(&registry, layout) {
                    prop_assert!(seen.insert(index), "strut {} addressed twice", index);
                }
            }
            // Group segments cover spokes and circles together, still
            // without repeats.
            let mut seen = HashSet::new();
            for index in strut_indices(&registry, &layouts.groups) {
                prop_assert!(seen.insert(index), "strut {} addressed twice", index);
            }
        }
    }
}
