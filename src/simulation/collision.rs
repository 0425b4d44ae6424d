//! Crossing detection between routes
//!
//! Computed once per activation. Every pair of segments from two different
//! routes that cross (or pass within `COLLISION_TOLERANCE`) is an edge in an
//! undirected graph keyed by (route, segment), so the relation is symmetric
//! by construction. The edges are also written into each path node's
//! `collisions` list for the advancement engine to consult.

use log::debug;
use petgraph::graphmap::UnGraphMap;

use super::geometry::{intersect, segment_distance};
use super::path::{Collision, Path};
use super::route::Route;
use super::types::{RouteId, COLLISION_TOLERANCE};

/// A route segment: segment `i` leaves waypoint `i`
pub type SegmentKey = (RouteId, usize);

/// Symmetric record of crossing segments
#[derive(Debug, Clone, Default)]
pub struct CollisionMap {
    graph: UnGraphMap<SegmentKey, ()>,
}

impl CollisionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, a: SegmentKey, b: SegmentKey) {
        self.graph.add_edge(a, b, ());
    }

    pub fn contains(&self, a: SegmentKey, b: SegmentKey) -> bool {
        self.graph.contains_edge(a, b)
    }

    /// Number of crossing pairs
    pub fn len(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// Every crossing pair, once
    pub fn pairs(&self) -> impl Iterator<Item = (SegmentKey, SegmentKey)> + '_ {
        self.graph.all_edges().map(|(a, b, _)| (a, b))
    }
}

fn segments_collide(path_a: &Path, a: (usize, usize), path_b: &Path, b: (usize, usize)) -> bool {
    let (p0, p1) = (&path_a.nodes[a.0].p, &path_a.nodes[a.1].p);
    let (p2, p3) = (&path_b.nodes[b.0].p, &path_b.nodes[b.1].p);
    intersect(p0, p1, p2, p3) || segment_distance(p0, p1, p2, p3) < COLLISION_TOLERANCE
}

/// Find crossing segments between every pair of distinct routes and record
/// them on the paths. Paths must already be mapped.
///
/// Only train leaders (and independent routes) take part: followers share
/// their leader's path, and cars of the same train never block each other.
pub fn detect_collisions(routes: &[Route], paths: &mut [Path]) -> CollisionMap {
    let mut map = CollisionMap::new();
    let leaders: Vec<&Route> = routes.iter().filter(|r| !r.is_follower()).collect();

    for (i, a) in leaders.iter().enumerate() {
        for b in &leaders[i + 1..] {
            if a.path == b.path {
                continue;
            }
            let (Some(path_a), Some(path_b)) = (paths.get(a.path.0), paths.get(b.path.0)) else {
                continue;
            };
            for (seg_a, from_a, to_a) in path_a.segments() {
                for (seg_b, from_b, to_b) in path_b.segments() {
                    if segments_collide(path_a, (from_a, to_a), path_b, (from_b, to_b)) {
                        map.insert((a.id, seg_a), (b.id, seg_b));
                    }
                }
            }
        }
    }

    for path in paths.iter_mut() {
        for node in &mut path.nodes {
            node.collisions.clear();
        }
    }
    let path_of = |id: RouteId| routes.iter().find(|r| r.id == id).map(|r| r.path);
    for (a, b) in map.pairs() {
        for (here, there) in [(a, b), (b, a)] {
            if let Some(path) = path_of(here.0).and_then(|p| paths.get_mut(p.0)) {
                if let Some(node) = path.nodes.get_mut(here.1) {
                    node.collisions.push(Collision {
                        route: there.0,
                        node: there.1,
                    });
                }
            }
        }
    }
    for path in paths.iter_mut() {
        for node in &mut path.nodes {
            node.collisions.sort();
        }
    }

    debug!("Found {} crossing segment pairs", map.len());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::host::FlatEarthHost;
    use crate::simulation::path::PathNode;
    use crate::simulation::types::{GeoLocation, PathId};

    fn mapped(points: &[(f64, f64)], reverse: bool) -> Path {
        let mut nodes: Vec<PathNode> = points.iter().map(|(lat, lon)| PathNode::new(*lat, *lon)).collect();
        if let Some(last) = nodes.last_mut() {
            last.reverse = reverse;
        }
        let mut path = Path::new(nodes);
        let mut host = FlatEarthHost::new(GeoLocation::new(0.0, 0.0));
        path.map(&mut host, 5.0);
        path
    }

    fn route(id: usize, path: usize) -> Route {
        Route::new(RouteId(id), PathId(path), "cart", 5.0, 0.0)
    }

    #[test]
    fn test_crossing_routes_are_recorded_both_ways() {
        // North-south line crossing an east-west line
        let mut paths = vec![
            mapped(&[(-0.001, 0.0), (0.001, 0.0)], true),
            mapped(&[(0.0, -0.001), (0.0, 0.001)], true),
        ];
        let routes = vec![route(0, 0), route(1, 1)];
        let map = detect_collisions(&routes, &mut paths);

        assert_eq!(map.len(), 1);
        assert!(map.contains((RouteId(0), 0), (RouteId(1), 0)));
        assert!(map.contains((RouteId(1), 0), (RouteId(0), 0)));
        assert_eq!(
            paths[0].nodes[0].collisions,
            vec![Collision {
                route: RouteId(1),
                node: 0
            }]
        );
        assert_eq!(
            paths[1].nodes[0].collisions,
            vec![Collision {
                route: RouteId(0),
                node: 0
            }]
        );
    }

    #[test]
    fn test_near_miss_within_tolerance_collides() {
        // Parallel east-west lines about half a metre apart
        let mut paths = vec![
            mapped(&[(0.0, 0.0), (0.0, 0.001)], true),
            mapped(&[(0.000_004_5, 0.0), (0.000_004_5, 0.001)], true),
        ];
        let routes = vec![route(0, 0), route(1, 1)];
        assert_eq!(detect_collisions(&routes, &mut paths).len(), 1);
    }

    #[test]
    fn test_distant_routes_do_not_collide() {
        let mut paths = vec![
            mapped(&[(0.0, 0.0), (0.0, 0.001)], true),
            mapped(&[(0.01, 0.0), (0.01, 0.001)], true),
        ];
        let routes = vec![route(0, 0), route(1, 1)];
        let map = detect_collisions(&routes, &mut paths);
        assert!(map.is_empty());
        assert!(paths.iter().all(|p| p.nodes.iter().all(|n| n.collisions.is_empty())));
    }

    #[test]
    fn test_train_cars_never_collide_with_each_other() {
        let mut paths = vec![
            mapped(&[(-0.001, 0.0), (0.001, 0.0)], true),
            mapped(&[(0.0, -0.001), (0.0, 0.001)], true),
        ];
        let mut follower = route(1, 0);
        follower.parent = Some(RouteId(0));
        let routes = vec![route(0, 0), follower, route(2, 1)];
        let map = detect_collisions(&routes, &mut paths);
        assert_eq!(map.len(), 1);
        assert!(map.contains((RouteId(0), 0), (RouteId(2), 0)));
        assert!(map.pairs().all(|(a, b)| a.0 != RouteId(1) && b.0 != RouteId(1)));
    }

    #[test]
    fn test_loop_closing_segment_is_checked() {
        // Triangle whose closing leg (2 -> 0) crosses the other route
        let mut paths = vec![
            mapped(&[(0.001, -0.001), (0.001, 0.001), (-0.001, 0.001)], false),
            mapped(&[(-0.002, 0.0005), (0.0, 0.0005)], true),
        ];
        let routes = vec![route(0, 0), route(1, 1)];
        let map = detect_collisions(&routes, &mut paths);
        assert!(map.contains((RouteId(0), 2), (RouteId(1), 0)));
    }
}
