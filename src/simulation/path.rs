//! Route paths: waypoints and the commands attached to them
//!
//! A path is shared by every car of a train. It is built by the parser, mapped
//! into renderer-local coordinates on activation, and annotated with collision
//! records by the collision detector. The advancement engine only reads it.

use sorted_vec::SortedVec;

use super::datarefs::{Curve, SetTarget, Slope};
use super::host::HostServices;
use super::types::{DaySet, GeoLocation, Point, RouteId, Weekday, TURN_TIME};

/// A scheduled departure list from an `at` command
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Minutes past midnight
    pub times: SortedVec<u16>,
    pub days: DaySet,
}

impl Schedule {
    pub fn new(times: Vec<u16>, days: DaySet) -> Self {
        Self {
            times: SortedVec::from_unsorted(times),
            days,
        }
    }

    /// Does the given minute on the given day match a scheduled time?
    pub fn matches(&self, day: Weekday, minute: u16) -> bool {
        self.days.contains(day) && self.times.binary_search(&minute).is_ok()
    }

    /// The next scheduled departure at or after the given minute, as
    /// (days ahead, minute of that day)
    pub fn next_departure(&self, day: Weekday, minute: u16) -> Option<(u32, u16)> {
        let first = *self.times.first()?;
        if self.days.contains(day) {
            if let Some(time) = self.times.iter().find(|t| **t >= minute) {
                return Some((0, *time));
            }
        }
        let mut next = day;
        for ahead in 1..=7 {
            next = next.next();
            if self.days.contains(next) {
                return Some((ahead, first));
            }
        }
        None
    }
}

/// A `when`/`and` clause: proceed only while the value is within `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhenGate {
    /// Index into the airport's external dataref table
    pub extref: usize,
    pub from: f32,
    pub to: f32,
}

impl WhenGate {
    pub fn admits(&self, value: f32) -> bool {
        value >= self.from && value <= self.to
    }
}

/// A `set` command: start a user dataref's activation curve
#[derive(Debug, Clone, PartialEq)]
pub struct SetCommand {
    pub target: SetTarget,
    pub slope: Slope,
    pub curve: Curve,
    pub duration: f32,
}

/// The segment leaving this node crosses `route`'s segment leaving `node`
/// (both counted in the forward direction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Collision {
    pub route: RouteId,
    pub node: usize,
}

/// One waypoint and the commands attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    pub waypoint: GeoLocation,
    /// Local coordinates, valid once mapped
    pub p: Point,
    /// Turn entry point on the side of the previous node
    pub p1: Point,
    /// Turn exit point on the side of the next node
    pub p3: Point,
    /// Pause [s]
    pub pause: Option<u32>,
    pub schedule: Option<Schedule>,
    /// Reverse direction for the rest of the path
    pub reverse: bool,
    /// Drive the next segment in reverse gear
    pub backup: bool,
    pub set_on_arrival: Option<SetCommand>,
    pub set_after_pause: Option<SetCommand>,
    pub gates: Vec<WhenGate>,
    pub collisions: Vec<Collision>,
}

impl PathNode {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            waypoint: GeoLocation::new(lat, lon),
            p: Point::default(),
            p1: Point::default(),
            p3: Point::default(),
            pause: None,
            schedule: None,
            reverse: false,
            backup: false,
            set_on_arrival: None,
            set_after_pause: None,
            gates: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// Does this node carry any command that can stop or redirect a vehicle?
    pub fn has_commands(&self) -> bool {
        self.pause.is_some()
            || self.schedule.is_some()
            || self.reverse
            || self.backup
            || self.set_on_arrival.is_some()
            || self.set_after_pause.is_some()
            || !self.gates.is_empty()
    }
}

/// Where a vehicle goes after leaving a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub next: usize,
    pub direction: i32,
    pub backing: bool,
}

/// Ordered waypoints of one route (or one train)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub nodes: Vec<PathNode>,
    /// Distance [m] from the first node to each node along the path
    pub cumulative: Vec<f32>,
}

impl Path {
    pub fn new(nodes: Vec<PathNode>) -> Self {
        Self {
            nodes,
            cumulative: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Paths without a final `reverse` run from the last node back to the first
    pub fn is_loop(&self) -> bool {
        self.nodes.len() > 1 && self.nodes.last().is_some_and(|n| !n.reverse)
    }

    /// Segments as (index, from, to) in the forward direction.
    /// Segment `i` leaves node `i`.
    pub fn segments(&self) -> Vec<(usize, usize, usize)> {
        let n = self.nodes.len();
        let mut segments: Vec<_> = (0..n.saturating_sub(1)).map(|i| (i, i, i + 1)).collect();
        if self.is_loop() {
            segments.push((n - 1, n - 1, 0));
        }
        segments
    }

    /// Index of the segment between two adjacent nodes, travelling in `direction`
    pub fn segment_index(&self, from: usize, to: usize, direction: i32) -> usize {
        if direction > 0 {
            from
        } else {
            to
        }
    }

    pub fn segment_length(&self, from: usize, to: usize) -> f32 {
        self.nodes[from].p.distance_2d(&self.nodes[to].p)
    }

    /// Where a vehicle arriving at `node` travelling in `direction` goes next
    pub fn departure(&self, node: usize, direction: i32) -> Option<Departure> {
        let n = self.nodes.len();
        if n < 2 {
            return None;
        }
        let here = &self.nodes[node];
        let mut direction = direction;
        if here.reverse || (direction < 0 && node == 0) {
            direction = -direction;
        }
        let next = if direction > 0 {
            if node + 1 < n {
                node + 1
            } else {
                0
            }
        } else {
            node - 1
        };
        Some(Departure {
            next,
            direction,
            backing: here.backup,
        })
    }

    /// Can a vehicle sweep through this node in a smooth turn?
    ///
    /// Only nodes with no commands, no collision records and a neighbour on
    /// both sides qualify.
    pub fn passes_through(&self, node: usize) -> bool {
        let n = self.nodes.len();
        let here = &self.nodes[node];
        if here.has_commands() || !here.collisions.is_empty() {
            return false;
        }
        if self.is_loop() {
            n > 2
        } else {
            node > 0 && node + 1 < n
        }
    }

    fn neighbours(&self, node: usize) -> Option<(usize, usize)> {
        let n = self.nodes.len();
        if n < 2 {
            return None;
        }
        let looped = self.is_loop();
        let prev = if node > 0 {
            node - 1
        } else if looped {
            n - 1
        } else {
            return None;
        };
        let next = if node + 1 < n {
            node + 1
        } else if looped {
            0
        } else {
            return None;
        };
        Some((prev, next))
    }

    /// Compute local coordinates, terrain heights, turn points and cumulative
    /// distances for a vehicle travelling at `speed` [m/s]
    pub fn map(&mut self, host: &mut dyn HostServices, speed: f32) {
        for node in &mut self.nodes {
            let mut p = host.world_to_local(&node.waypoint);
            if let Some(y) = host.probe_terrain(p.x, p.z) {
                p.y = y;
            }
            node.p = p;
            node.p1 = p;
            node.p3 = p;
        }

        let half_turn = speed * TURN_TIME / 2.0;
        for i in 0..self.nodes.len() {
            if let Some((prev, next)) = self.neighbours(i) {
                let p = self.nodes[i].p;
                let prev_p = self.nodes[prev].p;
                let next_p = self.nodes[next].p;
                let h = half_turn
                    .min(p.distance_2d(&prev_p) / 2.0)
                    .min(p.distance_2d(&next_p) / 2.0);
                self.nodes[i].p1 = p.towards(&prev_p, h);
                self.nodes[i].p3 = p.towards(&next_p, h);
            }
        }

        self.cumulative = Vec::with_capacity(self.nodes.len());
        let mut total = 0.0;
        for i in 0..self.nodes.len() {
            if i > 0 {
                total += self.segment_length(i - 1, i);
            }
            self.cumulative.push(total);
        }
    }

    /// Distance [m] of a node from the first node along the path
    pub fn distance_to(&self, node: usize) -> f32 {
        self.cumulative.get(node).copied().unwrap_or(0.0)
    }

    /// Turn entry and exit points at a node, as travelled in `direction`
    pub fn turn_entry_and_exit(&self, node: usize, direction: i32) -> (Point, Point) {
        let here = &self.nodes[node];
        if direction > 0 {
            (here.p1, here.p3)
        } else {
            (here.p3, here.p1)
        }
    }
}
