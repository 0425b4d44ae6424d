//! Route state and the per-route advancement engine
//!
//! Standalone implementation that doesn't depend on Bevy.
//!
//! Motion is timed on each route's travel clock (`odometer`): the number of
//! seconds the vehicle has spent moving. Leg start and arrival times
//! (`last_time`, `next_time`) are on that axis. Waits are timed on the host's
//! monotonic clock. Train followers replay their leader's travel clock
//! delayed by their lag, so they drive exactly the legs the leader drove.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::{debug, warn};

use super::datarefs::{Activation, ExtRef, ExtRefSource, Published, SetTarget, UserRef};
use super::geometry::{heading_between, heading_of, normalize_heading, Bezier};
use super::host::{HostServices, ObjectHandle};
use super::path::{Path, SetCommand};
use super::types::{
    r2d, PathId, Point, RouteId, SimClock, AT_INTERVAL, COLLISION_INTERVAL, COLLISION_TIMEOUT,
    MAX_VAR, PROBE_INTERVAL, WHEELBASE, WHEN_INTERVAL,
};

/// What a route is doing right now
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteState {
    /// Not moving because the train leader isn't (or hasn't started)
    Frozen,
    /// Single-waypoint route: nowhere to go
    Parked,
    Paused { until: f32 },
    WaitingForTime { next_poll: f32 },
    WaitingForDataref { next_poll: f32 },
    WaitingForCollision { next_poll: f32, polls: u32 },
    /// Driving the current leg in reverse gear
    BackingUp,
    Traveling,
}

impl RouteState {
    pub fn is_moving(&self) -> bool {
        matches!(self, RouteState::Traveling | RouteState::BackingUp)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RouteState::Frozen => "frozen",
            RouteState::Parked => "parked",
            RouteState::Paused { .. } => "paused",
            RouteState::WaitingForTime { .. } => "waiting for time",
            RouteState::WaitingForDataref { .. } => "waiting for dataref",
            RouteState::WaitingForCollision { .. } => "waiting for collision",
            RouteState::BackingUp => "backing up",
            RouteState::Traveling => "traveling",
        }
    }
}

/// Checks run on arrival at a waypoint, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collision,
    When,
    At,
    Pause,
    Depart,
}

/// Airport-wide state a leader route reads and writes while advancing
pub struct RouteContext<'a> {
    pub clock: &'a SimClock,
    pub host: &'a dyn HostServices,
    pub userrefs: &'a mut [UserRef],
    pub extrefs: &'a mut [ExtRef],
    /// (leader route, segment) pairs with a car moving on them at the start
    /// of this frame
    pub occupied: &'a HashSet<(RouteId, usize)>,
}

/// Values published for a drawn vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PublishedValues {
    /// [m] from the first waypoint along the path
    pub distance: f32,
    /// [m/s], zero while stopped
    pub speed: f32,
    /// [deg], positive to the right
    pub steer: f32,
    pub node_last: usize,
    /// [m] travelled since the last waypoint
    pub node_last_distance: f32,
    pub node_next: usize,
    /// [m] remaining to the next waypoint
    pub node_next_distance: f32,
    pub var: [f32; MAX_VAR],
}

impl PublishedValues {
    /// Value of one published dataref; `index` only applies to `var`
    pub fn get(&self, which: Published, index: usize) -> f32 {
        match which {
            Published::Distance => self.distance,
            Published::Speed => self.speed,
            Published::Steer => self.steer,
            Published::NodeLast => self.node_last as f32,
            Published::NodeLastDistance => self.node_last_distance,
            Published::NodeNext => self.node_next as f32,
            Published::NodeNextDistance => self.node_next_distance,
            Published::Var => self.var.get(index).copied().unwrap_or(0.0),
        }
    }
}

/// Where to draw one vehicle this frame
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePose {
    pub route: RouteId,
    pub object: Option<ObjectHandle>,
    pub position: Point,
    /// [deg] clockwise from north, including the object's own heading
    pub heading: f32,
    pub values: PublishedValues,
}

/// One simulated vehicle, or one car of a train
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub path: PathId,
    /// Train leader, for every car but the first
    pub parent: Option<RouteId>,
    pub object: String,
    pub objref: Option<ObjectHandle>,
    /// Object heading [deg] relative to the direction of travel
    pub heading: f32,
    /// [m/s]
    pub speed: f32,
    /// Seconds behind the train's reference point
    pub lag: f32,
    pub state: RouteState,
    /// +1 forwards along the path, -1 backwards
    pub direction: i32,
    pub last_node: usize,
    pub next_node: usize,
    /// Travel clock when the current leg started
    pub last_time: f32,
    /// Travel clock when the next waypoint is reached
    pub next_time: f32,
    /// Seconds spent moving
    pub odometer: f32,
    /// Current leg started from a smooth turn at `last_node`
    pub smooth_start: bool,
    pub position: Point,
    /// Direction of travel [deg], before the object's own heading
    pub travel_heading: f32,
    pub steer: f32,
    pub distance: f32,
    last_y: f32,
    next_y: f32,
    probe_time: Option<f32>,
    pub varrefs: [Option<Activation>; MAX_VAR],
    /// Draw colour for viewers
    pub colour: [f32; 3],
}

impl Route {
    pub fn new(id: RouteId, path: PathId, object: &str, speed: f32, heading: f32) -> Self {
        Self {
            id,
            path,
            parent: None,
            object: object.to_string(),
            objref: None,
            heading,
            speed,
            lag: 0.0,
            state: RouteState::Frozen,
            direction: 1,
            last_node: 0,
            next_node: 0,
            last_time: 0.0,
            next_time: 0.0,
            odometer: 0.0,
            smooth_start: false,
            position: Point::default(),
            travel_heading: 0.0,
            steer: 0.0,
            distance: 0.0,
            last_y: 0.0,
            next_y: 0.0,
            probe_time: None,
            varrefs: [None; MAX_VAR],
            colour: [1.0, 1.0, 1.0],
        }
    }

    pub fn is_follower(&self) -> bool {
        self.parent.is_some()
    }

    /// Segment the vehicle is moving on, if it is moving
    pub fn current_segment(&self, path: &Path) -> Option<usize> {
        self.state
            .is_moving()
            .then(|| path.segment_index(self.last_node, self.next_node, self.direction))
    }

    /// Restart from the first waypoint.
    ///
    /// A leader runs the first waypoint's commands straight away; a follower
    /// waits at the first waypoint until its lag has elapsed.
    pub fn reset(&mut self, path: &Path, ctx: &mut RouteContext) -> Result<()> {
        self.direction = 1;
        self.last_node = 0;
        self.next_node = 0;
        self.odometer = 0.0;
        self.last_time = 0.0;
        self.smooth_start = false;
        self.distance = 0.0;
        self.steer = 0.0;
        self.probe_time = None;
        self.varrefs = [None; MAX_VAR];
        let first = path.nodes.first().context("Route has no waypoints")?;
        self.position = first.p;

        if self.is_follower() {
            self.next_time = -self.lag;
            self.state = RouteState::Frozen;
            if let Some(departure) = path.departure(0, 1) {
                self.travel_heading = heading_between(&first.p, &path.nodes[departure.next].p);
            }
            Ok(())
        } else {
            self.next_time = 0.0;
            self.state = RouteState::Frozen;
            let now = ctx.clock.monotonic;
            self.arrive(path, ctx, now)
        }
    }

    /// Shift every wall-clock timer, as when resuming after a short
    /// deactivation
    pub fn shift_time(&mut self, delta: f32) {
        match &mut self.state {
            RouteState::Paused { until } => *until += delta,
            RouteState::WaitingForTime { next_poll }
            | RouteState::WaitingForDataref { next_poll }
            | RouteState::WaitingForCollision { next_poll, .. } => *next_poll += delta,
            _ => {}
        }
        for activation in self.varrefs.iter_mut().flatten() {
            activation.shift(delta);
        }
        if let Some(time) = &mut self.probe_time {
            *time += delta;
        }
    }

    /// Advance a leader (or an independent route) by `delta_secs`.
    ///
    /// `budget` is the part of the frame not yet accounted for, so the route
    /// is at wall-clock time `now - budget` throughout. Waits start at that
    /// time and a wait ending mid-frame leaves only the remainder for motion.
    pub fn advance(&mut self, path: &Path, delta_secs: f32, ctx: &mut RouteContext) -> Result<()> {
        let now = ctx.clock.monotonic;
        let mut budget = delta_secs;

        // Each leg ends in an arrival; bound the work on zero-length paths
        for _ in 0..(2 * path.len() + 2) {
            match self.state {
                RouteState::Frozen => return self.reset(path, ctx),
                RouteState::Parked => break,
                RouteState::Paused { until } => {
                    if now < until {
                        break;
                    }
                    budget = budget.min(now - until);
                    if let Some(set) = path.nodes[self.last_node].set_after_pause.clone() {
                        self.apply_set(&set, ctx, until);
                    }
                    self.run_stages(path, Stage::Depart, ctx, until)?;
                }
                RouteState::WaitingForTime { next_poll } => {
                    if now < next_poll {
                        break;
                    }
                    if self.schedule_allows(path, ctx.clock) {
                        budget = budget.min(now - next_poll);
                        self.run_stages(path, Stage::Pause, ctx, next_poll)?;
                    } else {
                        self.state = RouteState::WaitingForTime {
                            next_poll: next_poll + AT_INTERVAL,
                        };
                        break;
                    }
                }
                RouteState::WaitingForDataref { next_poll } => {
                    if now < next_poll {
                        break;
                    }
                    if self.gates_allow(path, ctx) {
                        budget = budget.min(now - next_poll);
                        self.run_stages(path, Stage::At, ctx, next_poll)?;
                    } else {
                        self.state = RouteState::WaitingForDataref {
                            next_poll: next_poll + WHEN_INTERVAL,
                        };
                        break;
                    }
                }
                RouteState::WaitingForCollision { next_poll, polls } => {
                    if now < next_poll {
                        break;
                    }
                    let polls = polls + 1;
                    if !self.collision_blocked(path, ctx) {
                        budget = budget.min(now - next_poll);
                        self.run_stages(path, Stage::When, ctx, next_poll)?;
                    } else if polls >= COLLISION_TIMEOUT {
                        debug!(
                            "Route {} breaking deadlock at waypoint {} after {} polls",
                            self.id, self.last_node, polls
                        );
                        budget = budget.min(now - next_poll);
                        self.run_stages(path, Stage::When, ctx, next_poll)?;
                    } else {
                        self.state = RouteState::WaitingForCollision {
                            next_poll: next_poll + COLLISION_INTERVAL,
                            polls,
                        };
                        break;
                    }
                }
                RouteState::Traveling | RouteState::BackingUp => {
                    if budget <= 0.0 && self.odometer < self.next_time {
                        break;
                    }
                    let target = self.odometer + budget;
                    if target < self.next_time {
                        self.odometer = target;
                        break;
                    }
                    budget = target - self.next_time;
                    self.odometer = self.next_time;
                    self.arrive(path, ctx, now - budget)?;
                }
            }
        }

        self.locate(path);
        Ok(())
    }

    /// Replay the leader's motion up to travel clock `target`
    pub fn follow(&mut self, path: &Path, target: f32) {
        if target <= self.odometer || target <= 0.0 || self.state == RouteState::Parked {
            if self.state != RouteState::Parked {
                self.state = RouteState::Frozen;
            }
            return;
        }

        if self.next_time < 0.0 {
            // Lag has elapsed: start the first leg the way the leader did
            self.odometer = 0.0;
            self.depart(path, 0);
        } else {
            self.state = if self.is_backing(path) {
                RouteState::BackingUp
            } else {
                RouteState::Traveling
            };
        }

        for _ in 0..(2 * path.len() + 2) {
            if self.state == RouteState::Parked || target < self.next_time {
                break;
            }
            self.odometer = self.next_time;
            self.depart(path, self.next_node);
        }
        if self.state != RouteState::Parked {
            self.odometer = target;
            self.state = if self.is_backing(path) {
                RouteState::BackingUp
            } else {
                RouteState::Traveling
            };
        }
        self.locate(path);
    }

    /// Arrived at `next_node` at wall-clock time `at`: run its commands
    /// from the top
    fn arrive(&mut self, path: &Path, ctx: &mut RouteContext, at: f32) -> Result<()> {
        let node = path
            .nodes
            .get(self.next_node)
            .context("Waypoint missing from path")?;
        self.last_node = self.next_node;
        self.position = node.p;
        if let Some(set) = node.set_on_arrival.clone() {
            self.apply_set(&set, ctx, at);
        }
        self.run_stages(path, Stage::Collision, ctx, at)
    }

    /// Run arrival checks starting at `stage`, stopping at the first that
    /// makes the route wait. Any wait is timed from `at`.
    fn run_stages(&mut self, path: &Path, stage: Stage, ctx: &mut RouteContext, at: f32) -> Result<()> {
        let node = path
            .nodes
            .get(self.last_node)
            .context("Waypoint missing from path")?;

        if stage == Stage::Collision && self.collision_blocked(path, ctx) {
            debug!("Route {} waiting for collision at waypoint {}", self.id, self.last_node);
            self.state = RouteState::WaitingForCollision {
                next_poll: at + COLLISION_INTERVAL,
                polls: 0,
            };
            return Ok(());
        }
        if matches!(stage, Stage::Collision | Stage::When) && !self.gates_allow(path, ctx) {
            debug!("Route {} waiting for dataref at waypoint {}", self.id, self.last_node);
            self.state = RouteState::WaitingForDataref {
                next_poll: at + WHEN_INTERVAL,
            };
            return Ok(());
        }
        if matches!(stage, Stage::Collision | Stage::When | Stage::At)
            && !self.schedule_allows(path, ctx.clock)
        {
            if let Some(schedule) = &node.schedule {
                if let Some((days, minute)) =
                    schedule.next_departure(ctx.clock.weekday, ctx.clock.minute_of_day())
                {
                    debug!(
                        "Route {} waiting at waypoint {} for {:02}:{:02} in {} day(s)",
                        self.id,
                        self.last_node,
                        minute / 60,
                        minute % 60,
                        days
                    );
                }
            }
            self.state = RouteState::WaitingForTime {
                next_poll: at + AT_INTERVAL,
            };
            return Ok(());
        }
        if stage != Stage::Depart {
            if let Some(pause) = node.pause {
                self.state = RouteState::Paused {
                    until: at + pause as f32,
                };
                return Ok(());
            }
        }

        self.depart(path, self.last_node);
        Ok(())
    }

    /// Leave `node` for the next waypoint, applying reverse and backup
    fn depart(&mut self, path: &Path, node: usize) {
        // Only a vehicle that is still rolling can sweep through a turn
        let rolling = self.state == RouteState::Traveling;
        let arriving_direction = self.direction;
        self.last_node = node;

        let Some(departure) = path.departure(node, self.direction) else {
            self.next_node = node;
            self.next_time = self.odometer;
            self.state = RouteState::Parked;
            if let Some(here) = path.nodes.get(node) {
                self.position = here.p;
            }
            return;
        };

        self.smooth_start = rolling && smooth_turn(path, node, arriving_direction);
        self.direction = departure.direction;
        self.next_node = departure.next;
        self.last_time = self.odometer;
        self.next_time = self.odometer + path.segment_length(node, departure.next) / self.speed;
        self.state = if departure.backing {
            RouteState::BackingUp
        } else {
            RouteState::Traveling
        };
    }

    /// Is the current leg driven in reverse gear?
    fn is_backing(&self, path: &Path) -> bool {
        self.last_node != self.next_node
            && path
                .nodes
                .get(self.last_node)
                .is_some_and(|node| node.backup)
    }

    fn apply_set(&mut self, set: &SetCommand, ctx: &mut RouteContext, now: f32) {
        let activation = Activation {
            start: now,
            duration: set.duration,
            slope: set.slope,
            curve: set.curve,
        };
        match set.target {
            SetTarget::Var(idx) => {
                if let Some(slot) = self.varrefs.get_mut(idx) {
                    *slot = Some(activation);
                }
            }
            SetTarget::User(idx) => {
                if let Some(userref) = ctx.userrefs.get_mut(idx) {
                    userref.activation = Some(activation);
                }
            }
        }
    }

    /// Is a car of another route moving on a segment that crosses the one
    /// we're about to drive?
    fn collision_blocked(&self, path: &Path, ctx: &RouteContext) -> bool {
        let Some(departure) = path.departure(self.last_node, self.direction) else {
            return false;
        };
        let segment = path.segment_index(self.last_node, departure.next, departure.direction);
        path.nodes.get(segment).is_some_and(|node| {
            node.collisions
                .iter()
                .any(|c| ctx.occupied.contains(&(c.route, c.node)))
        })
    }

    /// Do all `when`/`and` clauses at the current waypoint hold?
    fn gates_allow(&self, path: &Path, ctx: &mut RouteContext) -> bool {
        let now = ctx.clock.monotonic;
        let node = &path.nodes[self.last_node];
        node.gates.iter().all(|gate| {
            let Some(extref) = ctx.extrefs.get_mut(gate.extref) else {
                return false;
            };
            let value = match extref.source {
                ExtRefSource::Mine(idx) => ctx.userrefs.get(idx).map(|u| u.value(now)),
                ExtRefSource::Host => ctx.host.dataref_value(&extref.name.name, extref.name.index),
            };
            match value {
                Some(value) => gate.admits(value),
                None => {
                    if !extref.warned {
                        warn!("Can't read DataRef {}; route {} stays gated", extref.name, self.id);
                        extref.warned = true;
                    }
                    false
                }
            }
        })
    }

    fn schedule_allows(&self, path: &Path, clock: &SimClock) -> bool {
        match &path.nodes[self.last_node].schedule {
            Some(schedule) => schedule.matches(clock.weekday, clock.minute_of_day()),
            None => true,
        }
    }

    /// Recompute position, heading, steer and distance from the travel clock
    pub fn locate(&mut self, path: &Path) {
        let (Some(last), Some(next)) = (path.nodes.get(self.last_node), path.nodes.get(self.next_node))
        else {
            return;
        };
        if self.last_node == self.next_node {
            self.position = last.p;
            self.steer = 0.0;
            self.distance = path.distance_to(self.last_node);
            return;
        }

        let backing = self.is_backing(path);
        let t = self.odometer;
        let leg_time = (self.next_time - self.last_time).max(0.0);
        let progress = (self.speed * (t - self.last_time)).clamp(0.0, self.speed * leg_time);
        let straight_heading = heading_between(&last.p, &next.p);

        let exit_time = half_turn_time(path, self.last_node, self.speed);
        let entry_time = half_turn_time(path, self.next_node, self.speed);
        let curve = if self.smooth_start && exit_time > 0.0 && t < self.last_time + exit_time {
            let (entry, exit) = path.turn_entry_and_exit(self.last_node, self.direction);
            Some((
                Bezier::turn(entry, last.p, exit),
                0.5 + 0.5 * (t - self.last_time) / exit_time,
            ))
        } else if !backing
            && entry_time > 0.0
            && smooth_turn(path, self.next_node, self.direction)
            && t > self.next_time - entry_time
        {
            let (entry, exit) = path.turn_entry_and_exit(self.next_node, self.direction);
            Some((
                Bezier::turn(entry, next.p, exit),
                0.5 * (t - (self.next_time - entry_time)) / entry_time,
            ))
        } else {
            None
        };

        match curve {
            Some((bezier, u)) => {
                let u = u.clamp(0.0, 1.0);
                self.position = bezier.point(u);
                let (dx, dz) = bezier.derivative(u);
                self.travel_heading = if dx.abs() + dz.abs() > f32::EPSILON {
                    heading_of(dx, dz)
                } else {
                    straight_heading
                };
                self.steer = r2d((WHEELBASE * bezier.curvature(u)).atan());
            }
            None => {
                let fraction = if leg_time > 0.0 {
                    ((t - self.last_time) / leg_time).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                self.position = last.p.lerp(&next.p, fraction);
                self.travel_heading = straight_heading;
                self.steer = 0.0;
            }
        }
        if backing {
            self.travel_heading = normalize_heading(self.travel_heading + 180.0);
            self.steer = -self.steer;
        }

        let along = if self.direction > 0 { progress } else { -progress };
        self.distance = path.distance_to(self.last_node) + along;
    }

    /// Probe terrain under the vehicle and ahead of it every
    /// `PROBE_INTERVAL` seconds; height is interpolated in between
    pub fn probe_altitude(&mut self, path: &Path, host: &mut dyn HostServices, now: f32) {
        let due = self
            .probe_time
            .is_none_or(|time| now - time >= PROBE_INTERVAL);
        if !due {
            return;
        }
        let ahead = if self.state.is_moving() {
            let mut predicted = self.clone();
            predicted.odometer = (self.odometer + PROBE_INTERVAL).min(self.next_time);
            predicted.locate(path);
            predicted.position
        } else {
            self.position
        };
        self.last_y = host
            .probe_terrain(self.position.x, self.position.z)
            .unwrap_or(self.position.y);
        self.next_y = host.probe_terrain(ahead.x, ahead.z).unwrap_or(ahead.y);
        self.probe_time = Some(now);
    }

    fn altitude(&self, now: f32) -> f32 {
        match self.probe_time {
            Some(time) => {
                let t = ((now - time) / PROBE_INTERVAL).clamp(0.0, 1.0);
                self.last_y + (self.next_y - self.last_y) * t
            }
            None => self.position.y,
        }
    }

    pub fn published(&self, path: &Path, now: f32) -> PublishedValues {
        let mut var = [0.0; MAX_VAR];
        for (value, activation) in var.iter_mut().zip(self.varrefs.iter()) {
            if let Some(activation) = activation {
                *value = activation.value(now);
            }
        }
        let leg_length = if self.last_node == self.next_node {
            0.0
        } else {
            path.segment_length(self.last_node, self.next_node)
        };
        let progress = (self.speed * (self.odometer - self.last_time)).clamp(0.0, leg_length);
        PublishedValues {
            distance: self.distance,
            speed: if self.state.is_moving() { self.speed } else { 0.0 },
            steer: self.steer,
            node_last: self.last_node,
            node_last_distance: progress,
            node_next: self.next_node,
            node_next_distance: leg_length - progress,
            var,
        }
    }

    pub fn pose(&self, path: &Path, now: f32) -> RoutePose {
        let mut position = self.position;
        position.y = self.altitude(now);
        RoutePose {
            route: self.id,
            object: self.objref,
            position,
            heading: normalize_heading(self.travel_heading + self.heading),
            values: self.published(path, now),
        }
    }
}

/// Half the duration [s] of the turn at a waypoint
fn half_turn_time(path: &Path, node: usize, speed: f32) -> f32 {
    match path.nodes.get(node) {
        Some(here) if speed > 0.0 => here.p.distance_2d(&here.p1) / speed,
        _ => 0.0,
    }
}

/// Can a vehicle travelling in `direction` sweep through `node` without
/// stopping or changing direction?
fn smooth_turn(path: &Path, node: usize, direction: i32) -> bool {
    if !path.passes_through(node) {
        return false;
    }
    let Some(departure) = path.departure(node, direction) else {
        return false;
    };
    let segment = path.segment_index(node, departure.next, departure.direction);
    departure.direction == direction
        && !departure.backing
        && path.nodes.get(segment).is_some_and(|n| n.collisions.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::datarefs::{Curve, DatarefName, Slope};
    use crate::simulation::host::FlatEarthHost;
    use crate::simulation::path::{Collision, PathNode, Schedule, WhenGate};
    use crate::simulation::types::{DaySet, GeoLocation, Weekday};

    struct Fixture {
        host: FlatEarthHost,
        clock: SimClock,
        userrefs: Vec<UserRef>,
        extrefs: Vec<ExtRef>,
        occupied: HashSet<(RouteId, usize)>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                host: FlatEarthHost::new(GeoLocation::new(0.0, 0.0)),
                clock: SimClock::new(Weekday::Monday, 7, 0),
                userrefs: Vec::new(),
                extrefs: Vec::new(),
                occupied: HashSet::new(),
            }
        }

        fn map(&mut self, path: &mut Path, speed: f32) {
            path.map(&mut self.host, speed);
        }

        fn reset(&mut self, route: &mut Route, path: &Path) {
            let mut ctx = RouteContext {
                clock: &self.clock,
                host: &self.host,
                userrefs: &mut self.userrefs,
                extrefs: &mut self.extrefs,
                occupied: &self.occupied,
            };
            route.reset(path, &mut ctx).unwrap();
        }

        /// Advance the clock and the route by `steps` frames of `dt`
        fn run(&mut self, route: &mut Route, path: &Path, dt: f32, steps: usize) {
            for _ in 0..steps {
                self.clock.advance(dt);
                let mut ctx = RouteContext {
                    clock: &self.clock,
                    host: &self.host,
                    userrefs: &mut self.userrefs,
                    extrefs: &mut self.extrefs,
                    occupied: &self.occupied,
                };
                route.advance(path, dt, &mut ctx).unwrap();
            }
        }
    }

    /// Straight line north along the prime meridian, ~111 m per 0.001 deg
    fn line(count: usize) -> Path {
        Path::new(
            (0..count)
                .map(|i| PathNode::new(i as f64 * 0.001, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_leader_arrives_after_distance_over_speed() {
        let mut fx = Fixture::new();
        let mut path = line(2);
        path.nodes[1].reverse = true;
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        assert_eq!(route.state, RouteState::Traveling);

        let leg = path.segment_length(0, 1);
        assert!((route.next_time - leg / 5.0).abs() < 1e-3);
        fx.run(&mut route, &path, 1.0, 10);
        assert!((route.distance - 50.0).abs() < 1e-2);
        assert!(route.travel_heading < 1.0 || route.travel_heading > 359.0);
        let values = route.published(&path, fx.clock.monotonic);
        assert_eq!(values.speed, 5.0);
        assert!((values.node_last_distance + values.node_next_distance - leg).abs() < 1e-2);
    }

    #[test]
    fn test_reverse_turns_back_and_ping_pongs() {
        let mut fx = Fixture::new();
        let mut path = line(2);
        path.nodes[1].reverse = true;
        fx.map(&mut path, 10.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 10.0, 0.0);
        fx.reset(&mut route, &path);

        let leg_time = path.segment_length(0, 1) / 10.0;
        fx.run(&mut route, &path, 0.5, (leg_time * 2.0 + 2.0) as usize);
        assert_eq!(route.direction, -1);
        assert_eq!(route.next_node, 0);
        fx.run(&mut route, &path, 0.5, (leg_time * 2.0) as usize);
        assert_eq!(route.direction, 1);
    }

    #[test]
    fn test_loop_wraps_and_resets_distance() {
        let mut fx = Fixture::new();
        let mut path = Path::new(vec![
            PathNode::new(0.0, 0.0),
            PathNode::new(0.001, 0.0),
            PathNode::new(0.001, 0.001),
        ]);
        fx.map(&mut path, 10.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 10.0, 0.0);
        fx.reset(&mut route, &path);
        let lap: f32 = path
            .segments()
            .iter()
            .map(|(_, a, b)| path.segment_length(*a, *b))
            .sum::<f32>()
            / 10.0;
        fx.run(&mut route, &path, 0.25, ((lap + 1.0) * 4.0) as usize);
        assert_eq!(route.last_node, 0);
        assert!(route.distance < 15.0);
    }

    #[test]
    fn test_pause_stops_then_continues() {
        let mut fx = Fixture::new();
        let mut path = line(3);
        path.nodes[1].pause = Some(30);
        fx.map(&mut path, 20.0);
        let mut route = Route::new(RouteId(0), PathId(0), "tug", 20.0, 0.0);
        fx.reset(&mut route, &path);
        let leg_time = path.segment_length(0, 1) / 20.0;

        fx.run(&mut route, &path, 1.0, leg_time.ceil() as usize);
        assert!(matches!(route.state, RouteState::Paused { .. }));
        let odometer = route.odometer;
        fx.run(&mut route, &path, 1.0, 20);
        assert!(matches!(route.state, RouteState::Paused { .. }));
        assert_eq!(route.odometer, odometer);
        assert_eq!(route.published(&path, 0.0).speed, 0.0);
        fx.run(&mut route, &path, 1.0, 11);
        assert_eq!(route.state, RouteState::Traveling);
        assert_eq!(route.last_node, 1);
    }

    #[test]
    fn test_pause_is_timed_from_the_moment_of_arrival() {
        let mut fx = Fixture::new();
        let mut path = line(3);
        path.nodes[1].pause = Some(1);
        path.nodes[2].reverse = true;
        fx.map(&mut path, 10.0);
        let mut route = Route::new(RouteId(0), PathId(0), "tug", 10.0, 0.0);
        fx.reset(&mut route, &path);
        let leg_time = path.segment_length(0, 1) / 10.0;
        assert!(leg_time.fract() > 0.05 && leg_time.fract() < 0.95);

        // Arrival falls mid-frame, so the pause ends mid-frame too
        let arrival_frame = leg_time.ceil() as usize;
        fx.run(&mut route, &path, 1.0, arrival_frame);
        match route.state {
            RouteState::Paused { until } => assert!((until - (leg_time + 1.0)).abs() < 1e-3),
            other => panic!("expected a pause, got {:?}", other),
        }

        // Only the pause itself is lost from the travel clock
        fx.run(&mut route, &path, 1.0, 2);
        assert_eq!(route.state, RouteState::Traveling);
        assert_eq!(route.last_node, 1);
        let expected = fx.clock.monotonic - 1.0;
        assert!((route.odometer - expected).abs() < 1e-3, "odometer {}", route.odometer);
    }

    #[test]
    fn test_dataref_gate_wait_starts_at_arrival() {
        let mut fx = Fixture::new();
        fx.extrefs.push(ExtRef {
            name: DatarefName::parse("sim/ground/door").unwrap(),
            source: ExtRefSource::Host,
            warned: false,
        });
        let mut path = line(3);
        path.nodes[1].gates.push(WhenGate {
            extref: 0,
            from: 1.0,
            to: 1.0,
        });
        path.nodes[2].reverse = true;
        fx.map(&mut path, 10.0);
        let mut route = Route::new(RouteId(0), PathId(0), "tug", 10.0, 0.0);
        fx.reset(&mut route, &path);
        let leg_time = path.segment_length(0, 1) / 10.0;

        fx.run(&mut route, &path, 1.0, leg_time.ceil() as usize);
        match route.state {
            RouteState::WaitingForDataref { next_poll } => {
                assert!((next_poll - (leg_time + WHEN_INTERVAL)).abs() < 1e-3)
            }
            other => panic!("expected a dataref wait, got {:?}", other),
        }
    }

    #[test]
    fn test_single_waypoint_route_parks() {
        let mut fx = Fixture::new();
        let mut path = line(1);
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        fx.run(&mut route, &path, 1.0, 5);
        assert_eq!(route.state, RouteState::Parked);
    }

    #[test]
    fn test_scheduled_departure_released_on_the_minute() {
        let mut fx = Fixture::new();
        fx.clock = SimClock::new(Weekday::Monday, 7, 59);
        fx.clock.time_of_day += 59.0;
        let mut path = line(2);
        let mut days = DaySet::EMPTY;
        days.insert(Weekday::Monday);
        days.insert(Weekday::Wednesday);
        path.nodes[0].schedule = Some(Schedule::new(vec![480, 600], days));
        path.nodes[1].reverse = true;
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        assert!(matches!(route.state, RouteState::WaitingForTime { .. }));

        fx.run(&mut route, &path, 1.0, 59);
        assert!(matches!(route.state, RouteState::WaitingForTime { .. }));
        fx.run(&mut route, &path, 1.0, 1);
        assert!(route.state.is_moving());
    }

    #[test]
    fn test_schedule_holds_on_the_wrong_day() {
        let mut fx = Fixture::new();
        fx.clock = SimClock::new(Weekday::Tuesday, 8, 0);
        let mut path = line(2);
        let mut days = DaySet::EMPTY;
        days.insert(Weekday::Monday);
        path.nodes[0].schedule = Some(Schedule::new(vec![480], days));
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        fx.run(&mut route, &path, 10.0, 30);
        assert!(matches!(route.state, RouteState::WaitingForTime { .. }));
    }

    #[test]
    fn test_missing_dataref_keeps_route_gated() {
        let mut fx = Fixture::new();
        fx.extrefs.push(ExtRef {
            name: DatarefName::parse("sim/ground/door").unwrap(),
            source: ExtRefSource::Host,
            warned: false,
        });
        let mut path = line(2);
        path.nodes[0].gates.push(WhenGate {
            extref: 0,
            from: 1.0,
            to: 1.0,
        });
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        fx.run(&mut route, &path, 1.0, 10);
        assert!(matches!(route.state, RouteState::WaitingForDataref { .. }));
        assert!(fx.extrefs[0].warned);

        fx.host.set_dataref("sim/ground/door", None, 1.0);
        fx.run(&mut route, &path, 1.0, 2);
        assert!(route.state.is_moving());
    }

    #[test]
    fn test_set_on_arrival_drives_var() {
        let mut fx = Fixture::new();
        let mut path = line(1);
        path.nodes[0].set_on_arrival = Some(SetCommand {
            target: SetTarget::Var(2),
            slope: Slope::Rising,
            curve: Curve::Linear,
            duration: 10.0,
        });
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        let start = fx.clock.monotonic;
        let values = route.published(&path, start + 5.0);
        assert!((values.var[2] - 0.5).abs() < 1e-5);
        assert_eq!(values.var[0], 0.0);
        assert_eq!(values.get(Published::Var, 2), values.var[2]);
        assert_eq!(values.get(Published::Var, MAX_VAR), 0.0);
        assert_eq!(values.get(Published::Speed, 0), 0.0);
    }

    #[test]
    fn test_collision_deadlock_breaks_after_timeout() {
        let mut fx = Fixture::new();
        let mut path = line(2);
        path.nodes[0].collisions.push(Collision {
            route: RouteId(7),
            node: 3,
        });
        fx.occupied.insert((RouteId(7), 3));
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        assert!(matches!(route.state, RouteState::WaitingForCollision { .. }));

        fx.run(&mut route, &path, 1.0, 59);
        assert!(matches!(route.state, RouteState::WaitingForCollision { .. }));
        fx.run(&mut route, &path, 1.0, 2);
        assert!(route.state.is_moving());
    }

    #[test]
    fn test_collision_clears_when_other_route_leaves() {
        let mut fx = Fixture::new();
        let mut path = line(2);
        path.nodes[0].collisions.push(Collision {
            route: RouteId(7),
            node: 3,
        });
        fx.occupied.insert((RouteId(7), 3));
        fx.map(&mut path, 5.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        fx.reset(&mut route, &path);
        fx.occupied.clear();
        fx.run(&mut route, &path, 1.0, 4);
        assert!(route.state.is_moving());
    }

    #[test]
    fn test_backup_drives_one_segment_in_reverse_gear() {
        let mut fx = Fixture::new();
        let mut path = line(3);
        path.nodes[1].backup = true;
        path.nodes[2].reverse = true;
        fx.map(&mut path, 10.0);
        let mut route = Route::new(RouteId(0), PathId(0), "tug", 10.0, 0.0);
        fx.reset(&mut route, &path);
        let leg_time = path.segment_length(0, 1) / 10.0;
        fx.run(&mut route, &path, 0.5, (leg_time * 2.0) as usize + 2);
        assert_eq!(route.state, RouteState::BackingUp);
        assert_eq!(route.direction, 1);
        // Still heading north along the path, facing south
        assert!((route.travel_heading - 180.0).abs() < 1.0);
        fx.run(&mut route, &path, 0.5, (leg_time * 2.0) as usize + 2);
        assert_eq!(route.state, RouteState::Traveling);
    }

    #[test]
    fn test_follower_replays_leader_with_lag() {
        let mut fx = Fixture::new();
        let mut path = line(3);
        path.nodes[2].reverse = true;
        fx.map(&mut path, 5.0);
        let mut leader = Route::new(RouteId(0), PathId(0), "tug", 5.0, 0.0);
        let mut follower = leader.clone();
        follower.id = RouteId(1);
        follower.parent = Some(RouteId(0));
        follower.lag = 2.0;
        fx.reset(&mut leader, &path);
        fx.reset(&mut follower, &path);
        assert_eq!(follower.state, RouteState::Frozen);

        fx.run(&mut leader, &path, 1.0, 1);
        follower.follow(&path, leader.odometer - follower.lag);
        assert_eq!(follower.state, RouteState::Frozen);

        fx.run(&mut leader, &path, 1.0, 9);
        follower.follow(&path, leader.odometer - follower.lag);
        assert!(follower.state.is_moving());
        assert!((leader.distance - follower.distance - 10.0).abs() < 1e-2);
    }

    #[test]
    fn test_shift_time_moves_wall_clock_timers() {
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 5.0, 0.0);
        route.state = RouteState::Paused { until: 10.0 };
        route.shift_time(5.0);
        assert_eq!(route.state, RouteState::Paused { until: 15.0 });
    }

    #[test]
    fn test_smooth_turn_steers_right() {
        let mut fx = Fixture::new();
        // North, then east: a right turn at node 1
        let mut path = Path::new(vec![
            PathNode::new(0.0, 0.0),
            PathNode::new(0.001, 0.0),
            PathNode::new(0.001, 0.001),
        ]);
        path.nodes[2].reverse = true;
        fx.map(&mut path, 10.0);
        let mut route = Route::new(RouteId(0), PathId(0), "cart", 10.0, 0.0);
        fx.reset(&mut route, &path);
        let leg_time = path.segment_length(0, 1) / 10.0;
        fx.run(&mut route, &path, 0.1, (leg_time * 10.0) as usize - 3);
        assert!(route.steer > 0.0);
        assert!(route.travel_heading > 0.0 && route.travel_heading < 90.0);
    }
}
