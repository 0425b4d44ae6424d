//! The airport: one loaded scenery package and everything simulated in it
//!
//! This is the entry point for running the ground traffic simulation
//! without any Bevy dependencies. The host calls [`Airport::reload`] when the
//! package may have changed and [`Airport::frame`] once per rendered frame.

use std::collections::{HashMap, HashSet};
use std::path::Path as FsPath;

use log::{error, info, warn};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::activation::{ActivationManager, Transition};
use super::collision::{detect_collisions, CollisionMap};
use super::config::{ConfigWatcher, ReloadOutcome};
use super::datarefs::{ExtRef, Published, UserRef};
use super::host::HostServices;
use super::parser::{parse_config, AirportConfig, ConfigError};
use super::path::Path;
use super::route::{Route, RouteContext, RoutePose, RouteState};
use super::train::TrainDef;
use super::types::{GeoLocation, PathId, Point, RouteId, SimClock, DEFAULT_LOD, DRAW_DISTANCE};

/// Scenery shifts smaller than this [m] are ignored
const SHIFT_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirportState {
    NoConfig,
    Inactive,
    Active,
}

impl AirportState {
    pub fn name(&self) -> &'static str {
        match self {
            AirportState::NoConfig => "no config",
            AirportState::Inactive => "inactive",
            AirportState::Active => "active",
        }
    }
}

pub struct Airport {
    pub state: AirportState,
    pub icao: String,
    pub tower: GeoLocation,
    /// Tower in local coordinates as of the last mapping
    tower_point: Option<Point>,

    /// All routes, train cars in order behind their leader
    pub routes: Vec<Route>,

    /// Paths, each owned by one leader route
    pub paths: Vec<Path>,

    pub trains: Vec<TrainDef>,
    pub userrefs: Vec<UserRef>,
    pub extrefs: Vec<ExtRef>,
    pub collisions: CollisionMap,

    /// World detail divisor applied to the draw distance
    pub lod: f32,

    activation: ActivationManager,
    watcher: ConfigWatcher,

    /// Optional seeded RNG for reproducible route colours
    rng: Option<StdRng>,
}

impl Default for Airport {
    fn default() -> Self {
        Self::new()
    }
}

impl Airport {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            state: AirportState::NoConfig,
            icao: String::new(),
            tower: GeoLocation::new(0.0, 0.0),
            tower_point: None,
            routes: Vec::new(),
            paths: Vec::new(),
            trains: Vec::new(),
            userrefs: Vec::new(),
            extrefs: Vec::new(),
            collisions: CollisionMap::new(),
            lod: DEFAULT_LOD,
            activation: ActivationManager::new(),
            watcher: ConfigWatcher::new(),
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create an airport with a seeded RNG for reproducible runs
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    fn random_range(&mut self, range: std::ops::Range<f32>) -> f32 {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    /// Load the package's `groundtraffic.txt` if it changed since the last
    /// successful load. Any failure leaves the airport unconfigured.
    pub fn reload(&mut self, package: &FsPath) -> ReloadOutcome {
        let changed = match self.watcher.check(package) {
            Ok(None) => return ReloadOutcome::Unchanged,
            Ok(Some(changed)) => changed,
            Err(err) => return self.fail(err),
        };
        match parse_config(&changed.text) {
            Ok(config) => {
                self.install(config);
                self.watcher.commit(&changed);
                info!(
                    "{}: loaded {} routes from {}",
                    self.icao,
                    self.routes.len(),
                    changed.path.display()
                );
                ReloadOutcome::Reloaded
            }
            Err(err) => self.fail(err),
        }
    }

    /// Load config text directly, bypassing the file watcher
    pub fn load_str(&mut self, text: &str) -> Result<(), ConfigError> {
        match parse_config(text) {
            Ok(config) => {
                self.install(config);
                Ok(())
            }
            Err(err) => {
                error!("{}", err);
                self.clear();
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: ConfigError) -> ReloadOutcome {
        error!("{}", err);
        self.clear();
        ReloadOutcome::Failed(err)
    }

    /// Deactivate and drop every route, train and dataref
    pub fn clear(&mut self) {
        if self.state == AirportState::Active {
            self.deactivate();
        }
        self.state = AirportState::NoConfig;
        self.icao.clear();
        self.tower_point = None;
        self.routes.clear();
        self.paths.clear();
        self.trains.clear();
        self.userrefs.clear();
        self.extrefs.clear();
        self.collisions = CollisionMap::new();
        self.activation.reset();
        self.watcher.forget();
    }

    fn install(&mut self, config: AirportConfig) {
        self.clear();
        let AirportConfig {
            icao,
            tower,
            routes,
            paths,
            trains,
            userrefs,
            extrefs,
        } = config;
        self.icao = icao;
        if let Some(tower) = tower {
            self.tower = tower;
        }
        self.routes = routes;
        self.paths = paths;
        self.trains = trains;
        self.userrefs = userrefs;
        self.extrefs = extrefs;

        let mut colours = HashMap::new();
        for i in 0..self.routes.len() {
            // Every car of a train shares its leader's colour
            let key = self.routes[i].parent.unwrap_or(self.routes[i].id);
            let colour = match colours.get(&key) {
                Some(colour) => *colour,
                None => {
                    let colour = [
                        self.random_range(0.3..1.0),
                        self.random_range(0.3..1.0),
                        self.random_range(0.3..1.0),
                    ];
                    colours.insert(key, colour);
                    colour
                }
            };
            self.routes[i].colour = colour;
        }
        self.state = AirportState::Inactive;
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.0)
    }

    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.get(id.0)
    }

    pub fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.paths.get_mut(id.0)
    }

    /// The route that declared a path: the leader when it's shared by a train
    pub fn path_owner(&self, id: PathId) -> Option<RouteId> {
        self.routes
            .iter()
            .find(|r| r.path == id && !r.is_follower())
            .map(|r| r.id)
    }

    /// Next route in load order
    pub fn next_route(&self, id: RouteId) -> Option<RouteId> {
        self.routes.get(id.0 + 1).map(|r| r.id)
    }

    /// Current value of one of this airport's user datarefs
    pub fn dataref_value(&self, name: &str, now: f32) -> Option<f32> {
        self.userrefs
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.value(now))
    }

    /// Map every path into local coordinates for the current scenery
    fn map_paths(&mut self, host: &mut dyn HostServices) {
        self.tower_point = Some(tower_point(&mut self.tower, host));
        for (i, path) in self.paths.iter_mut().enumerate() {
            let speed = self
                .routes
                .iter()
                .find(|r| r.path == PathId(i) && !r.is_follower())
                .map(|r| r.speed)
                .unwrap_or(0.0);
            path.map(host, speed);
        }
    }

    /// Load objects, map paths and find collisions. Routes resume where they
    /// were after a short absence and start over otherwise.
    pub fn activate(&mut self, host: &mut dyn HostServices, clock: &SimClock, resume: Option<f32>) {
        for route in &mut self.routes {
            route.objref = host.load_object(&route.object);
            if route.objref.is_none() {
                warn!("{}: can't load object \"{}\" for route {}", self.icao, route.object, route.id);
            }
        }
        self.map_paths(host);
        self.collisions = detect_collisions(&self.routes, &mut self.paths);

        match resume {
            Some(inactive) => {
                for route in &mut self.routes {
                    route.shift_time(inactive);
                    if let Some(path) = self.paths.get(route.path.0) {
                        route.locate(path);
                    }
                }
                for userref in &mut self.userrefs {
                    if let Some(activation) = &mut userref.activation {
                        activation.shift(inactive);
                    }
                }
            }
            None => self.reset_routes(host, clock),
        }
        self.state = AirportState::Active;
        info!("{}: active with {} routes", self.icao, self.routes.len());
    }

    fn reset_routes(&mut self, host: &dyn HostServices, clock: &SimClock) {
        for userref in &mut self.userrefs {
            userref.activation = None;
        }
        let occupied = HashSet::new();
        let mut ctx = RouteContext {
            clock,
            host,
            userrefs: &mut self.userrefs,
            extrefs: &mut self.extrefs,
            occupied: &occupied,
        };
        for route in &mut self.routes {
            let Some(path) = self.paths.get(route.path.0) else {
                continue;
            };
            if let Err(err) = route.reset(path, &mut ctx) {
                warn!("Route {} parked: {:#}", route.id, err);
                route.state = RouteState::Parked;
            }
        }
    }

    /// Stop simulating and release object handles
    pub fn deactivate(&mut self) {
        for route in &mut self.routes {
            route.objref = None;
        }
        self.state = AirportState::Inactive;
        info!("{}: inactive", self.icao);
    }

    /// Run one frame: check proximity, advance every route, and return the
    /// poses of the vehicles to draw, nearest first
    pub fn frame(
        &mut self,
        host: &mut dyn HostServices,
        clock: &SimClock,
        viewer: &Point,
        delta_secs: f32,
    ) -> Vec<RoutePose> {
        if self.state == AirportState::NoConfig {
            return Vec::new();
        }

        let transition = {
            let tower = &mut self.tower;
            let host = &mut *host;
            self.activation
                .poll(clock.monotonic, || tower_point(tower, host).distance(viewer))
        };
        match transition {
            Some(Transition::Activate { resume }) => self.activate(host, clock, resume),
            Some(Transition::Deactivate) => self.deactivate(),
            None => {}
        }
        if self.state != AirportState::Active {
            return Vec::new();
        }

        self.check_scenery_shift(host);
        self.advance(host, clock, delta_secs);
        self.poses(host, clock, viewer)
    }

    /// Remap everything if the host moved its local coordinate frame
    fn check_scenery_shift(&mut self, host: &mut dyn HostServices) {
        let Some(previous) = self.tower_point else {
            return;
        };
        let current = host.world_to_local(&self.tower);
        if current.distance_2d(&previous) <= SHIFT_TOLERANCE {
            return;
        }
        info!("{}: scenery shifted, remapping routes", self.icao);
        self.map_paths(host);
        for route in &mut self.routes {
            if let Some(path) = self.paths.get(route.path.0) {
                route.locate(path);
            }
        }
    }

    fn advance(&mut self, host: &dyn HostServices, clock: &SimClock, delta_secs: f32) {
        // Leader and segment of every car moving at the start of the frame
        let occupied: HashSet<(RouteId, usize)> = self
            .routes
            .iter()
            .filter_map(|route| {
                let path = self.paths.get(route.path.0)?;
                let segment = route.current_segment(path)?;
                Some((route.parent.unwrap_or(route.id), segment))
            })
            .collect();

        {
            let mut ctx = RouteContext {
                clock,
                host,
                userrefs: &mut self.userrefs,
                extrefs: &mut self.extrefs,
                occupied: &occupied,
            };
            for route in self.routes.iter_mut().filter(|r| !r.is_follower()) {
                let Some(path) = self.paths.get(route.path.0) else {
                    continue;
                };
                if let Err(err) = route.advance(path, delta_secs, &mut ctx) {
                    warn!("Route {} parked: {:#}", route.id, err);
                    route.state = RouteState::Parked;
                }
            }
        }

        let leaders: HashMap<RouteId, (f32, f32)> = self
            .routes
            .iter()
            .filter(|r| !r.is_follower())
            .map(|r| (r.id, (r.odometer, r.lag)))
            .collect();
        for route in self.routes.iter_mut() {
            let Some(parent) = route.parent else {
                continue;
            };
            let (Some((odometer, leader_lag)), Some(path)) =
                (leaders.get(&parent), self.paths.get(route.path.0))
            else {
                continue;
            };
            route.follow(path, odometer - (route.lag - leader_lag));
        }
    }

    fn poses(&mut self, host: &mut dyn HostServices, clock: &SimClock, viewer: &Point) -> Vec<RoutePose> {
        let now = clock.monotonic;
        // Activation measured the viewer against the probed tower
        debug_assert!(self.tower.alt.is_some(), "drawing before the tower was probed");
        let range = DRAW_DISTANCE / self.lod;
        let mut poses: Vec<(OrderedFloat<f32>, RoutePose)> = Vec::new();
        for route in &mut self.routes {
            let Some(path) = self.paths.get(route.path.0) else {
                continue;
            };
            let distance = route.position.distance(viewer);
            if distance > range {
                continue;
            }
            route.probe_altitude(path, host, now);
            poses.push((OrderedFloat(distance), route.pose(path, now)));
        }
        poses.sort_by_key(|(distance, _)| *distance);
        poses.into_iter().map(|(_, pose)| pose).collect()
    }

    /// Print a summary of the airport state
    pub fn print_summary(&self, clock: &SimClock) {
        println!("=== Ground Traffic Summary ===");
        println!(
            "Airport: {} ({})  Time: {} {:02}:{:02}:{:02}",
            if self.icao.is_empty() { "----" } else { self.icao.as_str() },
            self.state.name(),
            clock.weekday.name(),
            (clock.time_of_day / 3600.0) as u32,
            ((clock.time_of_day / 60.0) as u32) % 60,
            (clock.time_of_day as u32) % 60
        );
        println!(
            "Routes: {}, Paths: {}, Trains: {}, Crossings: {}",
            self.routes.len(),
            self.paths.len(),
            self.trains.len(),
            self.collisions.len()
        );

        if !self.routes.is_empty() {
            println!("--- Routes ---");
            for route in &self.routes {
                let role = match route.parent {
                    Some(parent) => format!(" (follows {})", parent),
                    None => String::new(),
                };
                println!(
                    "  Route {} {}{}: {}, waypoint {} -> {}, distance={:.1}m",
                    route.id,
                    route.object,
                    role,
                    route.state.name(),
                    route.last_node,
                    route.next_node,
                    route.distance
                );
                if let Some(path) = self.path(route.path) {
                    let values = route.published(path, clock.monotonic);
                    let shown = [Published::Speed, Published::Steer, Published::NodeNextDistance];
                    let readings: Vec<String> = shown
                        .into_iter()
                        .map(|p| format!("{}={:.1}", p.short_name(), values.get(p, 0)))
                        .collect();
                    println!("    {}", readings.join(" "));
                }
            }
        }

        if !self.userrefs.is_empty() {
            println!("--- DataRefs ---");
            for userref in &self.userrefs {
                println!("  {} = {:.2}", userref.name, userref.value(clock.monotonic));
            }
        }
    }

    /// Render the mapped paths and vehicles as text
    pub fn render_map(&self, width: usize, height: usize) -> String {
        let points: Vec<Point> = self
            .paths
            .iter()
            .flat_map(|p| p.nodes.iter().map(|n| n.p))
            .collect();
        if points.is_empty() || width < 2 || height < 2 {
            return String::new();
        }

        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut min_z = f32::INFINITY;
        let mut max_z = f32::NEG_INFINITY;
        for p in &points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_z = min_z.min(p.z);
            max_z = max_z.max(p.z);
        }

        // Keep at least a metre of extent so a single point still renders
        let span_x = (max_x - min_x).max(1.0);
        let span_z = (max_z - min_z).max(1.0);
        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |x: f32, z: f32| -> (usize, usize) {
            let col = ((x - min_x) / span_x * (width - 1) as f32).round() as usize;
            let row = ((z - min_z) / span_z * (height - 1) as f32).round() as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Draw path segments
        for path in &self.paths {
            for (_, from, to) in path.segments() {
                let (start_row, start_col) = to_grid(path.nodes[from].p.x, path.nodes[from].p.z);
                let (end_row, end_col) = to_grid(path.nodes[to].p.x, path.nodes[to].p.z);

                // Simple line drawing (Bresenham-like)
                let dx = (end_col as i32 - start_col as i32).abs();
                let dy = (end_row as i32 - start_row as i32).abs();
                let sx = if start_col < end_col { 1 } else { -1 };
                let sy = if start_row < end_row { 1 } else { -1 };

                let mut err = dx - dy;
                let mut x = start_col as i32;
                let mut y = start_row as i32;

                loop {
                    if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                        let cell = &mut grid[y as usize][x as usize];
                        if *cell == ' ' {
                            *cell = '.';
                        }
                    }

                    if x == end_col as i32 && y == end_row as i32 {
                        break;
                    }

                    let e2 = 2 * err;
                    if e2 > -dy {
                        err -= dy;
                        x += sx;
                    }
                    if e2 < dx {
                        err += dx;
                        y += sy;
                    }
                }
            }
        }

        // Draw waypoints
        for p in &points {
            let (row, col) = to_grid(p.x, p.z);
            grid[row][col] = '+';
        }

        // Draw vehicles
        for route in &self.routes {
            let (row, col) = to_grid(route.position.x, route.position.z);
            grid[row][col] = if route.is_follower() { 'o' } else { 'V' };
        }

        let mut out = String::new();
        for row in &grid {
            let line: String = row.iter().collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    /// Draw a visual map of the airport in the terminal
    pub fn draw_map(&self) {
        println!("\n=== Ground Traffic Map ===");
        println!("Legend: V=Vehicle, o=Train car, +=Waypoint, .=Path");
        println!();
        print!("{}", self.render_map(72, 24));
        println!();
    }
}

/// The tower in local coordinates, probing its altitude the first time
fn tower_point(tower: &mut GeoLocation, host: &mut dyn HostServices) -> Point {
    if tower.alt.is_none() {
        let mut p = host.world_to_local(tower);
        if let Some(y) = host.probe_terrain(p.x, p.z) {
            p.y = y;
        }
        tower.alt = host.local_to_world(&p).alt.or(Some(0.0));
    }
    host.world_to_local(tower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::host::FlatEarthHost;
    use crate::simulation::types::{Weekday, ACTIVE_POLL, RESET_TIME};

    const CONFIG: &str = "KSEA 47.45 -122.31

route 20 baggage_cart
47.450 -122.310
47.451 -122.311
47.451 -122.309

train fuel
truck.obj 0
trailer.obj 8

route 36 fuel
47.4495 -122.3105
47.4515 -122.3105
reverse
";

    fn active_airport() -> (Airport, FlatEarthHost, SimClock) {
        let mut airport = Airport::new_with_seed(7);
        airport.load_str(CONFIG).unwrap();
        let mut host = FlatEarthHost::new(airport.tower);
        let clock = SimClock::new(Weekday::Monday, 9, 0);
        airport.frame(&mut host, &clock, &Point::default(), 0.0);
        (airport, host, clock)
    }

    #[test]
    fn test_load_builds_routes_and_shared_paths() {
        let mut airport = Airport::new();
        airport.load_str(CONFIG).unwrap();
        assert_eq!(airport.state, AirportState::Inactive);
        assert_eq!(airport.icao, "KSEA");
        assert_eq!(airport.routes.len(), 3);
        assert_eq!(airport.paths.len(), 2);
        assert_eq!(airport.path_owner(PathId(1)), Some(RouteId(1)));
        assert_eq!(airport.routes[2].path, PathId(1));
        assert_eq!(airport.next_route(RouteId(1)), Some(RouteId(2)));
        assert_eq!(airport.next_route(RouteId(2)), None);
        assert_eq!(airport.routes[1].colour, airport.routes[2].colour);
    }

    #[test]
    fn test_failed_load_clears_everything() {
        let mut airport = Airport::new();
        airport.load_str(CONFIG).unwrap();
        let err = airport.load_str("KSEA 47.45 -122.31\nroute 20 cart\n47 -122\npause abc\n");
        assert_eq!(err.unwrap_err().line(), Some(4));
        assert_eq!(airport.state, AirportState::NoConfig);
        assert!(airport.routes.is_empty());
        assert!(airport.paths.is_empty());
    }

    #[test]
    fn test_viewer_at_tower_activates() {
        let (airport, host, _) = active_airport();
        assert_eq!(airport.state, AirportState::Active);
        assert!(airport.tower.alt.is_some());
        assert!(airport.routes.iter().all(|r| r.objref.is_some()));
        assert!(host.probe_count > 0);
    }

    #[test]
    fn test_distant_viewer_stays_inactive() {
        let mut airport = Airport::new();
        airport.load_str(CONFIG).unwrap();
        let mut host = FlatEarthHost::new(airport.tower);
        let clock = SimClock::default();
        let poses = airport.frame(&mut host, &clock, &Point::new(9000.0, 0.0, 0.0), 0.1);
        assert!(poses.is_empty());
        assert_eq!(airport.state, AirportState::Inactive);
    }

    #[test]
    fn test_frame_returns_poses_nearest_first() {
        let (mut airport, mut host, mut clock) = active_airport();
        clock.advance(0.5);
        let poses = airport.frame(&mut host, &clock, &Point::default(), 0.5);
        assert_eq!(poses.len(), 3);
        let distances: Vec<f32> = poses.iter().map(|p| p.position.distance(&Point::default())).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1] + 1e-3));
    }

    #[test]
    fn test_lod_limits_draw_range() {
        let (mut airport, mut host, clock) = active_airport();
        assert!(airport.tower.alt.is_some());
        airport.lod = 1000.0;
        let poses = airport.frame(&mut host, &clock, &Point::new(0.0, 0.0, 500.0), 0.1);
        assert!(poses.is_empty());
        assert_eq!(airport.state, AirportState::Active);
    }

    #[test]
    fn test_missing_object_is_tolerated() {
        let mut airport = Airport::new();
        airport.load_str(CONFIG).unwrap();
        let mut host = FlatEarthHost::new(airport.tower);
        host.missing_objects.push("trailer.obj".to_string());
        let clock = SimClock::default();
        let poses = airport.frame(&mut host, &clock, &Point::default(), 0.0);
        assert_eq!(poses.len(), 3);
        assert_eq!(airport.routes[2].objref, None);
    }

    #[test]
    fn test_follower_trails_leader() {
        let (mut airport, mut host, mut clock) = active_airport();
        for _ in 0..40 {
            clock.advance(0.25);
            airport.frame(&mut host, &clock, &Point::default(), 0.25);
        }
        let leader = &airport.routes[1];
        let follower = &airport.routes[2];
        // 36 km/h = 10 m/s, so the trailer is 0.8 s behind
        assert!((follower.lag - 0.8).abs() < 1e-4);
        assert!((leader.odometer - follower.odometer - 0.8).abs() < 1e-3);
        assert!((leader.distance - follower.distance - 8.0).abs() < 0.1);
    }

    #[test]
    fn test_short_absence_resumes_long_absence_resets() {
        let (mut airport, mut host, mut clock) = active_airport();
        for _ in 0..20 {
            clock.advance(0.5);
            airport.frame(&mut host, &clock, &Point::default(), 0.5);
        }

        let far = Point::new(9000.0, 0.0, 0.0);
        for _ in 0..ACTIVE_POLL {
            clock.advance(0.5);
            airport.frame(&mut host, &clock, &far, 0.5);
        }
        assert_eq!(airport.state, AirportState::Inactive);
        let odometer = airport.routes[0].odometer;
        assert!(odometer > 0.0);
        for _ in 0..ACTIVE_POLL {
            clock.advance(0.5);
            airport.frame(&mut host, &clock, &Point::default(), 0.0);
        }
        assert_eq!(airport.state, AirportState::Active);
        assert!((airport.routes[0].odometer - odometer).abs() < 1e-3);

        for _ in 0..ACTIVE_POLL {
            airport.frame(&mut host, &clock, &far, 0.0);
        }
        assert_eq!(airport.state, AirportState::Inactive);
        clock.advance(RESET_TIME + 10.0);
        for _ in 0..ACTIVE_POLL {
            airport.frame(&mut host, &clock, &Point::default(), 0.0);
        }
        assert_eq!(airport.state, AirportState::Active);
        assert_eq!(airport.routes[0].odometer, 0.0);
    }

    #[test]
    fn test_scenery_shift_remaps_paths() {
        let (mut airport, mut host, clock) = active_airport();
        let before = airport.paths[0].nodes[0].p;
        host.shift_origin(GeoLocation::new(47.46, -122.31));
        airport.frame(&mut host, &clock, &Point::new(0.0, 0.0, 1100.0), 0.0);
        let after = airport.paths[0].nodes[0].p;
        assert!((after.z - before.z - 1111.9).abs() < 2.0);
    }

    #[test]
    fn test_user_dataref_value() {
        let mut airport = Airport::new();
        airport
            .load_str("KSEA 47.45 -122.31\nroute 20 cart\n47.45 -122.31\nset door rising 4\n")
            .unwrap();
        let mut host = FlatEarthHost::new(airport.tower);
        let clock = SimClock::default();
        airport.frame(&mut host, &clock, &Point::default(), 0.0);
        assert_eq!(airport.dataref_value("door", clock.monotonic + 2.0), Some(0.5));
        assert_eq!(airport.dataref_value("window", 0.0), None);
    }

    #[test]
    fn test_render_map_marks_waypoints_and_vehicles() {
        let (airport, _, _) = active_airport();
        let map = airport.render_map(40, 12);
        assert!(map.contains('+'));
        assert!(map.contains('V'));
        assert!(map.contains('.'));
        assert!(map.lines().count() == 12);
    }
}
