//! Core types for the ground traffic simulation
//!
//! These are standalone types that don't depend on Bevy or on any host
//! simulator API.

use std::fmt;

/// How many frames between checks of whether the viewer is in range
pub const ACTIVE_POLL: u32 = 16;

/// Distance [m] from the tower location at which the airport wakes up
pub const ACTIVE_DISTANCE: f32 = 6000.0;

/// Band either side of `ACTIVE_DISTANCE` that prevents flicker
pub const ACTIVE_HYSTERESIS: f32 = ACTIVE_DISTANCE * 0.05;

/// Distance [m] from a vehicle at which it is drawn. Divided by the LOD value.
pub const DRAW_DISTANCE: f32 = 3500.0;

/// Equivalent to "medium" world detail distance
pub const DEFAULT_LOD: f32 = 2.25;

/// How often [s] to probe ahead for terrain altitude
pub const PROBE_INTERVAL: f32 = 4.0;

/// Time [s] to execute a turn at a waypoint
pub const TURN_TIME: f32 = 2.0;

/// How often [s] to poll for `at` times
pub const AT_INTERVAL: f32 = 60.0;

/// How often [s] to poll `when` dataref values
pub const WHEN_INTERVAL: f32 = 1.0;

/// How often [s] to poll for a crossing route's path to become free
pub const COLLISION_INTERVAL: f32 = 4.0;

/// How many collision polls before giving up to break a deadlock
pub const COLLISION_TIMEOUT: u32 = (60.0 / COLLISION_INTERVAL) as u32;

/// Segments closer than this [m] are treated as colliding
pub const COLLISION_TOLERANCE: f32 = 1.0;

/// If deactivated for longer than this [s], route timings are reset
pub const RESET_TIME: f32 = 15.0;

/// Number of per-route `var` datarefs
pub const MAX_VAR: usize = 10;

/// Number of times allowed in an `at` command
pub const MAX_ATTIMES: usize = 24;

/// Number of objects allowed in a train
pub const MAX_TRAIN: usize = 16;

/// Limit on object and train name lengths
pub const MAX_NAME: usize = 256;

/// Nominal wheelbase [m] used for the cosmetic steer angle
pub const WHEELBASE: f32 = 3.0;

/// Seconds in a day
pub const SECONDS_PER_DAY: f32 = 86400.0;

/// Index of a route in the airport's route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a path in the airport's path table.
///
/// A path is owned by the route that declared it (the train leader) and
/// referenced by every follower car of that train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(pub usize);

/// A geodetic location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
    /// `None` until probed against the host terrain
    pub alt: Option<f64>,
}

impl GeoLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, alt: None }
    }
}

/// A point in renderer-local coordinates.
///
/// `x` points east, `y` up and `z` south, so that headings measured
/// clockwise from north follow the host renderer's convention.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance ignoring altitude
    pub fn distance_2d(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn lerp(&self, other: &Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Point `distance` metres from here towards `other` (in the x/z plane)
    pub fn towards(&self, other: &Point, distance: f32) -> Point {
        let len = self.distance_2d(other);
        if len > 0.0 {
            self.lerp(other, distance / len)
        } else {
            *self
        }
    }
}

/// Day of the week, numbered from Sunday as the host clock reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weekday {
    Sunday = 0,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Names in the order the config file's prefix matching checks them
    pub const MATCH_ORDER: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn from_index(index: u32) -> Weekday {
        match index % 7 {
            0 => Weekday::Sunday,
            1 => Weekday::Monday,
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            _ => Weekday::Saturday,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn next(self) -> Weekday {
        Weekday::from_index(self.index() + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Sunday => "sunday",
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
        }
    }

    /// Case-insensitive prefix match against the full day names,
    /// checking Monday first and Sunday last
    pub fn from_prefix(token: &str) -> Option<Weekday> {
        if token.is_empty() {
            return None;
        }
        let token = token.to_ascii_lowercase();
        Weekday::MATCH_ORDER
            .into_iter()
            .find(|day| day.name().starts_with(&token))
    }
}

/// A set of weekdays, one bit per day with Sunday as bit 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySet(u8);

impl DaySet {
    pub const EMPTY: DaySet = DaySet(0);
    pub const ALL: DaySet = DaySet(0x7f);

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.index();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for DaySet {
    fn default() -> Self {
        DaySet::ALL
    }
}

/// The host's notion of time for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    /// Monotonic seconds since the host started
    pub monotonic: f32,
    /// Seconds since local midnight
    pub time_of_day: f32,
    pub weekday: Weekday,
}

impl SimClock {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self {
            monotonic: 0.0,
            time_of_day: (hour * 3600 + minute * 60) as f32,
            weekday,
        }
    }

    /// Minutes past midnight
    pub fn minute_of_day(&self) -> u16 {
        (self.time_of_day / 60.0).floor() as u16
    }

    /// Advance both clocks, rolling over to the next day at midnight
    pub fn advance(&mut self, delta_secs: f32) {
        self.monotonic += delta_secs;
        self.time_of_day += delta_secs;
        while self.time_of_day >= SECONDS_PER_DAY {
            self.time_of_day -= SECONDS_PER_DAY;
            self.weekday = self.weekday.next();
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(Weekday::Monday, 12, 0)
    }
}

#[inline]
pub fn r2d(r: f32) -> f32 {
    r.to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_prefix_matching() {
        assert_eq!(Weekday::from_prefix("MON"), Some(Weekday::Monday));
        assert_eq!(Weekday::from_prefix("t"), Some(Weekday::Tuesday));
        assert_eq!(Weekday::from_prefix("th"), Some(Weekday::Thursday));
        assert_eq!(Weekday::from_prefix("Sunday"), Some(Weekday::Sunday));
        assert_eq!(Weekday::from_prefix("sundays"), None);
        assert_eq!(Weekday::from_prefix("x"), None);
    }

    #[test]
    fn test_clock_rolls_over_midnight() {
        let mut clock = SimClock::new(Weekday::Saturday, 23, 59);
        clock.advance(90.0);
        assert_eq!(clock.weekday, Weekday::Sunday);
        assert_eq!(clock.minute_of_day(), 0);
        assert!((clock.monotonic - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_collision_timeout_covers_a_minute() {
        assert_eq!(COLLISION_TIMEOUT, 15);
        assert!((ACTIVE_DISTANCE - ACTIVE_HYSTERESIS - 5700.0).abs() < 1e-3);
    }
}
