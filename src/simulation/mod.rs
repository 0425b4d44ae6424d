//! Standalone ground traffic simulation
//!
//! Everything needed to parse a scenery package's `groundtraffic.txt` and
//! animate its vehicles lives here, independent of the Bevy viewer. It can be
//! driven and tested from the console through [`FlatEarthHost`].

mod activation;
mod airport;
mod collision;
mod config;
mod datarefs;
mod geometry;
mod host;
mod parser;
mod path;
mod route;
mod train;
mod types;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use activation::{should_be_active, ActivationManager, Transition};
pub use airport::{Airport, AirportState};
#[allow(unused_imports)]
pub use collision::{detect_collisions, CollisionMap, SegmentKey};
#[allow(unused_imports)]
pub use config::{locate_config, ConfigWatcher, ReloadOutcome, CONFIG_FILE};
#[allow(unused_imports)]
pub use datarefs::{
    Activation, Curve, DatarefName, ExtRef, ExtRefSource, Published, SetTarget, Slope, UserRef,
    REF_BASE,
};
#[allow(unused_imports)]
pub use geometry::{heading_between, inside, intersect, segment_distance, Bezier};
pub use host::{FlatEarthHost, HostServices, ObjectHandle};
#[allow(unused_imports)]
pub use parser::{parse_config, AirportConfig, ConfigError};
#[allow(unused_imports)]
pub use path::{Collision, Departure, Path, PathNode, Schedule, SetCommand, WhenGate};
#[allow(unused_imports)]
pub use route::{PublishedValues, Route, RoutePose, RouteState};
#[allow(unused_imports)]
pub use train::{expand_train, TrainCar, TrainDef};
#[allow(unused_imports)]
pub use types::{
    DaySet, GeoLocation, PathId, Point, RouteId, SimClock, Weekday, ACTIVE_DISTANCE,
    ACTIVE_HYSTERESIS, ACTIVE_POLL, AT_INTERVAL, COLLISION_INTERVAL, COLLISION_TIMEOUT,
    DEFAULT_LOD, DRAW_DISTANCE, MAX_ATTIMES, MAX_NAME, MAX_TRAIN, MAX_VAR, RESET_TIME,
};
