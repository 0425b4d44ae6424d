//! Named values shared with the host
//!
//! Three kinds of value live here:
//! - the values this crate publishes for every drawn vehicle ([`Published`]),
//! - user-defined datarefs driven by `set` commands ([`UserRef`], [`Activation`]),
//! - external datarefs read by `when`/`and` gates ([`ExtRef`]).

use std::f32::consts::PI;

use super::types::MAX_VAR;

pub const REF_BASE: &str = "marginal/groundtraffic/";

/// Per-vehicle values published to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Published {
    Distance,
    Speed,
    Steer,
    NodeLast,
    NodeLastDistance,
    NodeNext,
    NodeNextDistance,
    Var,
}

impl Published {
    pub const ALL: [Published; 8] = [
        Published::Distance,
        Published::Speed,
        Published::Steer,
        Published::NodeLast,
        Published::NodeLastDistance,
        Published::NodeNext,
        Published::NodeNextDistance,
        Published::Var,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Published::Distance => "marginal/groundtraffic/distance",
            Published::Speed => "marginal/groundtraffic/speed",
            Published::Steer => "marginal/groundtraffic/steer",
            Published::NodeLast => "marginal/groundtraffic/waypoint/last",
            Published::NodeLastDistance => "marginal/groundtraffic/waypoint/last/distance",
            Published::NodeNext => "marginal/groundtraffic/waypoint/next",
            Published::NodeNextDistance => "marginal/groundtraffic/waypoint/next/distance",
            Published::Var => "marginal/groundtraffic/var",
        }
    }

    /// Name without the common prefix, for console output
    pub fn short_name(self) -> &'static str {
        self.name().strip_prefix(REF_BASE).unwrap_or(self.name())
    }
}

/// A dataref reference as written in the config file: `name` or `name[idx]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatarefName {
    pub name: String,
    pub index: Option<usize>,
}

impl DatarefName {
    /// Split `name[idx]`; returns `None` for a malformed index or empty name
    pub fn parse(token: &str) -> Option<DatarefName> {
        match token.find('[') {
            None => {
                if token.is_empty() || token.contains(']') {
                    None
                } else {
                    Some(DatarefName {
                        name: token.to_string(),
                        index: None,
                    })
                }
            }
            Some(open) => {
                let rest = token[open + 1..].strip_suffix(']')?;
                let index = rest.parse::<usize>().ok()?;
                if open == 0 {
                    return None;
                }
                Some(DatarefName {
                    name: token[..open].to_string(),
                    index: Some(index),
                })
            }
        }
    }

    /// Index into the per-route `var` array, if this names one
    pub fn var_index(&self) -> Option<usize> {
        if self.name == "var" || self.name == Published::Var.name() {
            self.index.filter(|idx| *idx < MAX_VAR)
        } else {
            None
        }
    }
}

impl std::fmt::Display for DatarefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(idx) => write!(f, "{}[{}]", self.name, idx),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slope {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Curve {
    #[default]
    Linear,
    Sine,
}

/// One run of a user dataref's activation curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    pub start: f32,
    pub duration: f32,
    pub slope: Slope,
    pub curve: Curve,
}

impl Activation {
    /// Value in `[0, 1]` at the given monotonic time
    pub fn value(&self, now: f32) -> f32 {
        let t = if self.duration > 0.0 {
            ((now - self.start) / self.duration).clamp(0.0, 1.0)
        } else if now >= self.start {
            1.0
        } else {
            0.0
        };
        let shaped = match self.curve {
            Curve::Linear => t,
            Curve::Sine => (1.0 - (PI * t).cos()) / 2.0,
        };
        match self.slope {
            Slope::Rising => shaped,
            Slope::Falling => 1.0 - shaped,
        }
    }

    pub fn shift(&mut self, delta: f32) {
        self.start += delta;
    }
}

/// Which dataref a `set` command drives
#[derive(Debug, Clone, PartialEq)]
pub enum SetTarget {
    /// Per-route `var[n]`
    Var(usize),
    /// Airport-wide user dataref, by index into the airport's table
    User(usize),
}

/// An airport-wide user-defined dataref
#[derive(Debug, Clone, PartialEq)]
pub struct UserRef {
    pub name: String,
    pub activation: Option<Activation>,
}

impl UserRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            activation: None,
        }
    }

    pub fn value(&self, now: f32) -> f32 {
        self.activation.map(|a| a.value(now)).unwrap_or(0.0)
    }
}

/// How an external dataref named in a gate is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtRefSource {
    /// One of this airport's user datarefs
    Mine(usize),
    /// Looked up through the host each poll
    Host,
}

/// An external dataref referenced by `when`/`and` clauses
#[derive(Debug, Clone, PartialEq)]
pub struct ExtRef {
    pub name: DatarefName,
    pub source: ExtRefSource,
    /// Set once the missing-value warning has been logged
    pub warned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataref_names() {
        let plain = DatarefName::parse("sim/flightmodel/door").unwrap();
        assert_eq!(plain.index, None);
        let indexed = DatarefName::parse("sim/cockpit/switches[3]").unwrap();
        assert_eq!(indexed.name, "sim/cockpit/switches");
        assert_eq!(indexed.index, Some(3));
        assert_eq!(indexed.to_string(), "sim/cockpit/switches[3]");
        assert!(DatarefName::parse("bad[x]").is_none());
        assert!(DatarefName::parse("[2]").is_none());
        assert!(DatarefName::parse("bad]").is_none());
    }

    #[test]
    fn test_var_index_limits() {
        assert_eq!(DatarefName::parse("var[9]").unwrap().var_index(), Some(9));
        assert_eq!(DatarefName::parse("var[10]").unwrap().var_index(), None);
        assert_eq!(DatarefName::parse("door").unwrap().var_index(), None);
    }

    #[test]
    fn test_activation_curves() {
        let rising = Activation {
            start: 10.0,
            duration: 4.0,
            slope: Slope::Rising,
            curve: Curve::Linear,
        };
        assert_eq!(rising.value(5.0), 0.0);
        assert!((rising.value(12.0) - 0.5).abs() < 1e-6);
        assert_eq!(rising.value(20.0), 1.0);

        let falling_sine = Activation {
            slope: Slope::Falling,
            curve: Curve::Sine,
            ..rising
        };
        assert!((falling_sine.value(12.0) - 0.5).abs() < 1e-6);
        assert!((falling_sine.value(11.0) - 0.853_553).abs() < 1e-4);
    }

    #[test]
    fn test_published_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for p in Published::ALL {
            assert!(seen.insert(p.name()));
            assert!(p.name().starts_with(REF_BASE));
            assert!(!p.short_name().contains("groundtraffic"));
        }
        assert_eq!(Published::NodeLastDistance.short_name(), "waypoint/last/distance");
    }
}
