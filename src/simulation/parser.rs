//! Parser for `groundtraffic.txt`
//!
//! The file is line oriented with whitespace separated tokens. A blank line
//! ends the current route or train block, `#` starts a comment line and a
//! leading UTF-8 BOM is ignored. The parser is a small state machine over
//! header / idle / route body / train body, with one function per line kind.
//! Any error aborts the whole parse.

use std::io;
use std::path::PathBuf;
use std::str::SplitWhitespace;

use thiserror::Error;

use super::datarefs::{Curve, DatarefName, ExtRef, ExtRefSource, SetTarget, Slope, UserRef};
use super::path::{Path, PathNode, Schedule, SetCommand, WhenGate};
use super::route::Route;
use super::train::{expand_train, TrainCar, TrainDef};
use super::types::{DaySet, GeoLocation, PathId, RouteId, Weekday, MAX_ATTIMES, MAX_NAME, MAX_TRAIN, MAX_VAR};

const BOM: char = '\u{feff}';

/// Longest pause [s]: just under a day
const MAX_PAUSE: u32 = 86399;

/// Everything that can go wrong loading a scenery package's config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Can't find my scenery folder {0}")]
    MissingPackage(PathBuf),

    #[error("Can't find groundtraffic.txt in {0}")]
    NotFound(PathBuf),

    #[error("Can't open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{message} at line {line}")]
    Syntax { line: usize, message: String },

    #[error("Can't read groundtraffic.txt: no airport header")]
    NoHeader,

    #[error("No routes defined!")]
    NoRoutes,
}

impl ConfigError {
    /// Line number of a syntax error
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// The model built from one config file
#[derive(Debug, Clone, Default)]
pub struct AirportConfig {
    pub icao: String,
    pub tower: Option<GeoLocation>,
    pub routes: Vec<Route>,
    pub paths: Vec<Path>,
    pub trains: Vec<TrainDef>,
    pub userrefs: Vec<UserRef>,
    pub extrefs: Vec<ExtRef>,
}

/// A route block being filled in
struct RouteBuilder {
    speed: f32,
    object: String,
    heading: f32,
    nodes: Vec<PathNode>,
}

enum Block {
    Idle,
    Route(RouteBuilder),
    Train(TrainDef),
}

/// Tokens of one line, tracking the line number for error messages
struct Tokens<'a> {
    iter: SplitWhitespace<'a>,
    line: usize,
}

impl<'a> Tokens<'a> {
    fn next(&mut self) -> Option<&'a str> {
        self.iter.next()
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ConfigError> {
        Err(ConfigError::Syntax {
            line: self.line,
            message: message.into(),
        })
    }

    /// Fail if anything is left on the line
    fn expect_end(&mut self) -> Result<(), ConfigError> {
        match self.iter.next() {
            Some(extra) => self.error(format!("Extraneous input \"{}\"", extra)),
            None => Ok(()),
        }
    }
}

fn parse_float(token: Option<&str>) -> Option<f32> {
    token
        .and_then(|t| t.parse::<f32>().ok())
        .filter(|v| v.is_finite())
}

fn parse_coord(token: Option<&str>) -> Option<f64> {
    token
        .and_then(|t| t.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// `HH:MM` to minutes past midnight
fn parse_time_of_day(token: &str) -> Option<u16> {
    let (hour, minute) = token.split_once(':')?;
    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !is_number(hour) || !is_number(minute) {
        return None;
    }
    let hour: u16 = hour.parse().ok()?;
    let minute: u16 = minute.parse().ok()?;
    (hour <= 23 && minute <= 59).then_some(hour * 60 + minute)
}

fn check_name(tokens: &Tokens, name: &str, what: &str) -> Result<(), ConfigError> {
    if name.len() > MAX_NAME - 1 {
        tokens.error(format!("{} name exceeds {} characters", what, MAX_NAME - 1))
    } else {
        Ok(())
    }
}

struct Parser {
    config: AirportConfig,
    block: Block,
    has_header: bool,
}

impl Parser {
    fn new() -> Self {
        Self {
            config: AirportConfig::default(),
            block: Block::Idle,
            has_header: false,
        }
    }

    fn line(&mut self, line: usize, text: &str) -> Result<(), ConfigError> {
        let mut tokens = Tokens {
            iter: text.split_whitespace(),
            line,
        };
        let Some(first) = tokens.next() else {
            return self.blank(line);
        };
        if first.starts_with('#') {
            return Ok(());
        }
        if !self.has_header {
            return self.header(first, &mut tokens);
        }

        match std::mem::replace(&mut self.block, Block::Idle) {
            Block::Route(mut builder) => {
                let still_open = self.route_line(&mut builder, first, &mut tokens)?;
                if still_open {
                    self.block = Block::Route(builder);
                } else {
                    self.finish_route(builder, line)?;
                }
            }
            Block::Train(mut train) => {
                self.train_line(&mut train, first, &mut tokens)?;
                self.block = Block::Train(train);
            }
            Block::Idle => {
                if first.eq_ignore_ascii_case("route") {
                    self.block = Block::Route(self.route_header(&mut tokens)?);
                } else if first.eq_ignore_ascii_case("train") {
                    self.block = Block::Train(self.train_header(&mut tokens)?);
                } else {
                    return tokens.error(format!("Expecting a route or train, found \"{}\"", first));
                }
            }
        }
        Ok(())
    }

    /// A blank line ends the current block
    fn blank(&mut self, line: usize) -> Result<(), ConfigError> {
        match std::mem::replace(&mut self.block, Block::Idle) {
            Block::Route(builder) => self.finish_route(builder, line),
            Block::Train(train) => self.finish_train(train, line),
            Block::Idle => Ok(()),
        }
    }

    fn header(&mut self, icao: &str, tokens: &mut Tokens) -> Result<(), ConfigError> {
        if icao.chars().count() != 4 {
            return tokens.error(format!(
                "Expecting a 4 character airport ICAO code, found \"{}\"",
                icao
            ));
        }
        let lat_token = tokens.next();
        let lon_token = tokens.next();
        match (parse_coord(lat_token), parse_coord(lon_token)) {
            (Some(lat), Some(lon)) => {
                tokens.expect_end()?;
                self.config.icao = icao.to_string();
                self.config.tower = Some(GeoLocation::new(lat, lon));
                self.has_header = true;
                Ok(())
            }
            _ => tokens.error(format!(
                "Expecting an airport \"lat lon\", found \"{} {}\"",
                lat_token.unwrap_or(""),
                lon_token.unwrap_or("")
            )),
        }
    }

    fn route_header(&self, tokens: &mut Tokens) -> Result<RouteBuilder, ConfigError> {
        let speed_token = tokens.next();
        let object = tokens.next();
        let (Some(speed), Some(object)) = (parse_float(speed_token), object) else {
            return tokens.error(format!(
                "Expecting a route \"speed object [heading]\", found \"{} {}\"",
                speed_token.unwrap_or(""),
                object.unwrap_or("")
            ));
        };
        if speed <= 0.0 {
            return tokens.error("Route speed must be greater than zero");
        }
        check_name(tokens, object, "Object")?;
        let heading = match tokens.next() {
            None => 0.0,
            Some(token) => match parse_float(Some(token)) {
                Some(heading) => heading,
                None => {
                    return tokens.error(format!(
                        "Expecting an object heading (or nothing), found \"{}\"",
                        token
                    ))
                }
            },
        };
        tokens.expect_end()?;

        Ok(RouteBuilder {
            // km/h to m/s
            speed: speed * 1000.0 / 3600.0,
            object: object.to_string(),
            heading,
            nodes: Vec::new(),
        })
    }

    fn train_header(&self, tokens: &mut Tokens) -> Result<TrainDef, ConfigError> {
        let Some(name) = tokens.next() else {
            return tokens.error("Expecting a train name");
        };
        check_name(tokens, name, "Train")?;
        tokens.expect_end()?;
        Ok(TrainDef::new(name))
    }

    fn train_line(
        &self,
        train: &mut TrainDef,
        object: &str,
        tokens: &mut Tokens,
    ) -> Result<(), ConfigError> {
        if train.is_full() {
            return tokens.error(format!("Exceeded {} objects in a train", MAX_TRAIN));
        }
        check_name(tokens, object, "Object")?;
        let offset_token = tokens.next();
        let Some(offset) = parse_float(offset_token) else {
            return tokens.error(format!(
                "Expecting an object offset, found \"{}\"",
                offset_token.unwrap_or("")
            ));
        };
        let heading = match tokens.next() {
            None => 0.0,
            Some(token) => match parse_float(Some(token)) {
                Some(heading) => heading,
                None => {
                    return tokens.error(format!(
                        "Expecting an object heading (or nothing), found \"{}\"",
                        token
                    ))
                }
            },
        };
        tokens.expect_end()?;
        train.cars.push(TrainCar {
            object: object.to_string(),
            offset,
            heading,
        });
        Ok(())
    }

    /// Handle one line inside a route block. Returns whether the block is
    /// still open afterwards.
    fn route_line(
        &mut self,
        builder: &mut RouteBuilder,
        first: &str,
        tokens: &mut Tokens,
    ) -> Result<bool, ConfigError> {
        let keyword = first.to_ascii_lowercase();
        let has_waypoint = !builder.nodes.is_empty();
        let require_waypoint = |tokens: &Tokens, what: &str| {
            if has_waypoint {
                Ok(())
            } else {
                tokens.error(format!("Route can't start with {}", what))
            }
        };

        match keyword.as_str() {
            "pause" => {
                require_waypoint(tokens, "a pause")?;
                let token = tokens.next();
                let Some(pause) = token.and_then(|t| t.parse::<i64>().ok()) else {
                    return tokens.error(format!(
                        "Expecting a pause time, found \"{}\"",
                        token.unwrap_or("")
                    ));
                };
                if pause <= 0 || pause > MAX_PAUSE as i64 {
                    return tokens.error(format!(
                        "Pause time should be between 1 and {} seconds",
                        MAX_PAUSE
                    ));
                }
                let set = match tokens.next() {
                    None => None,
                    Some(word) if word.eq_ignore_ascii_case("set") => {
                        Some(self.set_command(tokens)?)
                    }
                    Some(word) => return tokens.error(format!("Extraneous input \"{}\"", word)),
                };
                let node = last_node(builder, tokens)?;
                node.pause = Some(pause as u32);
                if set.is_some() {
                    node.set_after_pause = set;
                }
            }
            "at" => {
                require_waypoint(tokens, "an \"at\"")?;
                let schedule = self.schedule(tokens)?;
                last_node(builder, tokens)?.schedule = Some(schedule);
            }
            "reverse" => {
                if !has_waypoint {
                    return tokens.error("Empty route");
                }
                tokens.expect_end()?;
                last_node(builder, tokens)?.reverse = true;
                return Ok(false);
            }
            "backup" => {
                require_waypoint(tokens, "a backup")?;
                tokens.expect_end()?;
                last_node(builder, tokens)?.backup = true;
            }
            "when" | "and" => {
                require_waypoint(tokens, &format!("a \"{}\"", keyword))?;
                if keyword == "and" && last_node(builder, tokens)?.gates.is_empty() {
                    return tokens.error("\"and\" must follow a \"when\" at the same waypoint");
                }
                let gate = self.when_gate(tokens)?;
                let node = last_node(builder, tokens)?;
                if keyword == "when" {
                    node.gates.clear();
                }
                node.gates.push(gate);
            }
            "set" => {
                require_waypoint(tokens, "a \"set\"")?;
                let set = self.set_command(tokens)?;
                last_node(builder, tokens)?.set_on_arrival = Some(set);
            }
            _ => {
                let lon_token = tokens.next();
                match (parse_coord(Some(first)), parse_coord(lon_token)) {
                    (Some(lat), Some(lon)) => {
                        tokens.expect_end()?;
                        builder.nodes.push(PathNode::new(lat, lon));
                    }
                    _ => {
                        return tokens.error(format!(
                            "Expecting a waypoint \"lat lon\", found \"{} {}\"",
                            first,
                            lon_token.unwrap_or("")
                        ))
                    }
                }
            }
        }
        Ok(true)
    }

    /// `at HH:MM [HH:MM ...] [on day ...]`
    fn schedule(&self, tokens: &mut Tokens) -> Result<Schedule, ConfigError> {
        let mut times = Vec::new();
        let mut saw_on = false;
        while let Some(token) = tokens.next() {
            if token.eq_ignore_ascii_case("on") {
                saw_on = true;
                break;
            }
            if times.len() >= MAX_ATTIMES {
                return tokens.error(format!("Exceeded {} times-of-day", MAX_ATTIMES));
            }
            match parse_time_of_day(token) {
                Some(minute) => times.push(minute),
                None => {
                    return tokens.error(format!(
                        "Expecting a time-of-day \"HH:MM\" or \"on\", found \"{}\"",
                        token
                    ))
                }
            }
        }
        if times.is_empty() {
            return tokens.error("Expecting a time-of-day \"HH:MM\"");
        }

        let mut days = DaySet::ALL;
        if saw_on {
            days = DaySet::EMPTY;
            while let Some(token) = tokens.next() {
                match Weekday::from_prefix(token) {
                    Some(day) => days.insert(day),
                    None => return tokens.error(format!("Expecting a day name, found \"{}\"", token)),
                }
            }
            if days.is_empty() {
                return tokens.error("Expecting a day name after \"on\"");
            }
        }
        Ok(Schedule::new(times, days))
    }

    /// `<dataref> <from> <to>` after `when` or `and`
    fn when_gate(&mut self, tokens: &mut Tokens) -> Result<WhenGate, ConfigError> {
        let name_token = tokens.next();
        let Some(name) = name_token.and_then(DatarefName::parse) else {
            return tokens.error(format!(
                "Expecting a DataRef name, found \"{}\"",
                name_token.unwrap_or("")
            ));
        };
        let from_token = tokens.next();
        let to_token = tokens.next();
        let (Some(from), Some(to)) = (parse_float(from_token), parse_float(to_token)) else {
            return tokens.error(format!(
                "Expecting a DataRef range \"from to\", found \"{} {}\"",
                from_token.unwrap_or(""),
                to_token.unwrap_or("")
            ));
        };
        if from > to {
            return tokens.error(format!("DataRef range {} to {} is empty", from, to));
        }
        tokens.expect_end()?;
        Ok(WhenGate {
            extref: self.extref(name),
            from,
            to,
        })
    }

    /// `<dataref> <rising|falling> <duration> [linear|sine]` after `set`
    fn set_command(&mut self, tokens: &mut Tokens) -> Result<SetCommand, ConfigError> {
        let name_token = tokens.next();
        let Some(name) = name_token.and_then(DatarefName::parse) else {
            return tokens.error(format!(
                "Expecting a DataRef name, found \"{}\"",
                name_token.unwrap_or("")
            ));
        };
        let target = if let Some(idx) = name.var_index() {
            SetTarget::Var(idx)
        } else if name.name == "var" {
            return tokens.error(format!("Expecting var[0] to var[{}]", MAX_VAR - 1));
        } else if name.index.is_some() {
            return tokens.error(format!("Can't set an array DataRef \"{}\"", name));
        } else {
            SetTarget::User(self.userref(&name.name))
        };

        let slope_token = tokens.next();
        let slope = match slope_token.map(|t| t.to_ascii_lowercase()).as_deref() {
            Some("rising") => Slope::Rising,
            Some("falling") => Slope::Falling,
            _ => {
                return tokens.error(format!(
                    "Expecting \"rising\" or \"falling\", found \"{}\"",
                    slope_token.unwrap_or("")
                ))
            }
        };
        let duration_token = tokens.next();
        let Some(duration) = parse_float(duration_token).filter(|d| *d >= 0.0) else {
            return tokens.error(format!(
                "Expecting a duration, found \"{}\"",
                duration_token.unwrap_or("")
            ));
        };
        let curve = match tokens.next() {
            None => Curve::Linear,
            Some(token) if token.eq_ignore_ascii_case("linear") => Curve::Linear,
            Some(token) if token.eq_ignore_ascii_case("sine") => Curve::Sine,
            Some(token) => {
                return tokens.error(format!(
                    "Expecting \"linear\" or \"sine\" (or nothing), found \"{}\"",
                    token
                ))
            }
        };
        tokens.expect_end()?;
        Ok(SetCommand {
            target,
            slope,
            curve,
            duration,
        })
    }

    fn userref(&mut self, name: &str) -> usize {
        match self.config.userrefs.iter().position(|u| u.name == name) {
            Some(idx) => idx,
            None => {
                self.config.userrefs.push(UserRef::new(name));
                self.config.userrefs.len() - 1
            }
        }
    }

    fn extref(&mut self, name: DatarefName) -> usize {
        match self.config.extrefs.iter().position(|e| e.name == name) {
            Some(idx) => idx,
            None => {
                self.config.extrefs.push(ExtRef {
                    name,
                    source: ExtRefSource::Host,
                    warned: false,
                });
                self.config.extrefs.len() - 1
            }
        }
    }

    fn finish_route(&mut self, builder: RouteBuilder, line: usize) -> Result<(), ConfigError> {
        if builder.nodes.is_empty() {
            return Err(ConfigError::Syntax {
                line,
                message: "Empty route".to_string(),
            });
        }
        let path_id = PathId(self.config.paths.len());
        self.config.paths.push(Path::new(builder.nodes));

        let first_id = RouteId(self.config.routes.len());
        let route = Route::new(first_id, path_id, &builder.object, builder.speed, builder.heading);
        let cars = expand_train(&self.config.trains, route, first_id);
        self.config.routes.extend(cars);
        Ok(())
    }

    fn finish_train(&mut self, train: TrainDef, line: usize) -> Result<(), ConfigError> {
        if train.cars.is_empty() {
            return Err(ConfigError::Syntax {
                line,
                message: "Empty train".to_string(),
            });
        }
        self.config.trains.push(train);
        Ok(())
    }

    fn finish(mut self, last_line: usize) -> Result<AirportConfig, ConfigError> {
        // A block still open at end of file ends as if followed by a blank line
        self.blank(last_line)?;
        if !self.has_header {
            return Err(ConfigError::NoHeader);
        }
        if self.config.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        // Gates naming one of our own user datarefs read it directly
        let userrefs = &self.config.userrefs;
        for extref in &mut self.config.extrefs {
            if extref.name.index.is_none() {
                if let Some(idx) = userrefs.iter().position(|u| u.name == extref.name.name) {
                    extref.source = ExtRefSource::Mine(idx);
                }
            }
        }
        Ok(self.config)
    }
}

fn last_node<'b>(builder: &'b mut RouteBuilder, tokens: &Tokens) -> Result<&'b mut PathNode, ConfigError> {
    match builder.nodes.last_mut() {
        Some(node) => Ok(node),
        None => tokens.error("Empty route"),
    }
}

/// Parse the text of a `groundtraffic.txt` file
pub fn parse_config(text: &str) -> Result<AirportConfig, ConfigError> {
    let mut parser = Parser::new();
    let mut line_count = 0;
    for (i, line) in text.lines().enumerate() {
        let line = if i == 0 {
            line.strip_prefix(BOM).unwrap_or(line)
        } else {
            line
        };
        line_count = i + 1;
        parser.line(line_count, line)?;
    }
    parser.finish(line_count + 1)
}
