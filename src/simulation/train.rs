//! Train definitions and their expansion into linked routes

use super::route::Route;
use super::types::{PathId, RouteId, MAX_TRAIN};

/// One car of a train definition
#[derive(Debug, Clone, PartialEq)]
pub struct TrainCar {
    pub object: String,
    /// Distance [m] behind the train's reference point
    pub offset: f32,
    /// Heading [deg] added to the route's own heading. Not cumulative: the
    /// first car's heading doesn't turn the cars behind it.
    pub heading: f32,
}

/// A named template of up to `MAX_TRAIN` cars. Never simulated directly.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainDef {
    pub name: String,
    pub cars: Vec<TrainCar>,
}

impl TrainDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cars: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.cars.len() >= MAX_TRAIN
    }
}

/// Replicate a freshly closed route into one route per car if its object
/// names a train.
///
/// The first car keeps the parsed route (and owns its path); every further
/// car is a copy that shares the path and points back at the first.
/// Returns the routes to append, with ids starting at `first_id`.
pub fn expand_train(trains: &[TrainDef], route: Route, first_id: RouteId) -> Vec<Route> {
    let Some(train) = trains.iter().find(|t| t.name == route.object) else {
        return vec![route];
    };

    let leader_id = first_id;
    let base_heading = route.heading;
    let path: PathId = route.path;

    train
        .cars
        .iter()
        .take(MAX_TRAIN)
        .enumerate()
        .map(|(i, car)| {
            let mut replica = route.clone();
            replica.id = RouteId(first_id.0 + i);
            replica.path = path;
            replica.parent = if i == 0 { None } else { Some(leader_id) };
            replica.object = car.object.clone();
            replica.heading = base_heading + car.heading;
            replica.lag = if replica.speed > 0.0 {
                car.offset / replica.speed
            } else {
                0.0
            };
            replica.next_time = -replica.lag;
            replica
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baggage_train() -> TrainDef {
        TrainDef {
            name: "baggage".to_string(),
            cars: vec![
                TrainCar {
                    object: "tug.obj".to_string(),
                    offset: 0.0,
                    heading: 0.0,
                },
                TrainCar {
                    object: "cart.obj".to_string(),
                    offset: 5.0,
                    heading: 0.0,
                },
                TrainCar {
                    object: "cart.obj".to_string(),
                    offset: 10.0,
                    heading: 180.0,
                },
            ],
        }
    }

    #[test]
    fn test_non_train_route_is_untouched() {
        let route = Route::new(RouteId(3), PathId(1), "fuel.obj", 10.0, 90.0);
        let expanded = expand_train(&[baggage_train()], route.clone(), RouteId(3));
        assert_eq!(expanded, vec![route]);
    }

    #[test]
    fn test_train_expands_into_linked_cars() {
        // 18 km/h = 5 m/s
        let route = Route::new(RouteId(4), PathId(2), "baggage", 5.0, 90.0);
        let cars = expand_train(&[baggage_train()], route, RouteId(4));
        assert_eq!(cars.len(), 3);
        assert!(cars.iter().all(|c| c.path == PathId(2)));
        assert_eq!(cars[0].parent, None);
        assert_eq!(cars[1].parent, Some(RouteId(4)));
        assert_eq!(cars[2].id, RouteId(6));
        assert_eq!(cars[1].object, "cart.obj");
        assert!((cars[1].lag - 1.0).abs() < 1e-6);
        assert!((cars[2].lag - 2.0).abs() < 1e-6);
        assert!((cars[2].next_time + 2.0).abs() < 1e-6);
        assert!((cars[2].heading - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_car_headings_are_relative_to_the_route() {
        let mut train = baggage_train();
        train.cars[0].heading = 90.0;
        let route = Route::new(RouteId(0), PathId(0), "baggage", 5.0, 10.0);
        let cars = expand_train(&[train], route, RouteId(0));
        let headings: Vec<f32> = cars.iter().map(|c| c.heading).collect();
        assert_eq!(headings, vec![100.0, 10.0, 190.0]);
    }

    #[test]
    fn test_train_name_match_is_case_sensitive() {
        let route = Route::new(RouteId(0), PathId(0), "Baggage", 5.0, 0.0);
        assert_eq!(expand_train(&[baggage_train()], route, RouteId(0)).len(), 1);
    }
}
