//! Effective car values
//!
//! A car inherits its class-derived fields from its car class unless the
//! same-named `*_override` is set on the car. A set override always wins,
//! even when it is the empty string; a class value only counts when it is
//! non-empty.

use crate::models::{Car, CarClass, Railroad};
use serde::Serialize;

/// Class-derived fields of a car after override resolution
///
/// `None` means neither source supplies a value ("unspecified").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveCar {
    pub car_type: Option<String>,
    pub power_type: Option<String>,
    pub is_locomotive: Option<bool>,
    pub wheel_arrangement: Option<String>,
    pub tender_axles: Option<String>,
    pub capacity: Option<String>,
    pub weight: Option<String>,
    pub load_limit: Option<String>,
    pub aar_plate: Option<String>,
    pub internal_length: Option<String>,
    pub internal_width: Option<String>,
    pub internal_height: Option<String>,
}

impl EffectiveCar {
    /// Locomotive flag, treating "unspecified" as rolling stock
    pub fn is_locomotive_or_default(&self) -> bool {
        self.is_locomotive.unwrap_or(false)
    }
}

/// Resolve a car against its (optional) car class. Pure.
pub fn resolve(car: &Car, car_class: Option<&CarClass>) -> EffectiveCar {
    EffectiveCar {
        car_type: inherit(&car.car_type_override, car_class.map(|c| &c.car_type)),
        power_type: inherit(&car.power_type_override, car_class.map(|c| &c.power_type)),
        is_locomotive: car
            .is_locomotive_override
            .or_else(|| car_class.and_then(|c| c.is_locomotive)),
        wheel_arrangement: inherit(
            &car.wheel_arrangement_override,
            car_class.map(|c| &c.wheel_arrangement),
        ),
        tender_axles: inherit(&car.tender_axles_override, car_class.map(|c| &c.tender_axles)),
        capacity: inherit(&car.capacity_override, car_class.map(|c| &c.capacity)),
        weight: inherit(&car.weight_override, car_class.map(|c| &c.weight)),
        load_limit: inherit(&car.load_limit_override, car_class.map(|c| &c.load_limit)),
        aar_plate: inherit(&car.aar_plate_override, car_class.map(|c| &c.aar_plate)),
        internal_length: inherit(
            &car.internal_length_override,
            car_class.map(|c| &c.internal_length),
        ),
        internal_width: inherit(
            &car.internal_width_override,
            car_class.map(|c| &c.internal_width),
        ),
        internal_height: inherit(
            &car.internal_height_override,
            car_class.map(|c| &c.internal_height),
        ),
    }
}

fn inherit(over: &Option<String>, class_value: Option<&Option<String>>) -> Option<String> {
    if over.is_some() {
        return over.clone();
    }
    class_value
        .and_then(|v| v.as_deref())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reporting mark shown for a car
///
/// The railroad's mark when a railroad is assigned, otherwise the car's own
/// `reporting_mark_override`. Either may be blank.
pub fn resolve_reporting_mark(car: &Car, railroad: Option<&Railroad>) -> Option<String> {
    match railroad {
        Some(railroad) => railroad.reporting_mark.clone(),
        None => car.reporting_mark_override.clone(),
    }
}
