//! Inventory models
//!
//! Rows arrive as generic column maps (column name → JSON value) so that
//! snapshots from older schema revisions, which lack later columns, still
//! decode: absent columns become `None`.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One source row keyed by column name
pub type Row = Map<String, Value>;

/// Tables of the relational snapshot, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    Railroads,
    CarClasses,
    Locations,
    Cars,
    Loads,
    LoadPlacements,
    RailroadColorSchemes,
    RailroadLogos,
    RailroadSlogans,
}

impl SourceTable {
    /// Every table, independent lookups first
    pub const ALL: [SourceTable; 9] = [
        SourceTable::Railroads,
        SourceTable::CarClasses,
        SourceTable::Locations,
        SourceTable::Cars,
        SourceTable::Loads,
        SourceTable::LoadPlacements,
        SourceTable::RailroadColorSchemes,
        SourceTable::RailroadLogos,
        SourceTable::RailroadSlogans,
    ];

    /// SQL table name in the snapshot
    pub fn table_name(self) -> &'static str {
        match self {
            SourceTable::Railroads => "railroads",
            SourceTable::CarClasses => "car_classes",
            SourceTable::Locations => "locations",
            SourceTable::Cars => "cars",
            SourceTable::Loads => "loads",
            SourceTable::LoadPlacements => "load_placements",
            SourceTable::RailroadColorSchemes => "railroad_color_schemes",
            SourceTable::RailroadLogos => "railroad_logos",
            SourceTable::RailroadSlogans => "railroad_slogans",
        }
    }

    /// `type` tag and `_id` prefix of the documents
    pub fn doc_type(self) -> &'static str {
        match self {
            SourceTable::Railroads => "railroad",
            SourceTable::CarClasses => "car_class",
            SourceTable::Locations => "location",
            SourceTable::Cars => "car",
            SourceTable::Loads => "load",
            SourceTable::LoadPlacements => "load_placement",
            SourceTable::RailroadColorSchemes => "railroad_color_scheme",
            SourceTable::RailroadLogos => "railroad_logo",
            SourceTable::RailroadSlogans => "railroad_slogan",
        }
    }

    /// Key in the `counters` document that allocates ids for this table
    pub fn counter_key(self) -> &'static str {
        self.table_name()
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A model decoded from one snapshot row
pub trait Record: DeserializeOwned + Serialize {
    const TABLE: SourceTable;

    /// Integer primary key in the snapshot
    fn source_id(&self) -> i64;

    /// Canonicalize values after decoding
    fn normalize(&mut self) {}
}

/// Decode and normalize one row
pub fn from_row<T: Record>(row: Row) -> Result<T> {
    let id_hint = row.get("id").cloned().unwrap_or(Value::Null);
    let mut record: T = serde_json::from_value(Value::Object(row)).map_err(|e| {
        Error::InvalidRecord {
            table: T::TABLE.table_name().to_string(),
            message: format!("row id {}: {}", id_hint, e),
        }
    })?;
    record.normalize();
    Ok(record)
}

/// Empty or whitespace-only text counts as unset
fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Railroad {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reporting_mark: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub merged_into: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub merged_from: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
    /// References `railroad_logos`
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub representative_logo_id: Option<i64>,
}

impl Record for Railroad {
    const TABLE: SourceTable = SourceTable::Railroads;

    fn source_id(&self) -> i64 {
        self.id
    }
}

/// Template of shared defaults for a group of cars
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarClass {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub car_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub power_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub wheel_arrangement: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub tender_axles: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub is_locomotive: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub era: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub load_limit: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub aar_plate: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub capacity: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub internal_length: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub internal_width: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub internal_height: Option<String>,
}

impl Record for CarClass {
    const TABLE: SourceTable = SourceTable::CarClasses;

    fn source_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub location_type: Option<String>,
    /// Self-reference into `locations`
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub parent_id: Option<i64>,
}

impl Record for Location {
    const TABLE: SourceTable = SourceTable::Locations;

    fn source_id(&self) -> i64 {
        self.id
    }
}

/// An individual piece of rolling stock
///
/// Every `*_override` field shadows the car class's value of the same name
/// when set; see [`crate::resolver`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Car {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub railroad_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub car_class_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub location_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub car_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reporting_mark_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub upc: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub dcc_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub traction_drivers: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub car_type_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub power_type_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub wheel_arrangement_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub tender_axles_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub is_locomotive_override: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub capacity_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub weight_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub load_limit_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub aar_plate_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub built: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub alt_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub reweight_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub repack_bearings_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub other_lettering: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub msrp: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub load: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub repairs_required: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub internal_length_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub internal_width_override: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub internal_height_override: Option<String>,

    // Early schema stored these directly on the car.
    #[serde(
        rename = "car_type",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing
    )]
    pub legacy_car_type: Option<String>,
    #[serde(
        rename = "reporting_mark",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing
    )]
    pub legacy_reporting_mark: Option<String>,
    #[serde(
        rename = "is_locomotive",
        default,
        deserialize_with = "lenient::opt_bool",
        skip_serializing
    )]
    pub legacy_is_locomotive: Option<bool>,
}

impl Car {
    fn override_fields_mut(&mut self) -> [&mut Option<String>; 12] {
        [
            &mut self.reporting_mark_override,
            &mut self.car_type_override,
            &mut self.power_type_override,
            &mut self.wheel_arrangement_override,
            &mut self.tender_axles_override,
            &mut self.capacity_override,
            &mut self.weight_override,
            &mut self.load_limit_override,
            &mut self.aar_plate_override,
            &mut self.internal_length_override,
            &mut self.internal_width_override,
            &mut self.internal_height_override,
        ]
    }
}

impl Record for Car {
    const TABLE: SourceTable = SourceTable::Cars;

    fn source_id(&self) -> i64 {
        self.id
    }

    /// Blank overrides become unset, then legacy columns fill unset overrides
    fn normalize(&mut self) {
        for field in self.override_fields_mut() {
            blank_to_none(field);
        }
        blank_to_none(&mut self.legacy_car_type);
        blank_to_none(&mut self.legacy_reporting_mark);

        if self.car_type_override.is_none() {
            self.car_type_override = self.legacy_car_type.take();
        }
        if self.reporting_mark_override.is_none() {
            self.reporting_mark_override = self.legacy_reporting_mark.take();
        }
        if self.is_locomotive_override.is_none() {
            // The early schema defaulted this column to false for every car.
            self.is_locomotive_override = self.legacy_is_locomotive.take().filter(|v| *v);
        }
    }
}

/// A kind of load that can be placed in cars or at locations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadType {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub car_class_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub railroad_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub era: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub lettering: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub msrp: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub upc: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub length: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub repairs_required: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

impl Record for LoadType {
    const TABLE: SourceTable = SourceTable::Loads;

    fn source_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadPlacement {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub load_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub car_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub location_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub quantity: Option<i64>,
}

impl Record for LoadPlacement {
    const TABLE: SourceTable = SourceTable::LoadPlacements;

    fn source_id(&self) -> i64 {
        self.id
    }

    fn normalize(&mut self) {
        if matches!(self.quantity, None | Some(0)) {
            self.quantity = Some(1);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RailroadColorScheme {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub railroad_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub colors: Option<String>,
}

impl Record for RailroadColorScheme {
    const TABLE: SourceTable = SourceTable::RailroadColorSchemes;

    fn source_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RailroadLogo {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub railroad_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub image_path: Option<String>,
}

impl Record for RailroadLogo {
    const TABLE: SourceTable = SourceTable::RailroadLogos;

    fn source_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RailroadSlogan {
    #[serde(deserialize_with = "lenient::id", skip_serializing)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub railroad_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub slogan_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_date: Option<String>,
}

impl Record for RailroadSlogan {
    const TABLE: SourceTable = SourceTable::RailroadSlogans;

    fn source_id(&self) -> i64 {
        self.id
    }
}

/// Deserializers that accept the loose typing of SQLite columns
mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(D::Error::custom(format!("expected text, got {}", other))),
        }
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::Number(n)) => Ok(Some(n.as_f64().is_some_and(|v| v != 0.0))),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "1" | "true" | "t" | "yes" | "y" => Ok(Some(true)),
                "0" | "false" | "f" | "no" | "n" => Ok(Some(false)),
                other => Err(D::Error::custom(format!("expected boolean, got {:?}", other))),
            },
            Some(other) => Err(D::Error::custom(format!("expected boolean, got {}", other))),
        }
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => integer(&value).map(Some).map_err(D::Error::custom),
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Err(D::Error::custom("primary key is null")),
            Some(value) => integer(&value).map_err(D::Error::custom),
        }
    }

    fn integer(value: &Value) -> Result<i64, String> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| format!("expected integer, got {}", n)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("expected integer, got {:?}", s)),
            other => Err(format!("expected integer, got {}", other)),
        }
    }
}
