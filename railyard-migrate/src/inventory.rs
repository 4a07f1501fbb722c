//! Inventory spreadsheet import
//!
//! A CSV export of the collection spreadsheet (one row per car) is staged
//! into a relational [`Snapshot`]: railroads, car classes and locations are
//! deduplicated out of the car rows and given sequential ids. The staged
//! snapshot then goes through the same importer as a SQLite snapshot.
//!
//! Staging rules:
//! - railroads match by reporting mark, then by name
//! - car classes match by code; the first non-empty value seen fills each
//!   class field
//! - locations match by name; the type is inferred from the name
//! - with a class, a car value becomes an override only where it differs
//!   from the class value; without one, every supplied value is an override

use railyard_common::locations::infer_location_type;
use railyard_common::models::{Car, CarClass, Location, Railroad};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{MigrateError, Result};
use crate::snapshot::Snapshot;

/// One spreadsheet row; unknown columns are ignored, missing ones are empty
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InventoryRow {
    #[serde(rename = "Reporting Mark")]
    pub reporting_mark: String,
    #[serde(rename = "Railroad")]
    pub railroad: String,
    #[serde(rename = "Car Class")]
    pub car_class: String,
    #[serde(rename = "Car Type")]
    pub car_type: String,
    #[serde(rename = "Wheel Arrangement")]
    pub wheel_arrangement: String,
    #[serde(rename = "Tender Axles")]
    pub tender_axles: String,
    #[serde(rename = "Capacity (Lettering)")]
    pub capacity: String,
    #[serde(rename = "Weight (Lettering)")]
    pub weight: String,
    #[serde(rename = "Load Limit")]
    pub load_limit: String,
    #[serde(rename = "AAR Plate")]
    pub aar_plate: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "UPC")]
    pub upc: String,
    #[serde(rename = "Car #")]
    pub car_number: String,
    #[serde(rename = "DCC ID")]
    pub dcc_id: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    #[serde(rename = "Traction Drivers")]
    pub traction_drivers: String,
    #[serde(rename = "Built (Lettering)")]
    pub built: String,
    #[serde(rename = "Alt Date")]
    pub alt_date: String,
    #[serde(rename = "Reweight date")]
    pub reweight_date: String,
    #[serde(rename = "Other Lettering")]
    pub other_lettering: String,
    #[serde(rename = "MSRP")]
    pub msrp: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Load")]
    pub load: String,
    // Spreadsheet exports have mangled the apostrophe more than one way.
    #[serde(
        rename = "Repairs Req’d",
        alias = "Repairs Reqâ€™d",
        alias = "Repairs Req'd"
    )]
    pub repairs_required: String,
}

/// Read an inventory CSV file
pub async fn read_inventory(path: &Path) -> Result<Vec<InventoryRow>> {
    if !path.exists() {
        return Err(MigrateError::SnapshotNotFound(path.to_path_buf()));
    }
    let content = tokio::fs::read_to_string(path).await?;
    let rows = parse_inventory(&content)?;
    info!("Read {} inventory rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parse inventory CSV text (header row first, optional UTF-8 BOM)
pub fn parse_inventory(content: &str) -> Result<Vec<InventoryRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Stage spreadsheet rows into a relational snapshot
pub fn stage(rows: &[InventoryRow]) -> Snapshot {
    let mut staging = Staging::default();
    for row in rows {
        staging.add_car(row);
    }
    let snapshot = staging.snapshot;
    info!(
        "✓ Staged {} cars, {} railroads, {} car classes, {} locations",
        snapshot.cars.len(),
        snapshot.railroads.len(),
        snapshot.car_classes.len(),
        snapshot.locations.len()
    );
    snapshot
}

#[derive(Default)]
struct Staging {
    snapshot: Snapshot,
    railroads_by_mark: HashMap<String, usize>,
    railroads_by_name: HashMap<String, usize>,
    classes_by_code: HashMap<String, usize>,
    locations_by_name: HashMap<String, usize>,
}

impl Staging {
    fn add_car(&mut self, row: &InventoryRow) {
        let railroad = if row.reporting_mark.is_empty() && row.railroad.is_empty() {
            None
        } else {
            Some(self.railroad(&row.reporting_mark, &row.railroad))
        };
        let class = (!row.car_class.is_empty()).then(|| self.car_class(row));
        let location = (!row.location.is_empty()).then(|| self.location(&row.location));

        let mut car = Car {
            id: self.snapshot.cars.len() as i64 + 1,
            railroad_id: railroad.map(|i| self.snapshot.railroads[i].id),
            car_class_id: class.map(|i| self.snapshot.car_classes[i].id),
            location_id: location.map(|i| self.snapshot.locations[i].id),
            reporting_mark_override: if railroad.is_none() {
                non_empty(&row.reporting_mark)
            } else {
                None
            },
            brand: non_empty(&row.brand),
            upc: non_empty(&row.upc),
            car_number: non_empty(&row.car_number),
            dcc_id: non_empty(&row.dcc_id),
            notes: non_empty(&row.notes),
            traction_drivers: Some(row.traction_drivers.eq_ignore_ascii_case("yes")),
            built: non_empty(&row.built),
            alt_date: non_empty(&row.alt_date),
            reweight_date: non_empty(&row.reweight_date),
            other_lettering: non_empty(&row.other_lettering),
            msrp: non_empty(&row.msrp),
            price: non_empty(&row.price),
            load: non_empty(&row.load),
            repairs_required: non_empty(&row.repairs_required),
            ..Default::default()
        };

        match class.map(|i| &self.snapshot.car_classes[i]) {
            Some(class) => {
                car.car_type_override = differing(&row.car_type, &class.car_type);
                car.wheel_arrangement_override =
                    differing(&row.wheel_arrangement, &class.wheel_arrangement);
                car.tender_axles_override = differing(&row.tender_axles, &class.tender_axles);
                car.capacity_override = differing(&row.capacity, &class.capacity);
                car.weight_override = differing(&row.weight, &class.weight);
                car.load_limit_override = differing(&row.load_limit, &class.load_limit);
                car.aar_plate_override = differing(&row.aar_plate, &class.aar_plate);
            }
            None => {
                car.car_type_override = non_empty(&row.car_type);
                car.wheel_arrangement_override = non_empty(&row.wheel_arrangement);
                car.tender_axles_override = non_empty(&row.tender_axles);
                car.capacity_override = non_empty(&row.capacity);
                car.weight_override = non_empty(&row.weight);
                car.load_limit_override = non_empty(&row.load_limit);
                car.aar_plate_override = non_empty(&row.aar_plate);
                if is_locomotive_type(&row.car_type) {
                    car.is_locomotive_override = Some(true);
                }
            }
        }

        self.snapshot.cars.push(car);
    }

    fn railroad(&mut self, mark: &str, name: &str) -> usize {
        if let Some(&index) = self.railroads_by_mark.get(mark) {
            return index;
        }
        if let Some(&index) = self.railroads_by_name.get(name) {
            return index;
        }

        let index = self.snapshot.railroads.len();
        let display_name = [name, mark]
            .into_iter()
            .find(|v| !v.is_empty())
            .unwrap_or("Unknown")
            .to_string();
        self.snapshot.railroads.push(Railroad {
            id: index as i64 + 1,
            reporting_mark: non_empty(mark),
            name: Some(display_name.clone()),
            ..Default::default()
        });
        if !mark.is_empty() {
            self.railroads_by_mark.insert(mark.to_string(), index);
        }
        self.railroads_by_name.insert(display_name, index);
        index
    }

    fn car_class(&mut self, row: &InventoryRow) -> usize {
        let index = match self.classes_by_code.get(&row.car_class) {
            Some(&index) => index,
            None => {
                let index = self.snapshot.car_classes.len();
                self.snapshot.car_classes.push(CarClass {
                    id: index as i64 + 1,
                    code: Some(row.car_class.clone()),
                    ..Default::default()
                });
                self.classes_by_code.insert(row.car_class.clone(), index);
                index
            }
        };

        let class = &mut self.snapshot.car_classes[index];
        fill(&mut class.car_type, &row.car_type);
        if class.is_locomotive.is_none() && is_locomotive_type(&row.car_type) {
            class.is_locomotive = Some(true);
        }
        fill(&mut class.wheel_arrangement, &row.wheel_arrangement);
        fill(&mut class.tender_axles, &row.tender_axles);
        fill(&mut class.capacity, &row.capacity);
        fill(&mut class.weight, &row.weight);
        fill(&mut class.load_limit, &row.load_limit);
        fill(&mut class.aar_plate, &row.aar_plate);
        index
    }

    fn location(&mut self, name: &str) -> usize {
        if let Some(&index) = self.locations_by_name.get(name) {
            return index;
        }
        let index = self.snapshot.locations.len();
        self.snapshot.locations.push(Location {
            id: index as i64 + 1,
            name: Some(name.to_string()),
            location_type: Some(infer_location_type(name).to_string()),
            parent_id: None,
        });
        self.locations_by_name.insert(name.to_string(), index);
        index
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Set an empty class field from the first row that supplies it
fn fill(field: &mut Option<String>, value: &str) {
    if !value.is_empty() && field.as_deref().map_or(true, str::is_empty) {
        *field = Some(value.to_string());
    }
}

/// Override value when the row disagrees with a set class value
fn differing(value: &str, class_value: &Option<String>) -> Option<String> {
    match class_value.as_deref() {
        Some(class_value) if !value.is_empty() && !class_value.is_empty() && value != class_value => {
            Some(value.to_string())
        }
        _ => None,
    }
}

fn is_locomotive_type(car_type: &str) -> bool {
    car_type.to_lowercase().contains("locomotive")
}
