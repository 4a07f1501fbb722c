//! Snapshot → document store migration
//!
//! Write order:
//! 1. railroads (representative logo deferred), car_classes
//! 2. locations without parents, then parent links from the location tree
//! 3. cars, loads, load_placements, color schemes, logos, slogans
//! 4. deferred representative logos
//!
//! Every integer foreign key is rewritten to the new id of the referenced
//! document. A reference to a row that does not exist is reported and the
//! field left unset; a store error aborts the run where it stands.

use railyard_common::locations::{LocationTree, TreeIssue};
use railyard_common::models::{Record, SourceTable};
use railyard_common::resolve;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{MigrateError, Result};
use crate::report::{ImportReport, ImportWarning};
use crate::snapshot::Snapshot;
use crate::store::{DocId, DocumentStore, Fields};

/// A foreign-key column and the table it points into
#[derive(Debug, Clone, Copy)]
struct Reference {
    field: &'static str,
    target: SourceTable,
}

const fn refers(field: &'static str, target: SourceTable) -> Reference {
    Reference { field, target }
}

const RAILROAD: Reference = refers("railroad_id", SourceTable::Railroads);
const CAR_CLASS: Reference = refers("car_class_id", SourceTable::CarClasses);
const LOCATION: Reference = refers("location_id", SourceTable::Locations);
const PARENT_LOCATION: Reference = refers("parent_id", SourceTable::Locations);
const REPRESENTATIVE_LOGO: Reference =
    refers("representative_logo_id", SourceTable::RailroadLogos);

/// Migrate a fully loaded snapshot into `store`
///
/// Expects an empty target: running twice duplicates every document.
pub async fn migrate<S>(snapshot: &Snapshot, store: &S) -> Result<ImportReport>
where
    S: DocumentStore + ?Sized,
{
    info!(
        "Migrating {} rows across {} tables",
        snapshot.total_rows(),
        SourceTable::ALL.len()
    );
    let mut run = Migration::new(store);

    let railroads = run
        .write_table(&snapshot.railroads, &[], &[REPRESENTATIVE_LOGO.field])
        .await?;
    run.write_table(&snapshot.car_classes, &[], &[]).await?;

    let locations = run
        .write_table(&snapshot.locations, &[], &[PARENT_LOCATION.field])
        .await?;
    run.link_locations(snapshot, &locations).await?;

    run.write_table(&snapshot.cars, &[RAILROAD, CAR_CLASS, LOCATION], &[])
        .await?;
    run.write_table(&snapshot.loads, &[CAR_CLASS, RAILROAD], &[])
        .await?;
    run.write_table(
        &snapshot.load_placements,
        &[
            refers("load_id", SourceTable::Loads),
            refers("car_id", SourceTable::Cars),
            LOCATION,
        ],
        &[],
    )
    .await?;
    run.write_table(&snapshot.color_schemes, &[RAILROAD], &[])
        .await?;
    run.write_table(&snapshot.logos, &[RAILROAD], &[]).await?;
    run.write_table(&snapshot.slogans, &[RAILROAD], &[]).await?;

    for (railroad, doc_id) in snapshot.railroads.iter().zip(railroads) {
        let Some(logo) = railroad.representative_logo_id else {
            continue;
        };
        let target = run.remap(
            SourceTable::Railroads,
            railroad.id,
            REPRESENTATIVE_LOGO,
            Some(logo),
        );
        if !target.is_null() {
            run.patch(&doc_id, REPRESENTATIVE_LOGO.field, target).await?;
        }
    }

    let mut report = run.finish();
    report.locomotives = count_locomotives(snapshot);

    info!(
        "✓ Migration complete: {} documents, {} warnings",
        report.documents_written(),
        report.warnings.len()
    );
    Ok(report)
}

/// Cars that resolve to locomotives through their class or overrides
fn count_locomotives(snapshot: &Snapshot) -> usize {
    let classes: HashMap<i64, _> = snapshot.car_classes.iter().map(|c| (c.id, c)).collect();
    snapshot
        .cars
        .iter()
        .filter(|car| {
            let class = car.car_class_id.and_then(|id| classes.get(&id).copied());
            resolve(car, class).is_locomotive_or_default()
        })
        .count()
}

struct Migration<'a, S: ?Sized> {
    store: &'a S,
    /// Source row id → new document, per table
    ids: HashMap<SourceTable, HashMap<i64, DocId>>,
    report: ImportReport,
}

impl<'a, S> Migration<'a, S>
where
    S: DocumentStore + ?Sized,
{
    fn new(store: &'a S) -> Self {
        Self {
            store,
            ids: HashMap::new(),
            report: ImportReport::default(),
        }
    }

    fn finish(self) -> ImportReport {
        self.report
    }

    /// Create one document per record, returning the new ids in record order
    ///
    /// `references` are rewritten to new ids; `deferred` fields are written
    /// empty and patched once their targets exist.
    async fn write_table<T: Record>(
        &mut self,
        records: &[T],
        references: &[Reference],
        deferred: &[&'static str],
    ) -> Result<Vec<DocId>> {
        let table = T::TABLE;
        let mut written = Vec::with_capacity(records.len());

        for record in records {
            let row_id = record.source_id();
            let mut fields = to_fields(record)?;

            for reference in references {
                let source = fields.get(reference.field).and_then(Value::as_i64);
                let target = self.remap(table, row_id, *reference, source);
                fields.insert(reference.field.to_string(), target);
            }
            for field in deferred {
                fields.insert(field.to_string(), Value::Null);
            }

            let id = self.store.create(table, fields).await?;
            self.ids.entry(table).or_default().insert(row_id, id);
            self.report.record_written(table);
            written.push(id);
        }

        if !records.is_empty() {
            info!("✓ {}: {} documents", table, records.len());
        }
        Ok(written)
    }

    /// Second location pass: link parents once every location has an id
    async fn link_locations(&mut self, snapshot: &Snapshot, created: &[DocId]) -> Result<()> {
        let (tree, issues) =
            LocationTree::build(snapshot.locations.iter().map(|l| (l.id, l.parent_id)));

        for issue in issues {
            match issue {
                TreeIssue::DanglingParent { id, parent_id } => {
                    self.remap(SourceTable::Locations, id, PARENT_LOCATION, Some(parent_id));
                }
                TreeIssue::Cycle { id, parent_id } => {
                    warn!("locations row {}: parent_id {} would form a cycle", id, parent_id);
                    self.report.warn(ImportWarning::LocationCycle {
                        row_id: id,
                        parent_id,
                    });
                }
            }
        }

        let by_source: HashMap<i64, DocId> = snapshot
            .locations
            .iter()
            .map(|l| l.id)
            .zip(created.iter().copied())
            .collect();
        for (child, parent) in tree.links() {
            let (Some(child_id), Some(parent_id)) = (by_source.get(&child), by_source.get(&parent))
            else {
                continue;
            };
            self.patch(child_id, PARENT_LOCATION.field, json!(parent_id.number))
                .await?;
        }
        Ok(())
    }

    /// New id for a source foreign key, or null (with a warning) when the
    /// referenced row does not exist
    fn remap(
        &mut self,
        table: SourceTable,
        row_id: i64,
        reference: Reference,
        source: Option<i64>,
    ) -> Value {
        let Some(missing_id) = source else {
            return Value::Null;
        };
        let mapped = self
            .ids
            .get(&reference.target)
            .and_then(|ids| ids.get(&missing_id))
            .map(|id| id.number);

        match mapped {
            Some(number) => json!(number),
            None => {
                let warning = ImportWarning::DanglingReference {
                    table,
                    row_id,
                    field: reference.field,
                    target: reference.target,
                    missing_id,
                };
                warn!("{}", warning);
                self.report.warn(warning);
                Value::Null
            }
        }
    }

    async fn patch(&mut self, id: &DocId, field: &str, value: Value) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert(field.to_string(), value);
        self.store.patch(id, fields).await?;
        self.report.links_patched += 1;
        Ok(())
    }
}

fn to_fields<T: Record>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(MigrateError::Snapshot(format!(
            "{} row {} did not encode as an object: {}",
            T::TABLE,
            record.source_id(),
            other
        ))),
    }
}
