//! Import report
//!
//! Per-table document counts and the non-fatal problems found on the way.

use railyard_common::models::SourceTable;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Non-fatal integrity problem found during a migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    /// A foreign key named a row that does not exist; the field was left unset
    DanglingReference {
        table: SourceTable,
        row_id: i64,
        field: &'static str,
        target: SourceTable,
        missing_id: i64,
    },
    /// A location parent link would have closed a cycle and was dropped
    LocationCycle { row_id: i64, parent_id: i64 },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::DanglingReference {
                table,
                row_id,
                field,
                target,
                missing_id,
            } => write!(
                f,
                "{} row {}: {} references missing {} row {}; field left unset",
                table, row_id, field, target, missing_id
            ),
            ImportWarning::LocationCycle { row_id, parent_id } => write!(
                f,
                "locations row {}: parent_id {} would form a cycle; link dropped",
                row_id, parent_id
            ),
        }
    }
}

/// Outcome of one migration run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub counts: BTreeMap<SourceTable, usize>,
    pub warnings: Vec<ImportWarning>,
    /// Deferred links (location parents, representative logos) patched in
    pub links_patched: usize,
    /// Cars whose effective class/override values mark them as locomotives
    pub locomotives: usize,
}

impl ImportReport {
    pub fn count(&self, table: SourceTable) -> usize {
        self.counts.get(&table).copied().unwrap_or(0)
    }

    pub fn documents_written(&self) -> usize {
        self.counts.values().sum()
    }

    pub(crate) fn record_written(&mut self, table: SourceTable) {
        *self.counts.entry(table).or_insert(0) += 1;
    }

    pub(crate) fn warn(&mut self, warning: ImportWarning) {
        self.warnings.push(warning);
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration report")?;
        for table in SourceTable::ALL {
            writeln!(f, "  {:<24} {:>6}", table.table_name(), self.count(table))?;
        }
        writeln!(f, "  {:<24} {:>6}", "total documents", self.documents_written())?;
        writeln!(f, "  {:<24} {:>6}", "deferred links", self.links_patched)?;
        writeln!(f, "  {:<24} {:>6}", "locomotives", self.locomotives)?;

        if self.warnings.is_empty() {
            writeln!(f, "No warnings")?;
        } else {
            writeln!(f, "Warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }
        Ok(())
    }
}
