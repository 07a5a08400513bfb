//! Liveness ledger: which identifiers earlier runs classified live or dead.
//!
//! The ledger relation is append-only and keyed by `(inspection_id, was_live)`,
//! so an identifier that was dead on one run and live on a later one carries
//! both rows. Live wins when both are present.

use std::collections::HashSet;

use arrow::array::{Array, AsArray};
use arrow::datatypes::Int64Type;
use arrow::record_batch::RecordBatch;
use foodinspect_core::InspectionId;

use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Dead,
}

#[derive(Debug, Default)]
pub struct LivenessLedger {
    live: HashSet<InspectionId>,
    dead: HashSet<InspectionId>,
}

impl LivenessLedger {
    pub fn from_batch(batch: &RecordBatch) -> Result<Self, StoreError> {
        let ids = batch
            .column_by_name("inspection_id")
            .ok_or_else(|| missing("inspection_id"))?
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(|| StoreError::Other("inspection_id column is not Int64".into()))?;
        let was_live = batch
            .column_by_name("was_live")
            .ok_or_else(|| missing("was_live"))?
            .as_boolean_opt()
            .ok_or_else(|| StoreError::Other("was_live column is not Boolean".into()))?;

        let mut ledger = Self::default();
        for row in 0..batch.num_rows() {
            if ids.is_null(row) || was_live.is_null(row) {
                continue;
            }
            let Ok(id) = InspectionId::try_from(ids.value(row)) else {
                continue;
            };
            ledger.record(id, was_live.value(row));
        }
        Ok(ledger)
    }

    pub fn record(&mut self, id: InspectionId, was_live: bool) {
        if was_live {
            self.live.insert(id);
        } else {
            self.dead.insert(id);
        }
    }

    pub fn status(&self, id: InspectionId) -> Option<Liveness> {
        if self.live.contains(&id) {
            Some(Liveness::Live)
        } else if self.dead.contains(&id) {
            Some(Liveness::Dead)
        } else {
            None
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Identifiers only ever seen dead.
    pub fn dead_count(&self) -> usize {
        self.dead.difference(&self.live).count()
    }
}

fn missing(column: &str) -> StoreError {
    StoreError::MissingKeyColumn {
        relation: foodinspect_core::relations::LIVENESS_LEDGER.into(),
        column: column.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use foodinspect_core::{LivenessRecord, relations};

    fn record(id: u64, was_live: bool) -> LivenessRecord {
        LivenessRecord {
            inspection_id: InspectionId::new(id).unwrap(),
            was_live,
            checked_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn live_wins_over_earlier_dead() {
        let batch = relations::liveness_to_batch(&[
            record(1, false),
            record(1, true),
            record(2, false),
        ])
        .unwrap();
        let ledger = LivenessLedger::from_batch(&batch).unwrap();

        assert_eq!(ledger.status(InspectionId::new(1).unwrap()), Some(Liveness::Live));
        assert_eq!(ledger.status(InspectionId::new(2).unwrap()), Some(Liveness::Dead));
        assert_eq!(ledger.status(InspectionId::new(3).unwrap()), None);
        assert_eq!(ledger.live_count(), 1);
        assert_eq!(ledger.dead_count(), 1);
    }

    #[test]
    fn empty_ledger() {
        let schema = std::sync::Arc::new(relations::liveness_ledger_schema());
        let batch = RecordBatch::new_empty(schema);
        let ledger = LivenessLedger::from_batch(&batch).unwrap();
        assert_eq!(ledger.live_count(), 0);
    }
}
