//! Candidate identifiers and the provenance that marks some of them known valid.
//!
//! The portal publishes only a partial listing of its reports, so a run can
//! also enumerate every identifier up to a bound to discover unlisted ones.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Int64Type};
use foodinspect_core::InspectionId;
use foodinspect_extract::Provenance;
use tracing::{debug, info};

use crate::PipelineError;

pub const ID_COLUMN: &str = "inspection_id";

#[derive(Debug, Clone, Default)]
pub struct CandidateFeed {
    explicit: BTreeSet<InspectionId>,
    listed: BTreeSet<InspectionId>,
    confirmed: BTreeSet<InspectionId>,
    through: Option<u64>,
}

impl CandidateFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers to process regardless of any listing.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = InspectionId>) -> Self {
        self.explicit.extend(ids);
        self
    }

    /// Identifiers seen on the portal's listing. These are candidates and
    /// are marked known valid.
    pub fn with_listed(mut self, ids: impl IntoIterator<Item = InspectionId>) -> Self {
        self.listed.extend(ids);
        self
    }

    /// Identifiers confirmed valid elsewhere. Provenance only; not candidates.
    pub fn with_confirmed(mut self, ids: impl IntoIterator<Item = InspectionId>) -> Self {
        self.confirmed.extend(ids);
        self
    }

    /// Also enumerate every identifier from 1 through `max`.
    pub fn through(mut self, max: u64) -> Self {
        self.through = Some(max);
        self
    }

    /// Every candidate, ascending and without duplicates.
    pub fn candidates(&self) -> Vec<InspectionId> {
        let enumerated = (1..=self.through.unwrap_or(0)).filter_map(|n| InspectionId::new(n).ok());
        let mut all: BTreeSet<InspectionId> = enumerated.collect();
        all.extend(self.explicit.iter().copied());
        all.extend(self.listed.iter().copied());
        all.into_iter().collect()
    }

    pub fn provenance(&self) -> Provenance {
        Provenance::new(
            self.confirmed.iter().copied(),
            self.listed.iter().copied(),
        )
    }
}

/// Read the `inspection_id` column of a CSV file with a header row.
///
/// Other columns are ignored. Blank and non-positive values are skipped.
pub fn read_id_column(path: &Path) -> Result<Vec<InspectionId>, PipelineError> {
    let feed_err = |source: std::io::Error| PipelineError::Feed {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(feed_err)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind().map_err(feed_err)?;

    if schema.column_with_name(ID_COLUMN).is_none() {
        return Err(PipelineError::FeedColumn {
            path: path.to_path_buf(),
            column: ID_COLUMN.to_string(),
        });
    }
    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .build(file)?;

    let mut ids = Vec::new();
    for batch in reader {
        let batch = batch?;
        let Some(column) = batch.column_by_name(ID_COLUMN) else {
            continue;
        };
        let values = cast(column, &DataType::Int64)?;
        let values = values.as_primitive::<Int64Type>();
        for row in 0..values.len() {
            if values.is_null(row) {
                continue;
            }
            match InspectionId::try_from(values.value(row)) {
                Ok(id) => ids.push(id),
                Err(e) => debug!(path = %path.display(), row, error = %e, "skipped identifier"),
            }
        }
    }
    info!(path = %path.display(), count = ids.len(), "read candidate identifiers");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn id(n: u64) -> InspectionId {
        InspectionId::new(n).unwrap()
    }

    #[test]
    fn candidates_are_a_sorted_union() {
        let feed = CandidateFeed::new()
            .with_ids([id(9), id(2)])
            .with_listed([id(2), id(12)])
            .through(3);
        assert_eq!(feed.candidates(), vec![id(1), id(2), id(3), id(9), id(12)]);
    }

    #[test]
    fn confirmed_ids_are_provenance_not_candidates() {
        let feed = CandidateFeed::new()
            .with_listed([id(5)])
            .with_confirmed([id(6)]);
        assert_eq!(feed.candidates(), vec![id(5)]);

        let provenance = feed.provenance();
        assert!(provenance.is_known_valid(id(5)));
        assert!(provenance.is_known_valid(id(6)));
        assert!(!provenance.is_known_valid(id(7)));
    }

    #[test]
    fn reads_id_column_among_others() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("links.csv");
        fs::write(
            &path,
            "link,inspection_id,date_downloaded\n\
             https://example.test/a,431,01/02/24\n\
             https://example.test/b,,01/02/24\n\
             https://example.test/c,0,01/02/24\n\
             https://example.test/d,77,01/02/24\n",
        )
        .unwrap();
        assert_eq!(read_id_column(&path).unwrap(), vec![id(431), id(77)]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("links.csv");
        fs::write(&path, "link\nhttps://example.test/a\n").unwrap();
        assert!(matches!(
            read_id_column(&path),
            Err(PipelineError::FeedColumn { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read_id_column(&tmp.path().join("absent.csv")),
            Err(PipelineError::Feed { .. })
        ));
    }
}
