use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The report-title marker is missing: not a food establishment report.
    #[error("document is not a food establishment inspection report")]
    SchemaMismatch,

    #[error("mandatory field {0} could not be located")]
    MandatoryFieldMissing(&'static str),
}

impl ExtractionError {
    /// Short tag used in the run report's rejection tally.
    pub fn reason(&self) -> String {
        match self {
            Self::SchemaMismatch => "schema_mismatch".to_string(),
            Self::MandatoryFieldMissing(field) => format!("missing_{field}"),
        }
    }
}
