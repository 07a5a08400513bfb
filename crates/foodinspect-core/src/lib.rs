pub mod config;
pub mod inspection;
pub mod schema;
pub mod violation_number;

pub use config::PipelineConfig;
pub use inspection::{
    CategoryCounts, ExtractedInspection, InspectionId, InspectionSummary, InvalidInspectionId,
    LivenessRecord, SchemaVariant, ViolationCategory, ViolationCounts, ViolationDetail,
};
pub use schema::relations;
pub use violation_number::{parse_violation_number, violation_label};
