/// Arrow schemas and batch builders for the exported relations.
pub mod relations {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, BooleanArray, Date32Array, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;

    use crate::inspection::{
        CategoryCounts, InspectionId, InspectionSummary, LivenessRecord, ViolationCategory,
        ViolationDetail,
    };

    pub const INSPECTION_SUMMARIES: &str = "inspection_summaries";
    pub const VIOLATION_DETAILS: &str = "violation_details";
    pub const LIVENESS_LEDGER: &str = "liveness_ledger";

    /// Key columns per relation, used by the merge store.
    pub const INSPECTION_SUMMARY_KEY: &[&str] = &["inspection_id"];
    pub const VIOLATION_DETAIL_KEY: &[&str] = &["inspection_id", "violation_number"];
    pub const LIVENESS_LEDGER_KEY: &[&str] = &["inspection_id", "was_live"];

    // Category column order in the summary export.
    const CATEGORY_ORDER: [ViolationCategory; 5] = [
        ViolationCategory::Priority,
        ViolationCategory::PriorityFoundation,
        ViolationCategory::Core,
        ViolationCategory::Critical,
        ViolationCategory::Noncritical,
    ];

    fn text(name: &str) -> Field {
        Field::new(name, DataType::Utf8, true)
    }

    fn date(name: &str) -> Field {
        Field::new(name, DataType::Date32, true)
    }

    /// Schema for one row per inspection report.
    pub fn inspection_summary_schema() -> Schema {
        let mut fields = vec![
            Field::new("inspection_id", DataType::Int64, false),
            text("establishment_name"),
            text("address"),
            text("telephone"),
            text("email"),
            date("inspection_date"),
            text("inspection_time_in"),
            text("inspection_time_out"),
            text("license_holder"),
            text("license_number"),
            date("license_period_start"),
            date("license_period_end"),
            text("establishment_type"),
            Field::new("risk_category", DataType::Int32, false),
            text("inspection_type"),
            Field::new("total_violations", DataType::Int32, false),
        ];
        for category in CATEGORY_ORDER {
            let prefix = category.column_prefix();
            fields.push(Field::new(prefix, DataType::Int32, true));
            fields.push(Field::new(
                format!("{prefix}_corrected_on_site"),
                DataType::Int32,
                true,
            ));
            fields.push(Field::new(format!("{prefix}_repeated"), DataType::Int32, true));
        }
        fields.extend([
            text("inspector_comments"),
            text("inspector_name"),
            text("inspector_badge_number"),
            Field::new("known_valid", DataType::Boolean, false),
        ]);
        Schema::new(fields)
    }

    /// Schema for one row per cited violation.
    pub fn violation_detail_schema() -> Schema {
        Schema::new(vec![
            Field::new("inspection_id", DataType::Int64, false),
            Field::new("violation_number", DataType::Int32, false),
            text("violation_description"),
            text("violation_text"),
            text("regulatory_code"),
        ])
    }

    /// Schema for the identifier liveness ledger.
    pub fn liveness_ledger_schema() -> Schema {
        Schema::new(vec![
            Field::new("inspection_id", DataType::Int64, false),
            Field::new("was_live", DataType::Boolean, false),
            date("checked_on"),
        ])
    }

    /// Empty strings are written as nulls so a CSV round trip is stable.
    fn opt_str(s: Option<&str>) -> Option<&str> {
        s.filter(|s| !s.is_empty())
    }

    fn str_col<'a>(rows: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
        Arc::new(StringArray::from(rows.map(opt_str).collect::<Vec<_>>()))
    }

    fn date_col(rows: impl Iterator<Item = Option<chrono::NaiveDate>>) -> ArrayRef {
        Arc::new(Date32Array::from(
            rows.map(|d| d.map(Date32Type::from_naive_date))
                .collect::<Vec<_>>(),
        ))
    }

    fn id_col(rows: impl Iterator<Item = InspectionId>) -> ArrayRef {
        Arc::new(Int64Array::from(rows.map(InspectionId::as_i64).collect::<Vec<_>>()))
    }

    fn count_col(
        rows: &[InspectionSummary],
        category: ViolationCategory,
        pick: fn(&CategoryCounts) -> u32,
    ) -> ArrayRef {
        Arc::new(Int32Array::from(
            rows.iter()
                .map(|r| r.counts.get(category).map(|c| pick(&c) as i32))
                .collect::<Vec<_>>(),
        ))
    }

    /// Build a `RecordBatch` in [`inspection_summary_schema`] column order.
    pub fn summaries_to_batch(rows: &[InspectionSummary]) -> Result<RecordBatch, ArrowError> {
        let mut columns: Vec<ArrayRef> = vec![
            id_col(rows.iter().map(|r| r.inspection_id)),
            str_col(rows.iter().map(|r| Some(r.establishment_name.as_str()))),
            str_col(rows.iter().map(|r| Some(r.address.as_str()))),
            str_col(rows.iter().map(|r| r.telephone.as_deref())),
            str_col(rows.iter().map(|r| r.email.as_deref())),
            date_col(rows.iter().map(|r| r.inspection_date)),
            str_col(rows.iter().map(|r| r.inspection_time_in.as_deref())),
            str_col(rows.iter().map(|r| r.inspection_time_out.as_deref())),
            str_col(rows.iter().map(|r| Some(r.license_holder.as_str()))),
            str_col(rows.iter().map(|r| r.license_number.as_deref())),
            date_col(rows.iter().map(|r| r.license_period_start)),
            date_col(rows.iter().map(|r| r.license_period_end)),
            str_col(rows.iter().map(|r| r.establishment_type.as_deref())),
            Arc::new(Int32Array::from(
                rows.iter()
                    .map(|r| r.risk_category as i32)
                    .collect::<Vec<_>>(),
            )),
            str_col(rows.iter().map(|r| r.inspection_type.as_deref())),
            Arc::new(Int32Array::from(
                rows.iter()
                    .map(|r| r.total_violations as i32)
                    .collect::<Vec<_>>(),
            )),
        ];
        for category in CATEGORY_ORDER {
            columns.push(count_col(rows, category, |c| c.count));
            columns.push(count_col(rows, category, |c| c.corrected_on_site));
            columns.push(count_col(rows, category, |c| c.repeated));
        }
        columns.extend([
            str_col(rows.iter().map(|r| Some(r.inspector_comments.as_str()))),
            str_col(rows.iter().map(|r| Some(r.inspector_name.as_str()))),
            str_col(rows.iter().map(|r| Some(r.inspector_badge_number.as_str()))),
            Arc::new(BooleanArray::from(
                rows.iter().map(|r| r.known_valid).collect::<Vec<_>>(),
            )) as ArrayRef,
        ]);
        RecordBatch::try_new(summary_schema_ref(), columns)
    }

    /// Build a `RecordBatch` in [`violation_detail_schema`] column order.
    pub fn violations_to_batch(rows: &[ViolationDetail]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            id_col(rows.iter().map(|r| r.inspection_id)),
            Arc::new(Int32Array::from(
                rows.iter()
                    .map(|r| r.violation_number as i32)
                    .collect::<Vec<_>>(),
            )),
            str_col(rows.iter().map(|r| r.violation_description.as_deref())),
            str_col(rows.iter().map(|r| Some(r.violation_text.as_str()))),
            str_col(rows.iter().map(|r| r.regulatory_code.as_deref())),
        ];
        RecordBatch::try_new(Arc::new(violation_detail_schema()), columns)
    }

    /// Build a `RecordBatch` in [`liveness_ledger_schema`] column order.
    pub fn liveness_to_batch(rows: &[LivenessRecord]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            id_col(rows.iter().map(|r| r.inspection_id)),
            Arc::new(BooleanArray::from(
                rows.iter().map(|r| r.was_live).collect::<Vec<_>>(),
            )),
            date_col(rows.iter().map(|r| Some(r.checked_on))),
        ];
        RecordBatch::try_new(Arc::new(liveness_ledger_schema()), columns)
    }

    fn summary_schema_ref() -> SchemaRef {
        Arc::new(inspection_summary_schema())
    }
}
