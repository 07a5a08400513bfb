//! Report generation detection.

use foodinspect_core::{SchemaVariant, ViolationCategory};

use crate::dom::DocumentTree;

/// Title every food establishment report carries.
pub const REPORT_TITLE: &str = "Food Establishment Inspection Report";

/// Pick the field set that applies to a parsed report.
///
/// No title marker means the portal served something else (an error page or
/// another report type). The current layout's "Priority" category wins over
/// the legacy "Critical Violations" one if a document somehow shows both.
pub fn resolve_variant<D: DocumentTree>(doc: &D) -> SchemaVariant {
    if doc.find_labeled("span", REPORT_TITLE).is_none() {
        return SchemaVariant::Invalid;
    }
    let has = |category: ViolationCategory| doc.find_labeled("b", category.label()).is_some();
    if has(ViolationCategory::Priority) {
        SchemaVariant::Current
    } else if has(ViolationCategory::Critical) {
        SchemaVariant::Legacy
    } else {
        SchemaVariant::Uncategorized
    }
}
