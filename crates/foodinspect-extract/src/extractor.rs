//! Turn a parsed report into an inspection summary plus violation rows.

use std::collections::{HashMap, HashSet};

use foodinspect_core::{
    ExtractedInspection, InspectionId, InspectionSummary, SchemaVariant, ViolationCounts,
    ViolationDetail, parse_violation_number, violation_label,
};
use tracing::debug;

use crate::dom::{DocumentTree, NodeId, ParsedDocument, normalize};
use crate::error::ExtractionError;
use crate::locator::{FIELDS, Field, Value, category_counts, locate};
use crate::resolver::resolve_variant;

/// Externally supplied evidence that an identifier is a real report.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Identifiers confirmed valid by an earlier run or an operator.
    confirmed: HashSet<InspectionId>,
    /// Identifiers found on the portal's published listing.
    listed: HashSet<InspectionId>,
}

impl Provenance {
    pub fn new(
        confirmed: impl IntoIterator<Item = InspectionId>,
        listed: impl IntoIterator<Item = InspectionId>,
    ) -> Self {
        Self {
            confirmed: confirmed.into_iter().collect(),
            listed: listed.into_iter().collect(),
        }
    }

    pub fn is_known_valid(&self, id: InspectionId) -> bool {
        self.confirmed.contains(&id) || self.listed.contains(&id)
    }

    pub fn listed_len(&self) -> usize {
        self.listed.len()
    }

    pub fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }
}

const OBSERVATIONS_LABEL: &str = "OBSERVATIONS";
const RISK_MARKER_CLASS: &str = "checkboxRedN";
const RISK_MARKER_FILL: &str = "background-color:#ff0000";

/// Parse, resolve, and extract one cached document.
pub fn extract_document(
    bytes: &[u8],
    id: InspectionId,
    provenance: &Provenance,
) -> Result<ExtractedInspection, ExtractionError> {
    let doc = ParsedDocument::from_bytes(bytes);
    let variant = resolve_variant(&doc);
    extract(&doc, id, variant, provenance)
}

/// Extract a report whose generation has already been resolved.
pub fn extract<D: DocumentTree>(
    doc: &D,
    id: InspectionId,
    variant: SchemaVariant,
    provenance: &Provenance,
) -> Result<ExtractedInspection, ExtractionError> {
    if !variant.is_valid() {
        return Err(ExtractionError::SchemaMismatch);
    }

    let mut values: HashMap<Field, Value> = HashMap::new();
    for spec in FIELDS {
        match locate(doc, &spec.locator) {
            Ok(nodes) => {
                if let Some(value) = spec.decoder.decode(doc, &nodes) {
                    values.insert(spec.field, value);
                }
            }
            Err(err) if spec.required => {
                debug!(%id, field = spec.field.name(), ?err, "mandatory field not located");
                return Err(ExtractionError::MandatoryFieldMissing(spec.field.name()));
            }
            Err(_) => {}
        }
    }
    let mut text = |field: Field| values.remove(&field).and_then(Value::into_text);

    let address = match (text(Field::Address), text(Field::CityLine)) {
        (Some(street), Some(city)) => format!("{street} {city}"),
        (street, city) => street.or(city).unwrap_or_default(),
    };
    let establishment_name = text(Field::EstablishmentName).unwrap_or_default();
    let telephone = text(Field::Telephone);
    let email = text(Field::Email);
    let inspection_time_in = text(Field::InspectionTimeIn);
    let inspection_time_out = text(Field::InspectionTimeOut);
    let license_holder = text(Field::LicenseHolder).unwrap_or_default();
    let license_number = text(Field::LicenseNumber);
    let establishment_type = text(Field::EstablishmentType);
    let inspection_type = text(Field::InspectionType);
    let inspector_comments = text(Field::InspectorComments).unwrap_or_default();
    let inspector_name = text(Field::InspectorName).unwrap_or_default();
    let inspector_badge_number = text(Field::InspectorBadgeNumber).unwrap_or_default();
    let mut date = |field: Field| values.remove(&field).and_then(Value::into_date);

    let mut counts = ViolationCounts::default();
    for &category in variant.categories() {
        counts.set(category, category_counts(doc, category));
    }

    let summary = InspectionSummary {
        inspection_id: id,
        establishment_name,
        address,
        telephone,
        email,
        inspection_date: date(Field::InspectionDate),
        inspection_time_in,
        inspection_time_out,
        license_holder,
        license_number,
        license_period_start: date(Field::LicensePeriodStart),
        license_period_end: date(Field::LicensePeriodEnd),
        establishment_type,
        risk_category: risk_category(doc),
        inspection_type,
        total_violations: 0,
        counts,
        inspector_comments,
        inspector_name,
        inspector_badge_number,
        known_valid: provenance.is_known_valid(id),
    };
    let violations = violation_rows(doc, id);
    debug!(
        %id,
        variant = variant.as_str(),
        violations = violations.len(),
        "extracted report"
    );
    Ok(ExtractedInspection::new(summary, violations))
}

/// The marked risk box: the red `checkboxRedN` div. Its label is the
/// previous element and ends with the category digit. Unmarked is 0.
fn risk_category<D: DocumentTree>(doc: &D) -> u8 {
    doc.elements_by_tag("div")
        .find(|&div| {
            let class_hit = doc
                .attr(div, "class")
                .is_some_and(|c| c.split_whitespace().any(|c| c == RISK_MARKER_CLASS));
            let filled = doc.attr(div, "style").is_some_and(|style| {
                let style: String = style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                style.contains(RISK_MARKER_FILL)
            });
            class_hit && filled
        })
        .and_then(|marker| doc.previous_element_sibling(marker))
        .and_then(|label| doc.text(label).trim().chars().last())
        .and_then(|c| c.to_digit(10))
        .map_or(0, |d| d as u8)
}

/// Every element row after the header row is read. Separator rows, the
/// footer, and rows whose number does not parse are skipped, so adjacent data
/// rows are kept whether or not a separator sits between them.
fn violation_rows<D: DocumentTree>(doc: &D, id: InspectionId) -> Vec<ViolationDetail> {
    let Some(header) = doc
        .find_labeled("td", OBSERVATIONS_LABEL)
        .and_then(|cell| doc.parent(cell))
    else {
        return Vec::new();
    };

    let rows = std::iter::successors(doc.next_element_sibling(header), |&row| {
        doc.next_element_sibling(row)
    });
    rows.filter_map(|row| {
        let parsed = parse_row(doc, id, row);
        if parsed.is_none() {
            debug!(%id, row = %normalize(&doc.text(row)), "skipped observation row");
        }
        parsed
    })
    .collect()
}

fn parse_row<D: DocumentTree>(doc: &D, id: InspectionId, row: NodeId) -> Option<ViolationDetail> {
    let cell = doc.first_descendant(row, "td")?;
    let lead = doc.text(doc.child(cell, 0)?);
    let tokens: Vec<&str> = lead.split_whitespace().collect();
    let violation_number = parse_violation_number(tokens.first()?)?;

    let violation_text = tokens.get(2..).unwrap_or_default().join(" ");
    let regulatory_code = doc
        .next_element_sibling(cell)
        .map(|code| doc.text(code).trim().to_string())
        .filter(|code| !code.is_empty());

    Some(ViolationDetail {
        inspection_id: id,
        violation_number,
        violation_description: cross_reference(doc, violation_number),
        violation_text,
        regulatory_code,
    })
}

/// Description printed next to the standalone `"<n>."` label, if any.
fn cross_reference<D: DocumentTree>(doc: &D, number: u32) -> Option<String> {
    let label = doc.find_labeled("td", &violation_label(number))?;
    let description = normalize(&doc.text(doc.next_element_sibling(label)?));
    (!description.is_empty()).then_some(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use foodinspect_core::CategoryCounts;

    const LEGACY: &str = include_str!("../fixtures/legacy_report.html");
    const CURRENT: &str = include_str!("../fixtures/current_report.html");
    const NOT_A_REPORT: &str = include_str!("../fixtures/not_a_report.html");

    fn id(n: u64) -> InspectionId {
        InspectionId::new(n).unwrap()
    }

    fn run(html: &str, n: u64) -> Result<ExtractedInspection, ExtractionError> {
        extract_document(html.as_bytes(), id(n), &Provenance::default())
    }

    #[test]
    fn legacy_report_fields() {
        let doc = ParsedDocument::parse(LEGACY);
        assert_eq!(resolve_variant(&doc), SchemaVariant::Legacy);

        let record = run(LEGACY, 100).unwrap();
        let s = &record.summary;
        assert_eq!(s.establishment_name, "BLUE HERON CAFE");
        assert_eq!(s.address, "1200 K ST NW WASHINGTON, DC 20005");
        assert_eq!(s.telephone.as_deref(), Some("(202) 555-0147"));
        assert_eq!(s.email.as_deref(), Some("owner@blueheron.example"));
        assert_eq!(s.inspection_date, NaiveDate::from_ymd_opt(2016, 4, 12));
        assert_eq!(s.inspection_time_in.as_deref(), Some("10:05 AM"));
        assert_eq!(s.inspection_time_out.as_deref(), Some("11:30 AM"));
        assert_eq!(s.license_holder, "HERON HOSPITALITY LLC");
        assert_eq!(s.license_number.as_deref(), Some("60001234"));
        assert_eq!(s.license_period_start, NaiveDate::from_ymd_opt(2016, 1, 1));
        assert_eq!(s.license_period_end, NaiveDate::from_ymd_opt(2017, 12, 31));
        assert_eq!(s.establishment_type.as_deref(), Some("Restaurant Total"));
        assert_eq!(s.risk_category, 3);
        assert_eq!(s.inspection_type.as_deref(), Some("Routine"));
        assert_eq!(s.inspector_comments, "Walk-in cooler at 45F. Discussed date marking.");
        assert_eq!(s.inspector_name, "Jane Smith");
        assert_eq!(s.inspector_badge_number, "1234");
        assert!(!s.known_valid);
    }

    #[test]
    fn legacy_counts_read_each_category_from_its_own_row() {
        let record = run(LEGACY, 100).unwrap();
        let counts = &record.summary.counts;
        assert_eq!(
            counts.critical,
            Some(CategoryCounts {
                count: 1,
                corrected_on_site: 1,
                repeated: 0,
            })
        );
        assert_eq!(
            counts.noncritical,
            Some(CategoryCounts {
                count: 4,
                corrected_on_site: 0,
                repeated: 2,
            })
        );
        assert_eq!(counts.priority, None);
        assert_eq!(counts.core, None);
    }

    #[test]
    fn legacy_violation_rows_and_cross_references() {
        let record = run(LEGACY, 100).unwrap();
        assert_eq!(record.violations.len(), 2);
        assert_eq!(record.summary.total_violations, 2);

        let first = &record.violations[0];
        assert_eq!(first.violation_number, 1);
        assert_eq!(
            first.violation_description.as_deref(),
            Some("Food obtained from approved source")
        );
        assert_eq!(first.violation_text, "Shellfish tags not retained for 90 days.");
        assert_eq!(first.regulatory_code.as_deref(), Some("25-A1203.1"));

        let second = &record.violations[1];
        assert_eq!(second.violation_number, 35);
        assert_eq!(second.violation_description, None);
        assert_eq!(second.violation_text, "Floor under fryer soiled.");
        assert_eq!(second.regulatory_code, None);
    }

    #[test]
    fn current_report_with_no_violations() {
        let doc = ParsedDocument::parse(CURRENT);
        assert_eq!(resolve_variant(&doc), SchemaVariant::Current);

        let record = run(CURRENT, 102).unwrap();
        let s = &record.summary;
        assert_eq!(s.establishment_name, "GOOD BEANS COFFEE");
        assert!(record.violations.is_empty());
        assert_eq!(s.total_violations, 0);
        assert_eq!(s.risk_category, 0);
        assert_eq!(s.inspection_time_in.as_deref(), Some("2:15 PM"));
        assert_eq!(s.inspection_time_out, None);
        assert_eq!(s.license_period_start, None);
        assert_eq!(s.license_period_end, NaiveDate::from_ymd_opt(2020, 6, 30));
        assert_eq!(s.inspector_name, "Marcus Lee");
        assert_eq!(s.inspector_badge_number, "2201");
        assert_eq!(s.email, None);
        assert_eq!(
            s.counts.priority,
            Some(CategoryCounts {
                count: 0,
                corrected_on_site: 0,
                repeated: 0,
            })
        );
        assert_eq!(
            s.counts.core,
            Some(CategoryCounts {
                count: 2,
                corrected_on_site: 1,
                repeated: 0,
            })
        );
        assert_eq!(s.counts.critical, None);
        assert_eq!(s.counts.noncritical, None);
    }

    #[test]
    fn total_violations_counts_accepted_rows_not_printed_total() {
        // Add a third data row; the printed total on the page still says 5.
        let extra = "<tr><td>9. (C) Thermometer missing in reach-in.</td><td>25-A603.1</td></tr>\n\
                     <tr><td colspan=\"2\"><hr></td></tr>\n";
        let html = LEGACY.replace("<!-- end of observations -->", extra);
        assert!(html.contains("Total Violations: 5"));

        let record = run(&html, 100).unwrap();
        assert_eq!(record.violations.len(), 3);
        assert_eq!(record.summary.total_violations, 3);
    }

    #[test]
    fn malformed_violation_number_is_dropped() {
        let extra = "<tr><td>2a. (C) Stray annotation row.</td><td></td></tr>\n\
                     <tr><td colspan=\"2\"><hr></td></tr>\n";
        let html = LEGACY.replace("<!-- end of observations -->", extra);

        let record = run(&html, 100).unwrap();
        let numbers: Vec<u32> = record.violations.iter().map(|v| v.violation_number).collect();
        assert_eq!(numbers, [1, 35]);
    }

    #[test]
    fn adjacent_violation_rows_are_all_kept() {
        let separator = "<tr><td colspan=\"2\"><hr></td></tr>\n<tr><td>35.";
        assert!(LEGACY.contains(separator));
        let html = LEGACY.replacen(separator, "<tr><td>35.", 1);

        let record = run(&html, 100).unwrap();
        let numbers: Vec<u32> = record.violations.iter().map(|v| v.violation_number).collect();
        assert_eq!(numbers, [1, 35]);
        assert_eq!(record.summary.total_violations, 2);
    }

    #[test]
    fn document_without_title_is_schema_mismatch() {
        assert_eq!(run(NOT_A_REPORT, 104), Err(ExtractionError::SchemaMismatch));
    }

    #[test]
    fn missing_inspector_row_rejects_document() {
        let html = LEGACY.replace("Inspector (Signature)", "Person in Charge (Signature)");
        let err = run(&html, 100).unwrap_err();
        assert_eq!(err, ExtractionError::MandatoryFieldMissing("inspector_name"));
        assert_eq!(err.reason(), "missing_inspector_name");
    }

    #[test]
    fn missing_optional_field_is_null() {
        let html = LEGACY.replace("Establishment Type:", "Facility Kind:");
        let record = run(&html, 100).unwrap();
        assert_eq!(record.summary.establishment_type, None);
    }

    #[test]
    fn known_valid_from_either_provenance_set() {
        let listed = Provenance::new([], [id(100)]);
        let confirmed = Provenance::new([id(100)], []);
        for provenance in [listed, confirmed] {
            let record = extract_document(LEGACY.as_bytes(), id(100), &provenance).unwrap();
            assert!(record.summary.known_valid);
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        assert_eq!(run(LEGACY, 100).unwrap(), run(LEGACY, 100).unwrap());
    }
}
