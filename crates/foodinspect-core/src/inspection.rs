//! Inspection record types shared by extraction, merge, and export.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a (potential) inspection report on the portal.
///
/// Always positive and at most `i64::MAX`, the range of the Int64 export
/// column. Candidate identifiers are produced externally, either from
/// the portal's published link list or by enumerating a numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct InspectionId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid inspection id {0:?}: must be between 1 and {max}", max = i64::MAX)]
pub struct InvalidInspectionId(pub String);

impl InspectionId {
    pub fn new(raw: u64) -> Result<Self, InvalidInspectionId> {
        if raw == 0 || i64::try_from(raw).is_err() {
            return Err(InvalidInspectionId(raw.to_string()));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Value as stored in Int64 key columns.
    pub fn as_i64(self) -> i64 {
        // In range by construction.
        self.0 as i64
    }
}

impl TryFrom<u64> for InspectionId {
    type Error = InvalidInspectionId;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl TryFrom<i64> for InspectionId {
    type Error = InvalidInspectionId;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u64::try_from(raw)
            .map_err(|_| InvalidInspectionId(raw.to_string()))
            .and_then(Self::new)
    }
}

impl From<InspectionId> for u64 {
    fn from(id: InspectionId) -> Self {
        id.0
    }
}

impl FromStr for InspectionId {
    type Err = InvalidInspectionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map_err(|_| InvalidInspectionId(s.to_string()))
            .and_then(Self::new)
    }
}

impl fmt::Display for InspectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which report generation a cached document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Older reports: "Critical" / "Noncritical" violation categories.
    Legacy,
    /// Newer reports: "Priority" / "Priority Foundation" / "Core" categories.
    Current,
    /// A genuine inspection report that carries neither category block.
    /// Accepted, with every category count left null.
    Uncategorized,
    /// Not a food establishment inspection report at all.
    Invalid,
}

impl SchemaVariant {
    /// Violation categories whose counts apply to this report generation.
    pub fn categories(self) -> &'static [ViolationCategory] {
        match self {
            Self::Legacy => &[ViolationCategory::Critical, ViolationCategory::Noncritical],
            Self::Current => &[
                ViolationCategory::Priority,
                ViolationCategory::PriorityFoundation,
                ViolationCategory::Core,
            ],
            Self::Uncategorized | Self::Invalid => &[],
        }
    }

    pub fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
            Self::Uncategorized => "uncategorized",
            Self::Invalid => "invalid",
        }
    }
}

/// A violation severity category as printed on the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    Priority,
    PriorityFoundation,
    Core,
    Critical,
    Noncritical,
}

impl ViolationCategory {
    pub const ALL: [ViolationCategory; 5] = [
        Self::Priority,
        Self::PriorityFoundation,
        Self::Core,
        Self::Critical,
        Self::Noncritical,
    ];

    /// Bold label heading the category's count block on the report.
    pub fn label(self) -> &'static str {
        match self {
            Self::Priority => "Priority",
            Self::PriorityFoundation => "Priority Foundation",
            Self::Core => "Core",
            Self::Critical => "Critical Violations",
            Self::Noncritical => "Noncritical Violations",
        }
    }

    /// Column prefix in the summary export, e.g. `priority_violations`.
    pub fn column_prefix(self) -> &'static str {
        match self {
            Self::Priority => "priority_violations",
            Self::PriorityFoundation => "priority_foundation_violations",
            Self::Core => "core_violations",
            Self::Critical => "critical_violations",
            Self::Noncritical => "noncritical_violations",
        }
    }
}

/// Count block for one category: cited, corrected on site, repeated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub count: u32,
    pub corrected_on_site: u32,
    pub repeated: u32,
}

/// Per-category counts. `None` means the category is absent from the report
/// or does not apply to its generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub priority: Option<CategoryCounts>,
    pub priority_foundation: Option<CategoryCounts>,
    pub core: Option<CategoryCounts>,
    pub critical: Option<CategoryCounts>,
    pub noncritical: Option<CategoryCounts>,
}

impl ViolationCounts {
    pub fn get(&self, category: ViolationCategory) -> Option<CategoryCounts> {
        match category {
            ViolationCategory::Priority => self.priority,
            ViolationCategory::PriorityFoundation => self.priority_foundation,
            ViolationCategory::Core => self.core,
            ViolationCategory::Critical => self.critical,
            ViolationCategory::Noncritical => self.noncritical,
        }
    }

    pub fn set(&mut self, category: ViolationCategory, counts: Option<CategoryCounts>) {
        let slot = match category {
            ViolationCategory::Priority => &mut self.priority,
            ViolationCategory::PriorityFoundation => &mut self.priority_foundation,
            ViolationCategory::Core => &mut self.core,
            ViolationCategory::Critical => &mut self.critical,
            ViolationCategory::Noncritical => &mut self.noncritical,
        };
        *slot = counts;
    }
}

/// One row of the inspection summary relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionSummary {
    pub inspection_id: InspectionId,
    pub establishment_name: String,
    pub address: String,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub inspection_date: Option<NaiveDate>,
    /// Rendered as printed, e.g. `10:30 AM`.
    pub inspection_time_in: Option<String>,
    pub inspection_time_out: Option<String>,
    pub license_holder: String,
    pub license_number: Option<String>,
    pub license_period_start: Option<NaiveDate>,
    pub license_period_end: Option<NaiveDate>,
    pub establishment_type: Option<String>,
    /// 0 when no risk category box is marked.
    pub risk_category: u8,
    pub inspection_type: Option<String>,
    /// Number of accepted violation rows. Never read from a printed total.
    pub total_violations: u32,
    pub counts: ViolationCounts,
    pub inspector_comments: String,
    pub inspector_name: String,
    pub inspector_badge_number: String,
    /// Provenance only: the id was listed by the portal or confirmed earlier.
    pub known_valid: bool,
}

/// One cited violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDetail {
    pub inspection_id: InspectionId,
    /// 1-based, as printed on the report.
    pub violation_number: u32,
    pub violation_description: Option<String>,
    pub violation_text: String,
    pub regulatory_code: Option<String>,
}

/// Summary plus detail rows produced from one cached document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInspection {
    pub summary: InspectionSummary,
    pub violations: Vec<ViolationDetail>,
}

impl ExtractedInspection {
    /// Pair a summary with its violations, deriving `total_violations` from
    /// the violation rows.
    pub fn new(mut summary: InspectionSummary, violations: Vec<ViolationDetail>) -> Self {
        summary.total_violations = violations.len() as u32;
        Self {
            summary,
            violations,
        }
    }

    pub fn inspection_id(&self) -> InspectionId {
        self.summary.inspection_id
    }
}

/// Outcome of classifying one identifier against the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessRecord {
    pub inspection_id: InspectionId,
    pub was_live: bool,
    pub checked_on: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64) -> InspectionSummary {
        InspectionSummary {
            inspection_id: InspectionId::new(id).unwrap(),
            establishment_name: "Blue Heron Cafe".into(),
            address: "100 Main St NW Washington, DC 20001".into(),
            telephone: None,
            email: None,
            inspection_date: NaiveDate::from_ymd_opt(2019, 5, 3),
            inspection_time_in: None,
            inspection_time_out: None,
            license_holder: "Blue Heron LLC".into(),
            license_number: Some("LIC-1".into()),
            license_period_start: None,
            license_period_end: None,
            establishment_type: None,
            risk_category: 0,
            inspection_type: None,
            total_violations: 5,
            counts: ViolationCounts::default(),
            inspector_comments: String::new(),
            inspector_name: "J. Smith".into(),
            inspector_badge_number: "123".into(),
            known_valid: false,
        }
    }

    #[test]
    fn zero_is_not_an_inspection_id() {
        assert!(InspectionId::new(0).is_err());
        assert!("0".parse::<InspectionId>().is_err());
        assert!(InspectionId::try_from(-4i64).is_err());
        assert_eq!(" 838175 ".parse::<InspectionId>().unwrap().get(), 838175);
    }

    #[test]
    fn inspection_id_fits_the_export_column() {
        let max = InspectionId::new(i64::MAX as u64).unwrap();
        assert_eq!(max.as_i64(), i64::MAX);
        assert!(InspectionId::new(i64::MAX as u64 + 1).is_err());
        assert!(InspectionId::new(u64::MAX).is_err());
        assert!("18446744073709551615".parse::<InspectionId>().is_err());
    }

    #[test]
    fn inspection_id_serde_rejects_zero() {
        let parsed: Result<InspectionId, _> = serde_json::from_str("0");
        assert!(parsed.is_err());
        let parsed: InspectionId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed.get(), 42);
    }

    #[test]
    fn total_violations_follows_rows_not_printed_total() {
        let id = InspectionId::new(7).unwrap();
        let rows: Vec<ViolationDetail> = (1..=3)
            .map(|n| ViolationDetail {
                inspection_id: id,
                violation_number: n,
                violation_description: None,
                violation_text: format!("observation {n}"),
                regulatory_code: None,
            })
            .collect();
        let extracted = ExtractedInspection::new(summary(7), rows);
        assert_eq!(extracted.summary.total_violations, 3);
    }

    #[test]
    fn variant_categories() {
        assert_eq!(SchemaVariant::Legacy.categories().len(), 2);
        assert_eq!(SchemaVariant::Current.categories().len(), 3);
        assert!(SchemaVariant::Uncategorized.categories().is_empty());
        assert!(!SchemaVariant::Invalid.is_valid());
    }

    #[test]
    fn counts_set_and_get_are_independent_per_category() {
        let mut counts = ViolationCounts::default();
        let critical = CategoryCounts {
            count: 2,
            corrected_on_site: 1,
            repeated: 0,
        };
        counts.set(ViolationCategory::Critical, Some(critical));
        assert_eq!(counts.get(ViolationCategory::Critical), Some(critical));
        assert_eq!(counts.get(ViolationCategory::Noncritical), None);
    }
}
