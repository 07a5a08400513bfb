//! Declarative field locators.
//!
//! Both report generations present their fields as a visible label followed
//! by values at fixed child positions of some ancestor of the label. Each
//! field is described once in [`FIELDS`] as an anchor, a navigation path, the
//! child offsets to read, and a decoder; [`locate`] is the only traversal.

use chrono::NaiveDate;
use foodinspect_core::{CategoryCounts, ViolationCategory};

use crate::dom::{DocumentTree, NodeId};

/// Element tag plus visible label text that a field hangs off.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub tag: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Parent,
    NextElement,
    PreviousElement,
}

/// Which nodes to hand to the decoder once the path is walked.
#[derive(Debug, Clone, Copy)]
pub enum Pick {
    /// The node reached by the path itself.
    Node,
    /// Children of that node at these positions (text nodes count).
    Children(&'static [usize]),
}

#[derive(Debug, Clone, Copy)]
pub struct Locator {
    pub anchor: Anchor,
    pub path: &'static [Step],
    pub pick: Pick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateError {
    AnchorMissing,
    PathBroken,
    OffsetMissing(usize),
}

/// Walk `locator` from its anchor and return the picked nodes.
pub fn locate<D: DocumentTree>(doc: &D, locator: &Locator) -> Result<Vec<NodeId>, LocateError> {
    let mut node = doc
        .find_labeled(locator.anchor.tag, locator.anchor.label)
        .ok_or(LocateError::AnchorMissing)?;
    for step in locator.path {
        node = match step {
            Step::Parent => doc.parent(node),
            Step::NextElement => doc.next_element_sibling(node),
            Step::PreviousElement => doc.previous_element_sibling(node),
        }
        .ok_or(LocateError::PathBroken)?;
    }
    match locator.pick {
        Pick::Node => Ok(vec![node]),
        Pick::Children(offsets) => offsets
            .iter()
            .map(|&at| doc.child(node, at).ok_or(LocateError::OffsetMissing(at)))
            .collect(),
    }
}

/// Scalar fields of the inspection summary that come from the locator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EstablishmentName,
    Address,
    CityLine,
    Telephone,
    Email,
    InspectionDate,
    InspectionTimeIn,
    InspectionTimeOut,
    LicenseHolder,
    LicenseNumber,
    LicensePeriodStart,
    LicensePeriodEnd,
    InspectionType,
    EstablishmentType,
    InspectorComments,
    InspectorName,
    InspectorBadgeNumber,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Self::EstablishmentName => "establishment_name",
            Self::Address => "address",
            Self::CityLine => "city_state_zip",
            Self::Telephone => "telephone",
            Self::Email => "email",
            Self::InspectionDate => "inspection_date",
            Self::InspectionTimeIn => "inspection_time_in",
            Self::InspectionTimeOut => "inspection_time_out",
            Self::LicenseHolder => "license_holder",
            Self::LicenseNumber => "license_number",
            Self::LicensePeriodStart => "license_period_start",
            Self::LicensePeriodEnd => "license_period_end",
            Self::InspectionType => "inspection_type",
            Self::EstablishmentType => "establishment_type",
            Self::InspectorComments => "inspector_comments",
            Self::InspectorName => "inspector_name",
            Self::InspectorBadgeNumber => "inspector_badge_number",
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Date(_) => None,
        }
    }

    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(d),
            Self::Text(_) => None,
        }
    }
}

pub const COMMENTS_LABEL: &str = "Inspector Comments:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Whitespace-collapsed text of the first node.
    Collapsed,
    /// Text of the first node with non-breaking spaces removed, trimmed.
    WithoutNbsp,
    /// First whitespace token of the first node.
    FirstToken,
    /// Trimmed text of the first node.
    Stripped,
    /// Three nodes: month, day, year.
    Date,
    /// Three nodes: hour, minute, meridiem.
    Time,
    /// Joined text of the first node with the comments label removed.
    Comments,
}

impl Decoder {
    /// Decode the located nodes. Blank values decode to `None`.
    pub fn decode<D: DocumentTree>(self, doc: &D, nodes: &[NodeId]) -> Option<Value> {
        let first = *nodes.first()?;
        let text = match self {
            Self::Collapsed => crate::dom::normalize(&doc.text(first)),
            Self::WithoutNbsp => without_nbsp(&doc.text(first)),
            Self::FirstToken => doc.text(first).split_whitespace().next()?.to_string(),
            Self::Stripped => doc.text(first).trim().to_string(),
            Self::Date => return decode_date(doc, nodes).map(Value::Date),
            Self::Time => decode_time(doc, nodes)?,
            Self::Comments => {
                let joined = doc.joined_text(first);
                joined
                    .strip_prefix(COMMENTS_LABEL)
                    .unwrap_or(&joined)
                    .trim()
                    .to_string()
            }
        };
        (!text.is_empty()).then_some(Value::Text(text))
    }
}

fn without_nbsp(s: &str) -> String {
    s.replace('\u{a0}', "").trim().to_string()
}

fn leading_int<D: DocumentTree>(doc: &D, node: NodeId) -> Option<u32> {
    doc.text(node).split_whitespace().next()?.parse().ok()
}

fn decode_date<D: DocumentTree>(doc: &D, nodes: &[NodeId]) -> Option<NaiveDate> {
    let [month, day, year] = nodes else {
        return None;
    };
    let month = leading_int(doc, *month)?;
    let day = leading_int(doc, *day)?;
    let year = i32::try_from(leading_int(doc, *year)?).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn decode_time<D: DocumentTree>(doc: &D, nodes: &[NodeId]) -> Option<String> {
    let [hour, minute, meridiem] = nodes else {
        return None;
    };
    let hour = without_nbsp(&doc.text(*hour));
    if hour.is_empty() {
        return None;
    }
    let minute = without_nbsp(&doc.text(*minute));
    let meridiem = without_nbsp(&doc.text(*meridiem));
    Some(format!("{hour}:{minute} {meridiem}").trim().to_string())
}

/// One row of the locator table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    pub locator: Locator,
    pub decoder: Decoder,
    /// A required field whose nodes cannot be located rejects the document.
    pub required: bool,
}

const fn span(label: &'static str) -> Anchor {
    Anchor { tag: "span", label }
}

const fn bold(label: &'static str) -> Anchor {
    Anchor { tag: "b", label }
}

const fn cell(label: &'static str) -> Anchor {
    Anchor { tag: "td", label }
}

const PARENT: &[Step] = &[Step::Parent];

const fn spec(
    field: Field,
    anchor: Anchor,
    path: &'static [Step],
    pick: Pick,
    decoder: Decoder,
    required: bool,
) -> FieldSpec {
    FieldSpec {
        field,
        locator: Locator { anchor, path, pick },
        decoder,
        required,
    }
}

/// The locator table, shared by both report generations.
///
/// Required fields come first in reporting order, so the first one missing is
/// the one named in the rejection.
pub const FIELDS: &[FieldSpec] = &[
    spec(
        Field::EstablishmentName,
        span("Establishment Name"),
        PARENT,
        Pick::Children(&[2]),
        Decoder::Collapsed,
        true,
    ),
    spec(
        Field::Address,
        span("Address"),
        PARENT,
        Pick::Children(&[2]),
        Decoder::Collapsed,
        true,
    ),
    spec(
        Field::InspectionDate,
        span("Date of Inspection"),
        PARENT,
        Pick::Children(&[3, 7, 11]),
        Decoder::Date,
        true,
    ),
    spec(
        Field::LicenseHolder,
        span("License Holder"),
        PARENT,
        Pick::Children(&[2]),
        Decoder::Collapsed,
        true,
    ),
    spec(
        Field::LicenseNumber,
        span("License/Customer No."),
        PARENT,
        Pick::Children(&[2]),
        Decoder::FirstToken,
        true,
    ),
    spec(
        Field::InspectorComments,
        bold(COMMENTS_LABEL),
        PARENT,
        Pick::Node,
        Decoder::Comments,
        true,
    ),
    spec(
        Field::InspectorName,
        cell("Inspector (Signature)"),
        &[Step::Parent, Step::PreviousElement],
        Pick::Children(&[3]),
        Decoder::WithoutNbsp,
        true,
    ),
    spec(
        Field::InspectorBadgeNumber,
        cell("Inspector (Signature)"),
        &[Step::Parent, Step::PreviousElement],
        Pick::Children(&[5]),
        Decoder::WithoutNbsp,
        true,
    ),
    spec(
        Field::CityLine,
        span("City/State/Zip Code"),
        PARENT,
        Pick::Children(&[2]),
        Decoder::Collapsed,
        false,
    ),
    spec(
        Field::Telephone,
        span("Telephone"),
        PARENT,
        Pick::Children(&[3]),
        Decoder::WithoutNbsp,
        false,
    ),
    spec(
        Field::Email,
        span("Telephone"),
        PARENT,
        Pick::Children(&[6]),
        Decoder::FirstToken,
        false,
    ),
    spec(
        Field::InspectionTimeIn,
        span("Date of Inspection"),
        PARENT,
        Pick::Children(&[15, 19, 21]),
        Decoder::Time,
        false,
    ),
    spec(
        Field::InspectionTimeOut,
        span("Date of Inspection"),
        PARENT,
        Pick::Children(&[25, 29, 31]),
        Decoder::Time,
        false,
    ),
    spec(
        Field::LicensePeriodStart,
        span("License Period"),
        PARENT,
        Pick::Children(&[3, 7, 11]),
        Decoder::Date,
        false,
    ),
    spec(
        Field::LicensePeriodEnd,
        span("License Period"),
        PARENT,
        Pick::Children(&[15, 19, 23]),
        Decoder::Date,
        false,
    ),
    spec(
        Field::InspectionType,
        span("Type of Inspection"),
        &[Step::NextElement],
        Pick::Node,
        Decoder::Stripped,
        false,
    ),
    spec(
        Field::EstablishmentType,
        span("Establishment Type:"),
        PARENT,
        Pick::Children(&[2]),
        Decoder::Collapsed,
        false,
    ),
];

/// Count cells of a category row: the label's grandparent row, cells 3, 7, 11.
pub fn category_locator(category: ViolationCategory) -> Locator {
    Locator {
        anchor: bold(category.label()),
        path: &[Step::Parent, Step::Parent],
        pick: Pick::Children(&[3, 7, 11]),
    }
}

/// Read one category's count triple. `None` when the category label is
/// absent; blank or missing cells inside a present row count as 0.
pub fn category_counts<D: DocumentTree>(
    doc: &D,
    category: ViolationCategory,
) -> Option<CategoryCounts> {
    let locator = category_locator(category);
    let row = match locate(doc, &locator) {
        Ok(nodes) => nodes,
        Err(LocateError::AnchorMissing) => return None,
        Err(_) => Vec::new(),
    };
    let cell = |i: usize| {
        row.get(i)
            .and_then(|&node| {
                let first = doc.child(node, 0).unwrap_or(node);
                leading_int(doc, first)
            })
            .unwrap_or(0)
    };
    Some(CategoryCounts {
        count: cell(0),
        corrected_on_site: cell(1),
        repeated: cell(2),
    })
}
