//! Extraction engine: parse a cached report, detect its generation, and read
//! every field through label-anchored locators.

pub mod dom;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod resolver;

pub use dom::{DocumentTree, NodeId, ParsedDocument};
pub use error::ExtractionError;
pub use extractor::{Provenance, extract, extract_document};
pub use resolver::resolve_variant;
