//! Document tree view used by the locators.
//!
//! Reports are parsed once with `scraper` and flattened into an arena of
//! element, text, and comment nodes. Child positions count every node kind,
//! which is what the positional offsets in the locator table are measured in.

use scraper::{ElementRef, Html};

pub type NodeId = usize;

/// Read-only tree interface the locators and decoders are written against.
pub trait DocumentTree {
    /// Number of nodes; ids are `0..len()` in document order.
    fn len(&self) -> usize;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> &[NodeId];

    /// Lower-case tag name, `None` for text and comment nodes.
    fn tag(&self, node: NodeId) -> Option<&str>;

    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Text nodes below (or at) `node`, in document order. Comments excluded.
    fn text_pieces(&self, node: NodeId) -> Vec<&str>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.tag(node).is_some()
    }

    /// Raw concatenated text.
    fn text(&self, node: NodeId) -> String {
        self.text_pieces(node).concat()
    }

    /// Text with every piece trimmed and joined by a single space.
    fn joined_text(&self, node: NodeId) -> String {
        self.text_pieces(node)
            .iter()
            .map(|piece| piece.trim())
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.children(node).get(index).copied()
    }

    fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(node)?);
        let at = siblings.iter().position(|&n| n == node)?;
        siblings[at + 1..]
            .iter()
            .copied()
            .find(|&n| self.is_element(n))
    }

    fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(node)?);
        let at = siblings.iter().position(|&n| n == node)?;
        siblings[..at]
            .iter()
            .rev()
            .copied()
            .find(|&n| self.is_element(n))
    }

    /// All elements with the given tag, in document order.
    fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        (0..self.len()).filter(move |&n| self.tag(n) == Some(tag))
    }

    /// First descendant element of `node` with the given tag.
    fn first_descendant(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if self.tag(n) == Some(tag) {
                return Some(n);
            }
            stack.extend(self.children(n).iter().rev());
        }
        None
    }

    /// First element with `tag` whose whole text equals `label`, comparing
    /// with non-breaking spaces folded and whitespace collapsed.
    fn find_labeled(&self, tag: &str, label: &str) -> Option<NodeId> {
        let wanted = normalize(label);
        self.elements_by_tag(tag)
            .find(|&n| normalize(&self.text(n)) == wanted)
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) to one space.
pub fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
enum NodeKind {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment,
}

#[derive(Debug)]
struct DomNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena-backed parse of one cached report.
#[derive(Debug)]
pub struct ParsedDocument {
    nodes: Vec<DomNode>,
}

impl ParsedDocument {
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self { nodes: Vec::new() };
        doc.push_element(parsed.root_element(), None);
        doc
    }

    /// Parse raw cached bytes. Invalid UTF-8 is replaced, not rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    pub fn root(&self) -> NodeId {
        0
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(DomNode {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        id
    }

    fn push_element(&mut self, element: ElementRef<'_>, parent: Option<NodeId>) -> NodeId {
        let value = element.value();
        let kind = NodeKind::Element {
            name: value.name().to_ascii_lowercase(),
            attrs: value
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let id = self.push(kind, parent);

        for child in element.children() {
            match child.value() {
                scraper::Node::Text(text) => {
                    let text: &str = text;
                    self.push(NodeKind::Text(text.to_string()), Some(id));
                }
                scraper::Node::Comment(_) => {
                    self.push(NodeKind::Comment, Some(id));
                }
                scraper::Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.push_element(el, Some(id));
                    }
                }
                _ => {}
            }
        }
        id
    }

    fn collect_text<'a>(&'a self, node: NodeId, out: &mut Vec<&'a str>) {
        match &self.nodes[node].kind {
            NodeKind::Text(text) => out.push(text),
            NodeKind::Comment => {}
            NodeKind::Element { .. } => {
                for &child in &self.nodes[node].children {
                    self.collect_text(child, out);
                }
            }
        }
    }
}

impl DocumentTree for ParsedDocument {
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node)?.parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    fn text_pieces(&self, node: NodeId) -> Vec<&str> {
        let mut out = Vec::new();
        if node < self.nodes.len() {
            self.collect_text(node, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_positions_count_text_nodes() {
        let doc = ParsedDocument::parse(
            "<html><body><div id=\"x\"><span>Establishment Name</span><br>BLUE HERON</div></body></html>",
        );
        let label = doc.find_labeled("span", "Establishment Name").unwrap();
        let parent = doc.parent(label).unwrap();
        assert_eq!(doc.tag(parent), Some("div"));
        assert_eq!(doc.attr(parent, "id"), Some("x"));
        assert_eq!(doc.children(parent).len(), 3);
        let value = doc.child(parent, 2).unwrap();
        assert!(!doc.is_element(value));
        assert_eq!(doc.text(value), "BLUE HERON");
    }

    #[test]
    fn labels_match_with_nbsp_and_whitespace_folded() {
        let doc = ParsedDocument::parse(
            "<table><tr><td>&nbsp;&nbsp;Inspector   (Signature)</td></tr></table>",
        );
        assert!(doc.find_labeled("td", "Inspector (Signature)").is_some());
        assert!(doc.find_labeled("td", "Inspector").is_none());
    }

    #[test]
    fn element_siblings_skip_text() {
        let doc = ParsedDocument::parse("<p><b>a</b> text <i>b</i></p>");
        let b = doc.find_labeled("b", "a").unwrap();
        let i = doc.next_element_sibling(b).unwrap();
        assert_eq!(doc.tag(i), Some("i"));
        assert_eq!(doc.previous_element_sibling(i), Some(b));
        assert_eq!(doc.next_element_sibling(i), None);
    }

    #[test]
    fn joined_text_separates_pieces() {
        let doc = ParsedDocument::parse("<p id=\"c\"><b>Inspector Comments:</b>Clean<br>Tidy </p>");
        let b = doc.find_labeled("b", "Inspector Comments:").unwrap();
        let p = doc.parent(b).unwrap();
        assert_eq!(doc.joined_text(p), "Inspector Comments: Clean Tidy");
        assert_eq!(doc.text(p), "Inspector Comments:CleanTidy ");
    }

    #[test]
    fn comments_occupy_positions_but_carry_no_text() {
        let doc = ParsedDocument::parse("<p><b>x</b><!-- note --><i>y</i></p>");
        let b = doc.find_labeled("b", "x").unwrap();
        let p = doc.parent(b).unwrap();
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(doc.text(p), "xy");
    }

    #[test]
    fn first_descendant_is_depth_first() {
        let doc = ParsedDocument::parse(
            "<table><tr id=\"r\"><td>one</td><td>two</td></tr></table>",
        );
        let one = doc.find_labeled("td", "one").unwrap();
        let row = doc.parent(one).unwrap();
        assert_eq!(doc.first_descendant(row, "td"), Some(one));
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let doc = ParsedDocument::from_bytes(b"<p>caf\xe9</p>");
        assert!(!doc.is_empty());
    }
}
