use crate::selector::SelectorList;
use crate::{Result, html};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

const DOCUMENT_TAG: &str = "#document";

/// HTML elements that never have children or an end tag.
pub(crate) const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    children: Vec<Node>,
    parent: Weak<RefCell<ElementData>>,
    void: bool,
}

/// A child of an element.
///
/// Text and comment payloads are stored as raw HTML source: entities are not decoded, so
/// serializing a freshly loaded tree reproduces the original markup.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// A shared handle to an element in a page tree.
///
/// Cloning is cheap and yields another handle to the same element. Equality and hashing use
/// handle identity, so elements can key side tables.
#[derive(Clone)]
pub struct Element(Rc<RefCell<ElementData>>);

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Element")
            .field("tag", &data.tag)
            .field("attributes", &data.attributes)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl Element {
    pub fn new(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        let void = HTML_VOID_ELEMENTS.contains(&tag.as_str());
        Self(Rc::new(RefCell::new(ElementData {
            tag,
            attributes: IndexMap::new(),
            children: Vec::new(),
            parent: Weak::new(),
            void,
        })))
    }

    /// Builder-style [`Element::set_attribute`].
    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style [`Element::append_text`].
    pub fn with_text(self, text: &str) -> Self {
        self.append_text(text);
        self
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Lowercase tag name.
    pub fn tag_name(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn is_void(&self) -> bool {
        self.0.borrow().void
    }

    pub(crate) fn set_void(&self, void: bool) {
        self.0.borrow_mut().void = void;
    }

    pub(crate) fn is_document_root(&self) -> bool {
        self.0.borrow().tag == DOCUMENT_TAG
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0
            .borrow()
            .attributes
            .contains_key(&name.to_ascii_lowercase())
    }

    /// Sets an attribute, keeping its original position when it already exists.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow_mut()
            .attributes
            .shift_remove(&name.to_ascii_lowercase())
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0
            .borrow()
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0
            .borrow()
            .attributes
            .get("class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }

    /// The parent node, including the synthetic document root.
    pub fn parent(&self) -> Option<Element> {
        self.0.borrow().parent.upgrade().map(Element)
    }

    /// The parent element (`parentElement`): `None` for top-level elements.
    pub fn parent_element(&self) -> Option<Element> {
        self.parent().filter(|p| !p.is_document_root())
    }

    pub fn child_nodes(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn children(&self) -> Vec<Element> {
        self.0
            .borrow()
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// All descendant elements in document (pre-)order, excluding `self`.
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(el) = stack.pop() {
            stack.extend(el.children().into_iter().rev());
            out.push(el);
        }
        out
    }

    /// Appends `child`, detaching it from its previous parent first.
    pub fn append_child(&self, child: Element) {
        if let Some(old) = child.parent() {
            old.0
                .borrow_mut()
                .children
                .retain(|n| !matches!(n, Node::Element(e) if e.ptr_eq(&child)));
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(Node::Element(child));
    }

    /// Appends raw HTML text, merging with a trailing text node.
    pub fn append_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut data = self.0.borrow_mut();
        if let Some(Node::Text(last)) = data.children.last_mut() {
            last.push_str(text);
            return;
        }
        data.children.push(Node::Text(text.to_string()));
    }

    pub fn append_comment(&self, text: &str) {
        self.0
            .borrow_mut()
            .children
            .push(Node::Comment(text.to_string()));
    }

    /// Concatenated text of all descendant text nodes (raw, entities not decoded).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in self.child_nodes() {
            match node {
                Node::Text(t) => out.push_str(&t),
                Node::Element(e) => out.push_str(&e.text_content()),
                Node::Comment(_) => {}
            }
        }
        out
    }

    /// Serialized markup of the children (`innerHTML`).
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        html::write_children(&mut out, self);
        out
    }

    /// Serialized markup of the element itself (`outerHTML`).
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        html::write_element(&mut out, self);
        out
    }

    /// Replaces all children with an opaque markup fragment (`innerHTML = ...`).
    ///
    /// The fragment is not parsed into elements; selector queries do not see inside it.
    pub fn set_inner_html(&self, markup: &str) {
        let old = std::mem::take(&mut self.0.borrow_mut().children);
        for node in old {
            if let Node::Element(e) = node {
                e.0.borrow_mut().parent = Weak::new();
            }
        }
        self.append_text(markup);
    }

    /// `querySelectorAll` scoped to the descendants of this element.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let list: SelectorList = selector.parse()?;
        Ok(self
            .descendants()
            .into_iter()
            .filter(|el| list.matches(el))
            .collect())
    }
}

/// A page: a synthetic root holding the top-level nodes, plus an optional doctype.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
    doctype: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            root: Element::new(DOCUMENT_TAG),
            doctype: None,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, name: Option<String>) {
        self.doctype = name;
    }

    /// Appends a top-level element.
    pub fn append_child(&self, child: Element) {
        self.root.append_child(child);
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        self.root.query_selector_all(selector)
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let list: SelectorList = selector.parse()?;
        Ok(self.root.descendants().into_iter().find(|el| list.matches(el)))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        self.root
            .descendants()
            .into_iter()
            .find(|el| el.id().as_deref() == Some(id))
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(name) = &self.doctype {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        html::write_children(&mut out, &self.root);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, Element, Element) {
        let doc = Document::new();
        let body = Element::new("body");
        let a = Element::new("div")
            .with_attribute("class", "mermaid")
            .with_text("A-->B");
        let b = Element::new("pre")
            .with_attribute("class", "mermaid other")
            .with_attribute("id", "second")
            .with_text("C-->D");
        body.append_child(a.clone());
        body.append_child(b.clone());
        doc.append_child(body);
        (doc, a, b)
    }

    #[test]
    fn query_returns_matches_in_document_order() {
        let (doc, a, b) = sample();
        let found = doc.query_selector_all(".mermaid").unwrap();
        assert_eq!(found, vec![a, b.clone()]);
        assert_eq!(doc.get_element_by_id("second"), Some(b));
    }

    #[test]
    fn element_identity_is_handle_identity() {
        let a = Element::new("div").with_text("x");
        let b = Element::new("div").with_text("x");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
    }

    #[test]
    fn set_inner_html_replaces_children_with_opaque_markup() {
        let (doc, a, _) = sample();
        a.append_child(Element::new("span").with_attribute("class", "mermaid"));
        assert_eq!(doc.query_selector_all(".mermaid").unwrap().len(), 3);

        a.set_inner_html("<svg id=\"mermaid-1\"></svg>");
        assert_eq!(a.inner_html(), "<svg id=\"mermaid-1\"></svg>");
        assert_eq!(doc.query_selector_all(".mermaid").unwrap().len(), 2);
    }

    #[test]
    fn attributes_keep_insertion_order_and_are_case_insensitive() {
        let el = Element::new("DIV")
            .with_attribute("class", "mermaid")
            .with_attribute("Data-Processed", "true");
        assert_eq!(el.tag_name(), "div");
        assert_eq!(el.attribute("data-processed").as_deref(), Some("true"));
        el.set_attribute("class", "mermaid done");
        assert_eq!(
            el.outer_html(),
            "<div class=\"mermaid done\" data-processed=\"true\"></div>"
        );
        assert_eq!(el.remove_attribute("DATA-PROCESSED").as_deref(), Some("true"));
        assert!(!el.has_attribute("data-processed"));
    }

    #[test]
    fn append_child_moves_between_parents() {
        let left = Element::new("div");
        let right = Element::new("div");
        let child = Element::new("span");
        left.append_child(child.clone());
        right.append_child(child.clone());
        assert!(left.children().is_empty());
        assert_eq!(right.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(right));
    }

    #[test]
    fn top_level_elements_have_no_parent_element() {
        let (doc, a, _) = sample();
        let body = doc.query_selector("body").unwrap().unwrap();
        assert_eq!(a.parent_element(), Some(body.clone()));
        assert_eq!(body.parent_element(), None);
        assert_eq!(body.parent(), Some(doc.root().clone()));
    }
}
