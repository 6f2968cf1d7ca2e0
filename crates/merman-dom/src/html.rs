use crate::node::HTML_VOID_ELEMENTS;
use crate::{Document, Element, Node, Result};
use lol_html::html_content::EndTag;
use lol_html::{
    EndTagHandler, HandlerResult, RewriteStrSettings, doc_comments, doc_text, doctype, element,
    rewrite_str,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Start tags that close an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "dialog", "dir", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hgroup", "hr", "li", "listing", "main", "menu", "nav", "ol", "p", "pre",
    "section", "summary", "table", "ul", "xmp",
];

/// Elements an implied end tag never reaches past.
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

impl Document {
    /// Loads an HTML document (or fragment) into a page tree.
    ///
    /// `lol_html` is a streaming rewriter rather than a tree builder, so the tree is assembled
    /// from its callbacks. A start tag first closes whatever it ends implicitly (`<p>` before a
    /// block, a previous `<li>`, `<dt>`/`<dd>`, `<option>` or table cell), then opens an element
    /// under the innermost open one. An end tag closes its element together with anything left
    /// open inside it. Text and comments are kept as raw source.
    pub fn parse_html(html: &str) -> Result<Self> {
        let mut document = Document::new();
        let open = Rc::new(RefCell::new(vec![document.root().clone()]));
        let doctype_name: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

        let on_element = Rc::clone(&open);
        let on_text = Rc::clone(&open);
        let on_comment = Rc::clone(&open);
        let on_doctype = Rc::clone(&doctype_name);

        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("*", move |el| {
                    let node = Element::new(&el.tag_name());
                    for attr in el.attributes() {
                        node.set_attribute(&attr.name(), &attr.value());
                    }

                    let parent = {
                        let mut stack = on_element.borrow_mut();
                        close_implied(&mut stack, &node.tag_name());
                        stack.last().cloned()
                    };
                    if let Some(parent) = parent {
                        parent.append_child(node.clone());
                    }

                    match el.end_tag_handlers() {
                        Some(handlers) => {
                            node.set_void(false);
                            on_element.borrow_mut().push(node.clone());
                            let open = Rc::clone(&on_element);
                            let handler: EndTagHandler<'static> =
                                Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
                                    close(&mut open.borrow_mut(), &node);
                                    Ok(())
                                });
                            handlers.push(handler);
                        }
                        None => node.set_void(true),
                    }
                    Ok(())
                })],
                document_content_handlers: vec![
                    doctype!(move |d| {
                        *on_doctype.borrow_mut() = Some(d.name().unwrap_or_else(|| "html".into()));
                        Ok(())
                    }),
                    doc_comments!(move |c| {
                        let parent = on_comment.borrow().last().cloned();
                        if let Some(parent) = parent {
                            parent.append_comment(&c.text());
                        }
                        Ok(())
                    }),
                    doc_text!(move |t| {
                        let parent = on_text.borrow().last().cloned();
                        if let Some(parent) = parent {
                            parent.append_text(t.as_str());
                        }
                        Ok(())
                    }),
                ],
                ..RewriteStrSettings::new()
            },
        )?;

        let name = doctype_name.borrow_mut().take();
        document.set_doctype(name);
        Ok(document)
    }
}

/// Pops `node` and everything opened inside it. No-op if `node` was already closed implicitly.
fn close(open: &mut Vec<Element>, node: &Element) {
    if let Some(pos) = open.iter().rposition(|el| el.ptr_eq(node)) {
        open.truncate(pos);
    }
}

/// Pops the innermost open element named in `targets` (and everything above it), unless an
/// element for which `stop` holds is found first. The document root is never popped.
fn close_nearest(open: &mut Vec<Element>, targets: &[&str], stop: impl Fn(&str) -> bool) {
    for i in (1..open.len()).rev() {
        let tag = open[i].tag_name();
        if targets.contains(&tag.as_str()) {
            open.truncate(i);
            return;
        }
        if stop(&tag) {
            return;
        }
    }
}

fn close_top(open: &mut Vec<Element>, targets: &[&str]) {
    if open.len() > 1 && open.last().is_some_and(|el| targets.contains(&el.tag_name().as_str())) {
        open.pop();
    }
}

/// Applies the implied end tags of an opening `tag`.
fn close_implied(open: &mut Vec<Element>, tag: &str) {
    let in_scope = |t: &str| SCOPE_BOUNDARIES.contains(&t);
    // Block-level containers other than `address`, `div` and `p` stop list item closing.
    let in_list_scope = |t: &str| {
        in_scope(t) || (CLOSES_PARAGRAPH.contains(&t) && !matches!(t, "address" | "div" | "p"))
    };

    if CLOSES_PARAGRAPH.contains(&tag) {
        close_nearest(open, &["p"], in_scope);
    }
    match tag {
        "li" => close_nearest(open, &["li"], in_list_scope),
        "dd" | "dt" => close_nearest(open, &["dd", "dt"], in_list_scope),
        "option" => close_top(open, &["option"]),
        "optgroup" => {
            close_top(open, &["option"]);
            close_top(open, &["optgroup"]);
        }
        "tbody" | "thead" | "tfoot" => {
            close_nearest(open, &["tbody", "thead", "tfoot"], |t| matches!(t, "table" | "html"))
        }
        "tr" => close_nearest(open, &["tr"], |t| {
            matches!(t, "table" | "tbody" | "thead" | "tfoot" | "html")
        }),
        "td" | "th" => close_nearest(open, &["td", "th"], |t| matches!(t, "tr" | "table" | "html")),
        h if HEADINGS.contains(&h) => close_top(open, HEADINGS),
        _ => {}
    }
}

pub(crate) fn write_children(out: &mut String, el: &Element) {
    for node in el.child_nodes() {
        match node {
            Node::Element(child) => write_element(out, &child),
            Node::Text(text) => out.push_str(&text),
            Node::Comment(text) => {
                out.push_str("<!--");
                out.push_str(&text);
                out.push_str("-->");
            }
        }
    }
}

pub(crate) fn write_element(out: &mut String, el: &Element) {
    let tag = el.tag_name();
    out.push('<');
    out.push_str(&tag);
    for (name, value) in el.attributes() {
        out.push(' ');
        out.push_str(&name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }

    if el.is_void() {
        // Self-closing foreign content (`<path/>` inside `<svg>`) must keep its slash to
        // round-trip through an HTML parser.
        if !HTML_VOID_ELEMENTS.contains(&tag.as_str()) {
            out.push('/');
        }
        out.push('>');
        return;
    }

    out.push('>');
    write_children(out, el);
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}
