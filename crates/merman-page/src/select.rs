use crate::{Error, Result};
use merman_dom::{Document, Element};
use serde_json::Value;

/// The class every diagram block carries unless the caller says otherwise.
pub const DEFAULT_SELECTOR: &str = ".mermaid";

/// What a pass should render.
#[derive(Debug, Clone, Default)]
pub enum Target {
    /// Every element matching [`DEFAULT_SELECTOR`].
    #[default]
    Default,
    /// Every element matching a CSS selector.
    Selector(String),
    Element(Element),
    /// An explicit list, processed as given.
    Elements(Vec<Element>),
    /// A dynamically typed target (for example read from JSON): `null` means [`Target::Default`],
    /// a string is a selector, anything else is rejected when the pass starts.
    Value(Value),
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<Element> for Target {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<Vec<Element>> for Target {
    fn from(elements: Vec<Element>) -> Self {
        Self::Elements(elements)
    }
}

impl From<&[Element]> for Target {
    fn from(elements: &[Element]) -> Self {
        Self::Elements(elements.to_vec())
    }
}

impl From<Value> for Target {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl<T: Into<Target>> From<Option<T>> for Target {
    fn from(target: Option<T>) -> Self {
        target.map(Into::into).unwrap_or_default()
    }
}

/// Resolves `target` to the ordered list of candidate elements.
pub fn resolve(target: Target, document: Option<&Document>) -> Result<Vec<Element>> {
    match target {
        Target::Default => query(document, DEFAULT_SELECTOR),
        Target::Selector(selector) => query(document, &selector),
        Target::Element(element) => Ok(vec![element]),
        Target::Elements(elements) => Ok(elements),
        Target::Value(Value::Null) => query(document, DEFAULT_SELECTOR),
        Target::Value(Value::String(selector)) => query(document, &selector),
        Target::Value(other) => Err(Error::InvalidArgument {
            message: format!("expected a selector string, found {}", json_kind(&other)),
        }),
    }
}

fn query(document: Option<&Document>, selector: &str) -> Result<Vec<Element>> {
    let Some(document) = document else {
        return Err(Error::MissingDocument {
            selector: selector.to_string(),
        });
    };
    Ok(document.query_selector_all(selector)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Document {
        Document::parse_html(
            r#"<div class="mermaid">A-->B</div><pre class="diagram">C-->D</pre><div class="mermaid">E-->F</div>"#,
        )
        .unwrap()
    }

    #[test]
    fn default_target_selects_the_default_class() {
        let doc = page();
        let found = resolve(Target::Default, Some(&doc)).unwrap();
        assert_eq!(found, doc.query_selector_all(".mermaid").unwrap());
        assert_eq!(found.len(), 2);

        let from_null = resolve(Target::Value(Value::Null), Some(&doc)).unwrap();
        assert_eq!(from_null, found);
    }

    #[test]
    fn selector_target_selects_exact_matches() {
        let doc = page();
        let found = resolve("pre.diagram".into(), Some(&doc)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].inner_html(), "C-->D");

        let from_json = resolve(json!("pre.diagram").into(), Some(&doc)).unwrap();
        assert_eq!(from_json, found);
    }

    #[test]
    fn element_targets_pass_through() {
        let doc = page();
        let all = doc.query_selector_all("div, pre").unwrap();

        let single = resolve(all[1].clone().into(), Some(&doc)).unwrap();
        assert_eq!(single, vec![all[1].clone()]);

        let reversed: Vec<Element> = all.iter().rev().cloned().collect();
        assert_eq!(resolve(reversed.clone().into(), None).unwrap(), reversed);
    }

    #[test]
    fn unsupported_target_is_an_invalid_argument() {
        let doc = page();
        let err = resolve(json!(42).into(), Some(&doc)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn selector_failures_are_reported() {
        let doc = page();
        assert!(matches!(
            resolve("div >".into(), Some(&doc)),
            Err(Error::InvalidSelector(_))
        ));
        assert!(matches!(
            resolve(Target::Default, None),
            Err(Error::MissingDocument { .. })
        ));
    }

    #[test]
    fn optional_targets_default_when_absent() {
        assert!(matches!(Target::from(None::<&str>), Target::Default));
        assert!(matches!(Target::from(Some(".x")), Target::Selector(s) if s == ".x"));
    }
}
