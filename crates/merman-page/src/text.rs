use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn line_break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"))
}

/// Decodes HTML entities (`&gt;`, `&#9829;`, `&infin;`, ...) into Unicode.
///
/// Diagram sources are read back from element markup, where the page author (or the HTML
/// serializer) had to escape `<`, `>` and `&`.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    htmlize::unescape(input)
}

/// Turns an element's raw markup into diagram source text.
///
/// Entities are decoded, surrounding whitespace is trimmed, and every line-break tag spelling
/// (`<br>`, `<BR />`, `<br/>`) is canonicalized to `<br/>`, which the diagram grammars accept
/// inside labels.
pub fn normalize_source(raw: &str) -> String {
    let decoded = decode_entities(raw);
    line_break_regex()
        .replace_all(decoded.trim(), "<br/>")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_entities_passes_plain_text_through() {
        assert!(matches!(decode_entities("A-->B"), Cow::Borrowed("A-->B")));
        assert_eq!(decode_entities("A--&gt;B &amp; &#9829;"), "A-->B & \u{2665}");
    }

    #[test]
    fn normalize_source_decodes_trims_and_canonicalizes_breaks() {
        let raw = "\n   graph TD\n  A[one<BR>two] --&gt; B[three&lt;br /&gt;four]<br/>\n  ";
        assert_eq!(
            normalize_source(raw),
            "graph TD\n  A[one<br/>two] --> B[three<br/>four]<br/>"
        );
    }

    #[test]
    fn normalize_source_of_blank_markup_is_empty() {
        assert_eq!(normalize_source(" \n\t "), "");
    }
}
