#![forbid(unsafe_code)]

//! In-memory page tree for headless Mermaid page integration.
//!
//! A browser hands Mermaid a live DOM. Headless pipelines (static site generators, HTML
//! post-processors, tests) need something with the same surface: attribute get/set, content
//! get/set and `querySelectorAll`. This crate provides exactly that and nothing more:
//! - [`Document`] / [`Element`]: a shared, mutable element tree (`Rc`-based, single-threaded)
//! - [`selector`]: a CSS selector subset (type, `*`, `.class`, `#id`, attribute matchers,
//!   descendant and child combinators, selector lists)
//! - HTML load ([`Document::parse_html`], built on `lol_html`) and serialization
//!   ([`Document::to_html`], [`Element::inner_html`])

mod error;
mod html;
mod node;
pub mod selector;

pub use error::{Error, Result};
pub use node::{Document, Element, Node};
pub use selector::{SelectorError, SelectorList};
