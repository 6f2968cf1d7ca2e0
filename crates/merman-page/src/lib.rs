#![forbid(unsafe_code)]

//! Page integration for Mermaid diagrams (headless).
//!
//! Finds diagram blocks in a page, renders each one exactly once through a [`RenderEngine`] and
//! writes the output back in place. The diagram engine itself is out of scope: parsing, layout
//! and SVG generation live behind the trait.
//!
//! Design goals:
//! - idempotent passes: a `data-processed` marker is set before rendering, never cleared
//! - reproducible ids (`mermaid-<n>`) when `deterministicIds` is set
//! - failures contained per call and reported through a replaceable error handler
//! - runtime-agnostic async renders (a local `futures` executor, no specific runtime)

mod bootstrap;
pub mod config;
pub mod directive;
mod error;
pub mod ids;
pub mod process;
pub mod render;
pub mod select;
pub mod text;

pub use bootstrap::{CompletionCallback, ErrorHandler, ErrorSlot, Mermaid};
pub use config::{ConfigStore, MermaidConfig};
pub use directive::{DirectiveError, detect_init};
pub use error::{Error, Result};
pub use ids::{ID_PREFIX, IdGenerator};
pub use merman_dom::{Document, Element};
pub use process::{PROCESSED_ATTRIBUTE, PassContext, PassSummary, is_processed, process};
pub use render::{BindFn, BoxError, RenderEngine, RenderRequest, RenderTask, Rendered};
pub use select::{DEFAULT_SELECTOR, Target, resolve};
pub use text::{decode_entities, normalize_source};
