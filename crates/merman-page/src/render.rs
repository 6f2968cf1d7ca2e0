use crate::{ConfigStore, MermaidConfig};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use merman_dom::Element;

/// Errors raised by a [`RenderEngine`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Attaches interactivity to an element after its rendered markup is in place.
pub type BindFn = Box<dyn FnOnce(&Element)>;

/// The eventual outcome of one render call.
///
/// Completing with `Err` is a late failure: it is reported through the error handler, but it can
/// no longer stop the pass that issued it.
pub type RenderTask = LocalBoxFuture<'static, Result<Rendered, BoxError>>;

/// One element's render call.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// `mermaid-<n>`, unique within the pass.
    pub id: String,
    /// Normalized diagram source.
    pub text: String,
    /// The element whose content will be replaced.
    pub element: Element,
}

/// Rendered markup plus an optional bind function.
pub struct Rendered {
    pub svg: String,
    pub bind: Option<BindFn>,
}

impl std::fmt::Debug for Rendered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rendered")
            .field("svg", &self.svg)
            .field("bind", &self.bind.is_some())
            .finish()
    }
}

impl Rendered {
    pub fn new(svg: impl Into<String>) -> Self {
        Self {
            svg: svg.into(),
            bind: None,
        }
    }

    pub fn with_bind(mut self, bind: impl FnOnce(&Element) + 'static) -> Self {
        self.bind = Some(Box::new(bind));
        self
    }

    /// A task that is already complete, for engines that render synchronously.
    pub fn ready(self) -> RenderTask {
        futures::future::ready(Ok(self)).boxed_local()
    }
}

/// The diagram engine behind the bootstrapper.
///
/// Parsing, layout and SVG generation all live behind this trait; the bootstrapper only decides
/// which elements to render, with which ids, and where the output goes.
pub trait RenderEngine {
    /// The engine's configuration store.
    fn config_store(&self) -> &ConfigStore;

    /// Applies a site configuration (`mermaid.initialize(config)`).
    fn initialize(&self, config: &MermaidConfig) {
        self.config_store().initialize(config);
    }

    /// Validates diagram source without rendering it.
    fn parse(&self, _text: &str) -> Result<(), BoxError> {
        Ok(())
    }

    /// Starts rendering one diagram.
    ///
    /// Returning `Err` is a synchronous failure and aborts the rest of the pass. The returned task
    /// may already be complete (see [`Rendered::ready`]) or finish later on the bootstrapper's
    /// local executor.
    fn render(&self, request: RenderRequest) -> Result<RenderTask, BoxError>;
}
