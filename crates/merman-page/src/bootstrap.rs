use crate::process::{PassContext, PassSummary, process};
use crate::render::RenderEngine;
use crate::select::{Target, resolve};
use crate::{Error, IdGenerator, MermaidConfig, Result};
use futures::executor::{LocalPool, LocalSpawner};
use merman_dom::Document;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Called with the diagram id once its markup is in the page.
pub type CompletionCallback = Rc<dyn Fn(&str)>;

pub type ErrorHandler = Rc<dyn Fn(&Error)>;

/// A shared, replaceable error handler.
///
/// Clones share the same cell, so a slot handed to [`Mermaid::with_error_slot`] (or read from
/// [`Mermaid::parse_error`]) can be set, replaced or cleared at any time before an error occurs.
#[derive(Clone, Default)]
pub struct ErrorSlot(Rc<RefCell<Option<ErrorHandler>>>);

impl std::fmt::Debug for ErrorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorSlot").field(&self.is_set()).finish()
    }
}

impl ErrorSlot {
    pub fn set(&self, handler: impl Fn(&Error) + 'static) {
        *self.0.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn clear(&self) {
        *self.0.borrow_mut() = None;
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Passes `err` to the handler, if any. Returns whether a handler ran.
    pub fn notify(&self, err: &Error) -> bool {
        // Cloned out so the handler may replace itself.
        let handler = self.0.borrow().clone();
        match handler {
            Some(handler) => {
                handler(err);
                true
            }
            None => false,
        }
    }
}

/// Page-level entry point: finds diagram blocks in a document and renders each exactly once.
///
/// ```ignore
/// let mermaid = Mermaid::with_document(engine, Document::parse_html(&html)?);
/// mermaid.set_error_handler(|err| eprintln!("{err}"));
/// mermaid.content_loaded();      // auto-start pass, if `startOnLoad`
/// mermaid.run_until_stalled();   // finish renders that did not complete inline
/// let html = mermaid.document().unwrap().to_html();
/// ```
pub struct Mermaid {
    engine: Rc<dyn RenderEngine>,
    document: Option<Document>,
    /// Receives every error caught by [`Mermaid::init`] and every late render failure.
    pub parse_error: ErrorSlot,
    load_hook: Cell<bool>,
    /// First clock-based id number not yet issued on this page.
    id_high_water: Rc<Cell<u64>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl std::fmt::Debug for Mermaid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mermaid")
            .field("config", &self.engine.config_store())
            .field("document", &self.document.is_some())
            .field("parse_error", &self.parse_error)
            .field("load_hook", &self.load_hook.get())
            .finish_non_exhaustive()
    }
}

impl Mermaid {
    /// A headless bootstrapper: explicit element targets only, no auto-start.
    pub fn new(engine: Rc<dyn RenderEngine>) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            engine,
            document: None,
            parse_error: ErrorSlot::default(),
            load_hook: Cell::new(false),
            id_high_water: Rc::default(),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    /// A bootstrapper bound to a page. Registers the one-shot load hook
    /// ([`Mermaid::content_loaded`]).
    pub fn with_document(engine: Rc<dyn RenderEngine>, document: Document) -> Self {
        let mut mermaid = Self::new(engine);
        mermaid.document = Some(document);
        mermaid.load_hook.set(true);
        tracing::debug!("Registered page load hook");
        mermaid
    }

    /// Uses `slot` as the error handler cell instead of a fresh one.
    pub fn with_error_slot(mut self, slot: ErrorSlot) -> Self {
        self.parse_error = slot;
        self
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Forwards a site configuration to the engine.
    pub fn initialize(&self, config: &MermaidConfig) {
        self.engine.initialize(config);
    }

    pub fn set_error_handler(&self, handler: impl Fn(&Error) + 'static) {
        self.parse_error.set(handler);
    }

    /// Validates diagram source with the engine.
    pub fn parse(&self, text: &str) -> Result<()> {
        self.engine
            .parse(text)
            .map_err(|source| Error::Parse { source })
    }

    /// Renders the diagrams selected by `targets`, containing every failure.
    ///
    /// Errors are logged and handed to [`Mermaid::parse_error`]; they never reach the caller.
    /// Use [`Mermaid::try_init`] to handle them directly instead.
    pub fn init(
        &self,
        config: Option<&MermaidConfig>,
        targets: impl Into<Target>,
        callback: Option<CompletionCallback>,
    ) {
        if let Err(err) = self.try_init(config, targets, callback) {
            tracing::warn!(error = %err, "Diagram rendering failed");
            if !self.parse_error.notify(&err) {
                tracing::debug!("No error handler registered; error dropped");
            }
        }
    }

    /// Like [`Mermaid::init`], but returns failures to the caller.
    pub fn try_init(
        &self,
        config: Option<&MermaidConfig>,
        targets: impl Into<Target>,
        callback: Option<CompletionCallback>,
    ) -> Result<PassSummary> {
        let store = self.engine.config_store();

        if let Some(start_on_load) = config.and_then(MermaidConfig::start_on_load) {
            tracing::debug!(start_on_load, "Updating startOnLoad");
            let mut partial = MermaidConfig::empty_object();
            partial.set_value("startOnLoad", Value::Bool(start_on_load));
            store.update(&partial);
        }

        let callback = callback.or_else(|| store.callback());
        tracing::debug!(callback = callback.is_some(), "Resolved completion callback");

        let elements = resolve(targets.into(), self.document.as_ref())?;
        tracing::debug!(count = elements.len(), "Found diagrams");

        let ids = IdGenerator::from_config(&store.get())
            .with_high_water(Rc::clone(&self.id_high_water));
        tracing::debug!(deterministic = ids.is_deterministic(), "Assigning diagram ids");
        process(
            &elements,
            PassContext {
                engine: &*self.engine,
                spawner: &self.spawner,
                ids,
                callback,
                errors: self.parse_error.clone(),
            },
        )
    }

    /// The page finished loading.
    ///
    /// The first call on a page-bound bootstrapper runs a pass over the whole document if
    /// `startOnLoad` is set; every later call (and any call on a headless one) does nothing.
    pub fn content_loaded(&self) {
        if !self.load_hook.replace(false) {
            return;
        }
        let start_on_load = self
            .engine
            .config_store()
            .get()
            .start_on_load()
            .unwrap_or(false);
        tracing::debug!(start_on_load, "Page loaded");
        if start_on_load {
            self.init(None, Target::Default, None);
        }
    }

    /// Runs spawned render continuations until none can make progress.
    ///
    /// Calling this from inside a continuation is a no-op.
    pub fn run_until_stalled(&self) {
        match self.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => tracing::debug!("Render executor already running"),
        }
    }
}
