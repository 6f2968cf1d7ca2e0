//! The idempotent render pass.
//!
//! Per element: `Unprocessed -> Marked -> Rendering -> {Rendered | Failed}`. The processed marker
//! is written before the engine is called, so an element that fails is never retried by a later
//! pass; there is no transition back to `Unprocessed` here.

use crate::directive::detect_init;
use crate::render::{BoxError, RenderEngine, RenderRequest, Rendered};
use crate::text::normalize_source;
use crate::{CompletionCallback, Error, ErrorSlot, IdGenerator, Result};
use futures::FutureExt;
use futures::task::{LocalSpawn, LocalSpawnExt};
use merman_dom::Element;

/// Attribute marking an element whose diagram has already been handed to the engine.
pub const PROCESSED_ATTRIBUTE: &str = "data-processed";

pub fn is_processed(element: &Element) -> bool {
    element.has_attribute(PROCESSED_ATTRIBUTE)
}

/// Everything one pass needs besides the elements themselves.
pub struct PassContext<'a> {
    pub engine: &'a dyn RenderEngine,
    /// Runs render tasks that do not complete immediately.
    pub spawner: &'a dyn LocalSpawn,
    pub ids: IdGenerator,
    pub callback: Option<CompletionCallback>,
    /// Receives late failures (tasks that complete with an error).
    pub errors: ErrorSlot,
}

/// What a pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Ids of the render calls issued, in element order.
    pub issued: Vec<String>,
    /// Elements skipped because they were already processed.
    pub skipped: usize,
}

/// Renders every unprocessed element, in order.
///
/// Render calls are issued without waiting for earlier ones to complete, so completions (and
/// therefore content replacement and callbacks) may happen in any order across elements. Within
/// one element the content is always replaced before its bind function runs.
///
/// The first synchronous engine failure stops the pass: elements before it keep their output,
/// the failing element stays marked, and later elements are left untouched.
pub fn process(elements: &[Element], mut ctx: PassContext<'_>) -> Result<PassSummary> {
    let mut summary = PassSummary::default();

    for element in elements {
        if is_processed(element) {
            tracing::debug!(tag = %element.tag_name(), "Skipping already processed diagram");
            summary.skipped += 1;
            continue;
        }
        element.set_attribute(PROCESSED_ATTRIBUTE, "true");

        let id = ctx.ids.next_id();
        let text = normalize_source(&element.inner_html());
        match detect_init(&text) {
            Ok(Some(init)) => {
                tracing::debug!(id = %id, init = %init.as_value(), "Detected early reinit")
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(id = %id, error = %e, "Ignoring malformed init directive"),
        }

        let request = RenderRequest {
            id: id.clone(),
            text,
            element: element.clone(),
        };
        let mut task = match ctx.engine.render(request) {
            Ok(task) => task,
            Err(source) => {
                tracing::warn!(id = %id, error = %source, "Diagram render failed; aborting pass");
                return Err(Error::render(&id, source));
            }
        };
        tracing::debug!(id = %id, "Render issued");
        summary.issued.push(id.clone());

        let binding = Binding {
            element: element.clone(),
            id,
            callback: ctx.callback.clone(),
            errors: ctx.errors.clone(),
        };
        let ready = (&mut task).now_or_never();
        match ready {
            Some(outcome) => binding.complete(outcome),
            None => ctx
                .spawner
                .spawn_local(async move { binding.complete(task.await) })?,
        }
    }

    Ok(summary)
}

/// Writes one render result back into its element.
struct Binding {
    element: Element,
    id: String,
    callback: Option<CompletionCallback>,
    errors: ErrorSlot,
}

impl Binding {
    fn complete(self, outcome: std::result::Result<Rendered, BoxError>) {
        match outcome {
            Ok(Rendered { svg, bind }) => {
                self.element.set_inner_html(&svg);
                if let Some(callback) = &self.callback {
                    callback(&self.id);
                }
                if let Some(bind) = bind {
                    bind(&self.element);
                }
            }
            Err(source) => {
                tracing::warn!(id = %self.id, error = %source, "Diagram render failed after dispatch");
                self.errors.notify(&Error::render(&self.id, source));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigStore;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use merman_dom::Document;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Completes each render when the test says so.
    #[derive(Default)]
    struct DeferredEngine {
        store: ConfigStore,
        pending: RefCell<Vec<(String, oneshot::Sender<Rendered>)>>,
    }

    impl RenderEngine for DeferredEngine {
        fn config_store(&self) -> &ConfigStore {
            &self.store
        }

        fn render(&self, request: RenderRequest) -> std::result::Result<crate::RenderTask, BoxError> {
            let (tx, rx) = oneshot::channel();
            self.pending.borrow_mut().push((request.id, tx));
            Ok(async move { rx.await.map_err(|e| BoxError::from(e.to_string())) }.boxed_local())
        }
    }

    fn blocks() -> (Document, Vec<Element>) {
        let doc =
            Document::parse_html(r#"<div class="mermaid">A-->B</div><div class="mermaid">C-->D</div>"#)
                .unwrap();
        let elements = doc.query_selector_all(".mermaid").unwrap();
        (doc, elements)
    }

    #[test]
    fn deferred_renders_complete_in_any_order() {
        let (_doc, elements) = blocks();
        let engine = DeferredEngine::default();
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let completed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&completed);

        let summary = process(
            &elements,
            PassContext {
                engine: &engine,
                spawner: &spawner,
                ids: IdGenerator::new(true, None),
                callback: Some(Rc::new(move |id: &str| sink.borrow_mut().push(id.to_string()))),
                errors: ErrorSlot::default(),
            },
        )
        .unwrap();
        assert_eq!(summary.issued, ["mermaid-0", "mermaid-1"]);
        assert!(elements.iter().all(is_processed));
        assert_eq!(elements[0].inner_html(), "A-->B");

        let mut pending = engine.pending.borrow_mut().drain(..).collect::<Vec<_>>();
        let (second_id, second) = pending.pop().unwrap();
        let (first_id, first) = pending.pop().unwrap();
        second.send(Rendered::new(format!("<svg id=\"{second_id}\"/>"))).unwrap();
        pool.run_until_stalled();
        assert_eq!(*completed.borrow(), ["mermaid-1"]);
        assert_eq!(elements[0].inner_html(), "A-->B");

        first.send(Rendered::new(format!("<svg id=\"{first_id}\"/>"))).unwrap();
        pool.run_until_stalled();
        assert_eq!(*completed.borrow(), ["mermaid-1", "mermaid-0"]);
        assert_eq!(elements[0].inner_html(), "<svg id=\"mermaid-0\"/>");
        assert_eq!(elements[1].inner_html(), "<svg id=\"mermaid-1\"/>");
    }

    #[test]
    fn bind_runs_after_deferred_content_replacement() {
        let (_doc, elements) = blocks();
        let engine = DeferredEngine::default();
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let seen = Rc::new(RefCell::new(None));

        process(
            &elements[..1],
            PassContext {
                engine: &engine,
                spawner: &spawner,
                ids: IdGenerator::new(true, None),
                callback: None,
                errors: ErrorSlot::default(),
            },
        )
        .unwrap();

        let (_, tx) = engine.pending.borrow_mut().pop().unwrap();
        let sink = Rc::clone(&seen);
        tx.send(
            Rendered::new("<svg/>")
                .with_bind(move |el| *sink.borrow_mut() = Some(el.inner_html())),
        )
        .unwrap();
        pool.run_until_stalled();
        assert_eq!(seen.borrow().as_deref(), Some("<svg/>"));
    }

    #[test]
    fn late_failure_reaches_the_error_slot_without_touching_content() {
        let (_doc, elements) = blocks();
        let engine = DeferredEngine::default();
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let errors = ErrorSlot::default();
        let reported = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reported);
        errors.set(move |err: &Error| {
            sink.borrow_mut()
                .push(err.diagram_id().map(str::to_string))
        });

        let summary = process(
            &elements,
            PassContext {
                engine: &engine,
                spawner: &spawner,
                ids: IdGenerator::new(true, None),
                callback: None,
                errors: errors.clone(),
            },
        )
        .unwrap();
        assert_eq!(summary.issued.len(), 2);

        // Dropping the sender fails the first task; the second still completes.
        let mut pending = engine.pending.borrow_mut().drain(..).collect::<Vec<_>>();
        let (_, second) = pending.pop().unwrap();
        drop(pending);
        second.send(Rendered::new("<svg/>")).unwrap();
        pool.run_until_stalled();

        assert_eq!(*reported.borrow(), [Some("mermaid-0".to_string())]);
        assert_eq!(elements[0].inner_html(), "A-->B");
        assert!(is_processed(&elements[0]));
        assert_eq!(elements[1].inner_html(), "<svg/>");
    }
}
