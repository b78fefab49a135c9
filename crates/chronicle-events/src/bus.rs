//! Synchronous three-tier pub/sub fan-out.
//!
//! Every emitted event dispatches, in order, to: exact-subtype handlers,
//! then category handlers, then catch-all handlers -- each tier in its
//! own registration order. Dispatch takes `&self`: handler storage is
//! `RefCell`-guarded so a handler may itself call `emit` (re-entrant,
//! depth-first) without needing `&mut` access to a bus already on the
//! call stack. Per §9, unsubscribe uses opaque tokens rather than
//! closure identity.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::error;

use crate::category::EventCategory;
use crate::event::Event;

/// Opaque handle returned by `on`/`on_subtype`/`on_any`, passed to `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(u64);

type Handler = dyn FnMut(&Event) + Send;

/// Reported when a handler panics during dispatch. Emission itself never
/// fails -- this is surfaced via `tracing::error!` and, if installed, a
/// caller-supplied hook, never propagated to the emitter.
#[derive(Debug, Clone)]
pub struct HandlerFailed {
    pub subtype: String,
    pub index: usize,
    pub cause: String,
}

struct Entry {
    token: HandlerToken,
    handler: Rc<RefCell<Handler>>,
}

/// The event bus. Not `Sync` (single-threaded kernel), but handlers
/// themselves are required to be `Send` so subsystem closures can be
/// constructed independent of the bus's own thread affinity.
#[derive(Default)]
pub struct EventBus {
    subtype_handlers: RefCell<HashMap<String, Vec<Entry>>>,
    category_handlers: RefCell<HashMap<EventCategory, Vec<Entry>>>,
    any_handlers: RefCell<Vec<Entry>>,
    next_token: Cell<u64>,
    #[allow(clippy::type_complexity)]
    error_hook: RefCell<Option<Box<dyn FnMut(HandlerFailed) + Send>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_token(&self) -> HandlerToken {
        let t = self.next_token.get();
        self.next_token.set(t + 1);
        HandlerToken(t)
    }

    /// Install a hook invoked whenever a handler panics. Replaces any
    /// previously installed hook.
    pub fn set_error_hook(&self, hook: impl FnMut(HandlerFailed) + Send + 'static) {
        *self.error_hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Subscribe to every event in `category`.
    pub fn on(&self, category: EventCategory, handler: impl FnMut(&Event) + Send + 'static) -> HandlerToken {
        let token = self.mint_token();
        self.category_handlers.borrow_mut().entry(category).or_default().push(Entry {
            token,
            handler: Rc::new(RefCell::new(handler)),
        });
        token
    }

    /// Subscribe to events whose `subtype` exactly matches `subtype`.
    pub fn on_subtype(&self, subtype: impl Into<String>, handler: impl FnMut(&Event) + Send + 'static) -> HandlerToken {
        let token = self.mint_token();
        self.subtype_handlers.borrow_mut().entry(subtype.into()).or_default().push(Entry {
            token,
            handler: Rc::new(RefCell::new(handler)),
        });
        token
    }

    /// Subscribe to every event, regardless of subtype/category.
    pub fn on_any(&self, handler: impl FnMut(&Event) + Send + 'static) -> HandlerToken {
        let token = self.mint_token();
        self.any_handlers.borrow_mut().push(Entry {
            token,
            handler: Rc::new(RefCell::new(handler)),
        });
        token
    }

    /// Remove a previously registered handler. Idempotent: removing a
    /// token twice (or one that never existed) is not an error.
    pub fn off(&self, token: HandlerToken) -> bool {
        let mut removed = false;
        for v in self.subtype_handlers.borrow_mut().values_mut() {
            let before = v.len();
            v.retain(|e| e.token != token);
            removed |= v.len() != before;
        }
        for v in self.category_handlers.borrow_mut().values_mut() {
            let before = v.len();
            v.retain(|e| e.token != token);
            removed |= v.len() != before;
        }
        let before = self.any_handlers.borrow().len();
        self.any_handlers.borrow_mut().retain(|e| e.token != token);
        removed |= self.any_handlers.borrow().len() != before;
        removed
    }

    /// Remove every handler across all three tiers.
    pub fn clear(&self) {
        self.subtype_handlers.borrow_mut().clear();
        self.category_handlers.borrow_mut().clear();
        self.any_handlers.borrow_mut().clear();
    }

    /// Fan out `event` to subtype handlers, then category handlers, then
    /// catch-all handlers, each tier in registration order. A panicking
    /// handler is caught and reported; it never stops downstream
    /// handlers from running, and `emit` itself never fails.
    pub fn emit(&self, event: &Event) {
        let mut fired: Vec<Rc<RefCell<Handler>>> = Vec::new();
        if let Some(handlers) = self.subtype_handlers.borrow().get(&event.subtype) {
            fired.extend(handlers.iter().map(|e| Rc::clone(&e.handler)));
        }
        if let Some(handlers) = self.category_handlers.borrow().get(&event.category) {
            fired.extend(handlers.iter().map(|e| Rc::clone(&e.handler)));
        }
        fired.extend(self.any_handlers.borrow().iter().map(|e| Rc::clone(&e.handler)));

        for (index, handler) in fired.iter().enumerate() {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (handler.borrow_mut())(event);
            }));
            if let Err(payload) = outcome {
                let cause = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked with a non-string payload".to_owned());
                let failure = HandlerFailed { subtype: event.subtype.clone(), index, cause };
                error!(subtype = %failure.subtype, index = failure.index, cause = %failure.cause, "event handler failed");
                if let Some(hook) = self.error_hook.borrow_mut().as_mut() {
                    hook(failure);
                }
            }
        }
    }

    pub fn subtype_handler_count(&self, subtype: &str) -> usize {
        self.subtype_handlers.borrow().get(subtype).map(Vec::len).unwrap_or(0)
    }

    pub fn category_handler_count(&self, category: EventCategory) -> usize {
        self.category_handlers.borrow().get(&category).map(Vec::len).unwrap_or(0)
    }

    pub fn any_handler_count(&self) -> usize {
        self.any_handlers.borrow().len()
    }
}
