//! Deferred parsed lists and the handles that share them
//!
//! A [`ListHandle`] is created from an issued [`Reply`]. A driver task owns the
//! reply; when it finishes, the body is parsed once into `Vec<T>` and every
//! handle is told about the outcome. Cloning a handle never re-issues or
//! re-parses: all clones share one result and the result lives as long as the
//! last handle.

use crate::error::NetworkError;
use crate::transport::{Reply, ReplyEvent};
use crate::value::{self, FromValue, Value};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Terminal notification of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    /// The list is parsed and ready to read
    Finished,
    /// The body could not be interpreted as a list
    ParseError,
    /// The request itself failed
    RequestError(NetworkError),
}

/// Current state of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Pending,
    Finished,
    ParseError,
    RequestError(NetworkError),
}

impl ListStatus {
    /// Terminal event for this status, `None` while pending
    pub fn event(self) -> Option<ListEvent> {
        match self {
            ListStatus::Pending => None,
            ListStatus::Finished => Some(ListEvent::Finished),
            ListStatus::ParseError => Some(ListEvent::ParseError),
            ListStatus::RequestError(code) => Some(ListEvent::RequestError(code)),
        }
    }
}

enum ListState<T> {
    Pending,
    Parsed { items: Arc<Vec<T>>, raw: Arc<Value> },
    ParseFailed,
    RequestFailed(NetworkError),
}

impl<T> ListState<T> {
    fn status(&self) -> ListStatus {
        match self {
            ListState::Pending => ListStatus::Pending,
            ListState::Parsed { .. } => ListStatus::Finished,
            ListState::ParseFailed => ListStatus::ParseError,
            ListState::RequestFailed(code) => ListStatus::RequestError(*code),
        }
    }
}

type Callback = Box<dyn FnOnce(ListEvent) + Send>;

/// Callbacks registered on one handle
#[derive(Default)]
struct Observers {
    fired: Option<ListEvent>,
    callbacks: Vec<Callback>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One in-flight or completed list request shared by all its handles
struct DeferredList<T> {
    state: watch::Sender<ListState<T>>,
    /// Observer sets of every handle, in handle creation order
    observers: Mutex<Vec<Weak<Mutex<Observers>>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<T: FromValue + Send + Sync + 'static> DeferredList<T> {
    fn start(reply: Reply) -> Arc<Self> {
        let (state, _) = watch::channel(ListState::Pending);
        let list = Arc::new(Self {
            state,
            observers: Mutex::new(Vec::new()),
            driver: Mutex::new(None),
        });

        let driver = tokio::spawn(drive(reply, Arc::downgrade(&list)));
        *lock(&list.driver) = Some(driver);
        list
    }
}

impl<T> DeferredList<T> {
    fn materialized(&self) -> Option<Arc<Vec<T>>> {
        match &*self.state.borrow() {
            ListState::Parsed { items, .. } => Some(items.clone()),
            _ => None,
        }
    }

    fn raw(&self) -> Option<Arc<Value>> {
        match &*self.state.borrow() {
            ListState::Parsed { raw, .. } => Some(raw.clone()),
            _ => None,
        }
    }

    fn status(&self) -> ListStatus {
        self.state.borrow().status()
    }

    fn register(&self, observers: &Arc<Mutex<Observers>>) {
        let mut all = lock(&self.observers);
        all.retain(|o| o.strong_count() > 0);
        all.push(Arc::downgrade(observers));
    }

    /// Move from `Pending` to `next` and notify everyone; later calls are ignored
    fn complete(&self, next: ListState<T>) {
        let mut next = Some(next);
        let changed = self.state.send_if_modified(|state| {
            if matches!(state, ListState::Pending) {
                if let Some(next) = next.take() {
                    *state = next;
                }
                true
            } else {
                false
            }
        });
        if !changed {
            warn!("List already completed, ignoring second result");
            return;
        }

        let Some(event) = self.status().event() else {
            return;
        };
        let observers: Vec<_> = lock(&self.observers)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for set in observers {
            let callbacks = {
                let mut set = lock(&set);
                set.fired = Some(event);
                std::mem::take(&mut set.callbacks)
            };
            for callback in callbacks {
                callback(event);
            }
        }
    }
}

impl<T: FromValue> DeferredList<T> {
    fn parse_data(&self, body: &[u8]) {
        debug!(bytes = body.len(), "Parsing list data");
        match value::parse(body) {
            Ok(Value::Array(elements)) => {
                let items: Vec<T> = elements.iter().map(T::from_value).collect();
                debug!(count = items.len(), "List parsed");
                self.complete(ListState::Parsed {
                    items: Arc::new(items),
                    raw: Arc::new(Value::Array(elements)),
                });
            }
            Ok(other) => {
                warn!(kind = value_kind(&other), "List payload is not an array");
                self.complete(ListState::ParseFailed);
            }
            Err(e) => {
                warn!(error = %e, "List payload is not valid JSON");
                self.complete(ListState::ParseFailed);
            }
        }
    }
}

impl<T> Drop for DeferredList<T> {
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.driver).take() {
            if !driver.is_finished() {
                debug!("Last list handle dropped, abandoning reply");
                driver.abort();
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

async fn drive<T: FromValue>(mut reply: Reply, list: Weak<DeferredList<T>>) {
    while let Some(event) = reply.next_event().await {
        match event {
            ReplyEvent::AuthenticationRequired(sink) => {
                warn!(url = %reply.url(), "List request challenged for credentials, aborting");
                sink.abort();
            }
            ReplyEvent::Finished => {
                let body = reply.read_all();
                if let Some(list) = list.upgrade() {
                    list.parse_data(&body);
                }
                return;
            }
            ReplyEvent::Error(code) => {
                warn!(url = %reply.url(), code = code.code(), error = %code, "List request failed");
                if let Some(list) = list.upgrade() {
                    list.complete(ListState::RequestFailed(code));
                }
                return;
            }
        }
    }
}

/// Caller-facing handle to a list of `T` being fetched.
///
/// # Example
///
/// ```rust,no_run
/// use mygpo_client::{ApiRequest, ClientConfig, ListEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = ApiRequest::new(ClientConfig::default())?;
/// let podcasts = api.search("linux")?;
///
/// // A clone shares the request and gets its own notifications
/// let view = podcasts.clone();
/// view.on_event(|event| println!("search done: {:?}", event));
///
/// match podcasts.finished().await {
///     ListEvent::Finished => println!("{} results", podcasts.list().len()),
///     ListEvent::ParseError => println!("unexpected payload"),
///     ListEvent::RequestError(code) => println!("request failed: {}", code),
/// }
/// # Ok(())
/// # }
/// ```
pub struct ListHandle<T> {
    shared: Arc<DeferredList<T>>,
    observers: Arc<Mutex<Observers>>,
    status: watch::Receiver<ListState<T>>,
}

impl<T: FromValue + Send + Sync + 'static> ListHandle<T> {
    /// Take ownership of an issued reply and start materializing it.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(reply: Reply) -> Self {
        Self::attach(DeferredList::start(reply))
    }
}

impl<T> ListHandle<T> {
    fn attach(shared: Arc<DeferredList<T>>) -> Self {
        let observers = Arc::new(Mutex::new(Observers::default()));
        shared.register(&observers);
        {
            // Handles attached after completion never see `complete` run
            let mut set = lock(&observers);
            if set.fired.is_none() {
                set.fired = shared.status().event();
            }
        }
        let status = shared.state.subscribe();
        Self {
            shared,
            observers,
            status,
        }
    }

    /// Parsed items; empty until the list finished
    pub fn list(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.shared
            .materialized()
            .map(|items| items.as_ref().clone())
            .unwrap_or_default()
    }

    /// Shared parsed items, `None` until the list finished
    pub fn items(&self) -> Option<Arc<Vec<T>>> {
        self.shared.materialized()
    }

    /// The parsed payload, `None` until the list finished
    pub fn raw(&self) -> Option<Arc<Value>> {
        self.shared.raw()
    }

    pub fn status(&self) -> ListStatus {
        self.shared.status()
    }

    /// Error code of the request, `NoError` unless it failed
    pub fn last_error(&self) -> NetworkError {
        match self.status() {
            ListStatus::RequestError(code) => code,
            _ => NetworkError::NoError,
        }
    }

    /// Register a callback for this handle's terminal event.
    ///
    /// Fires exactly once. If the list already completed, fires immediately.
    pub fn on_event<F>(&self, callback: F)
    where
        F: FnOnce(ListEvent) + Send + 'static,
    {
        let mut observers = lock(&self.observers);
        match observers.fired {
            Some(event) => {
                drop(observers);
                callback(event);
            }
            None => observers.callbacks.push(Box::new(callback)),
        }
    }

    /// Wait for the terminal event
    pub async fn finished(&self) -> ListEvent {
        let mut status = self.status.clone();
        wait_terminal(&mut status).await
    }

    /// Independent subscription to this handle's terminal event.
    ///
    /// The subscription keeps the request alive like a handle does.
    pub fn subscribe(&self) -> ListSubscription<T> {
        ListSubscription {
            _shared: self.shared.clone(),
            status: Some(self.status.clone()),
        }
    }
}

impl<T> Clone for ListHandle<T> {
    fn clone(&self) -> Self {
        Self::attach(self.shared.clone())
    }
}

impl<T> std::fmt::Debug for ListHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListHandle")
            .field("status", &self.status())
            .finish()
    }
}

async fn wait_terminal<T>(status: &mut watch::Receiver<ListState<T>>) -> ListEvent {
    match status.wait_for(|state| !matches!(state, ListState::Pending)).await {
        Ok(state) => state.status().event().unwrap_or(ListEvent::ParseError),
        // Callers hold the shared list alongside the receiver, so the sender is alive
        Err(_) => ListEvent::RequestError(NetworkError::OperationCanceled),
    }
}

/// Receives a list's terminal event once
pub struct ListSubscription<T> {
    _shared: Arc<DeferredList<T>>,
    status: Option<watch::Receiver<ListState<T>>>,
}

impl<T> ListSubscription<T> {
    /// Wait for the terminal event; `None` once it has been received
    pub async fn recv(&mut self) -> Option<ListEvent> {
        let mut status = self.status.take()?;
        Some(wait_terminal(&mut status).await)
    }
}
