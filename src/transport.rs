//! Transport capability consumed by the request bridge and list handles
//!
//! A [`Transport`] issues a request and immediately hands back a [`Reply`].
//! Everything that happens afterwards (authentication challenges, completion,
//! failure) arrives as [`ReplyEvent`]s on that reply. The producing side of a
//! reply is a [`ReplyController`], which transports (and tests) drive.

use crate::error::NetworkError;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use url::Url;

/// Username/password pair supplied on an authentication challenge
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Issues network requests.
///
/// Issuing never blocks: the returned [`Reply`] is live and reports its
/// outcome through [`Reply::next_event`].
pub trait Transport: Send + Sync {
    /// Issue a GET request
    fn get(&self, url: &Url) -> Reply;

    /// Issue a POST request with a raw body
    fn post(&self, url: &Url, body: Bytes) -> Reply;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &Url) -> Reply {
        (**self).get(url)
    }

    fn post(&self, url: &Url, body: Bytes) -> Reply {
        (**self).post(url, body)
    }
}

/// Event delivered on a [`Reply`]
#[derive(Debug)]
pub enum ReplyEvent {
    /// The server asked for credentials. Answer through the sink; dropping it
    /// aborts the reply.
    AuthenticationRequired(CredentialSink),
    /// The reply completed; the body is available through [`Reply::read_all`]
    Finished,
    /// The reply failed
    Error(NetworkError),
}

impl ReplyEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, ReplyEvent::AuthenticationRequired(_))
    }
}

/// Answer channel for one authentication challenge
#[derive(Debug)]
pub struct CredentialSink {
    tx: oneshot::Sender<Option<Credentials>>,
}

impl CredentialSink {
    /// Retry the request with these credentials
    pub fn supply(self, credentials: Credentials) {
        let _ = self.tx.send(Some(credentials));
    }

    /// Give up; the reply then fails
    pub fn abort(self) {
        let _ = self.tx.send(None);
    }
}

enum Message {
    Challenge(CredentialSink),
    Finished(Bytes),
    Error(NetworkError),
}

/// Live handle to one in-flight or completed request
pub struct Reply {
    url: Url,
    rx: mpsc::UnboundedReceiver<Message>,
    body: Bytes,
    terminated: bool,
}

impl Reply {
    /// Create a connected controller/reply pair for `url`
    pub fn new(url: Url) -> (ReplyController, Reply) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = ReplyController { tx };
        let reply = Reply {
            url,
            rx,
            body: Bytes::new(),
            terminated: false,
        };
        (controller, reply)
    }

    /// URL this reply was issued for
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether a terminal event has been delivered
    pub fn is_finished(&self) -> bool {
        self.terminated
    }

    /// Wait for the next event.
    ///
    /// At most one terminal event (`Finished` or `Error`) is ever returned;
    /// afterwards this yields `None`. If the controller goes away without
    /// finishing, the reply fails with [`NetworkError::OperationCanceled`].
    pub async fn next_event(&mut self) -> Option<ReplyEvent> {
        if self.terminated {
            return None;
        }

        let event = match self.rx.recv().await {
            Some(Message::Challenge(sink)) => ReplyEvent::AuthenticationRequired(sink),
            Some(Message::Finished(body)) => {
                self.body = body;
                ReplyEvent::Finished
            }
            Some(Message::Error(code)) => ReplyEvent::Error(code),
            None => {
                debug!(url = %self.url, "Reply controller dropped without a result");
                ReplyEvent::Error(NetworkError::OperationCanceled)
            }
        };

        if event.is_terminal() {
            self.terminated = true;
            self.rx.close();
        }
        Some(event)
    }

    /// Take the buffered response body (empty unless the reply finished)
    pub fn read_all(&mut self) -> Bytes {
        std::mem::take(&mut self.body)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("url", &self.url.as_str())
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// Producing side of a [`Reply`]
#[derive(Debug, Clone)]
pub struct ReplyController {
    tx: mpsc::UnboundedSender<Message>,
}

impl ReplyController {
    /// Raise an authentication challenge and wait for the answer.
    ///
    /// Returns `None` if the reply aborted the challenge or was dropped.
    pub async fn authenticate(&self) -> Option<Credentials> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Message::Challenge(CredentialSink { tx })).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Complete the reply with a body
    pub fn finish(&self, body: impl Into<Bytes>) {
        let _ = self.tx.send(Message::Finished(body.into()));
    }

    /// Fail the reply
    pub fn fail(&self, code: NetworkError) {
        let _ = self.tx.send(Message::Error(code));
    }

    /// Whether the reply side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the reply has been dropped or has consumed its terminal event
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Challenge(_) => f.write_str("Challenge"),
            Message::Finished(body) => write!(f, "Finished({} bytes)", body.len()),
            Message::Error(code) => write!(f, "Error({:?})", code),
        }
    }
}
