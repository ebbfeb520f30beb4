//! Request bridge: one awaited GET/POST with a uniform error code
//!
//! The transport reports everything asynchronously on a [`Reply`]. The
//! handler parks the calling task on that reply until it finishes or fails,
//! answers the first authentication challenge with the configured
//! credentials and aborts a second one, then hands back a [`Response`].

use crate::error::NetworkError;
use crate::http_transport::HttpTransport;
use crate::transport::{CredentialSink, Credentials, Reply, ReplyEvent, Transport};
use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one bridged request.
///
/// `body` is empty whenever `error` is not [`NetworkError::NoError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub error: NetworkError,
    pub body: Bytes,
}

impl Response {
    fn failed(error: NetworkError) -> Self {
        Self {
            error,
            body: Bytes::new(),
        }
    }

    /// Whether the request succeeded
    pub fn is_ok(&self) -> bool {
        !self.error.is_error()
    }

    /// Convert into a `Result`, dropping the body on failure
    pub fn into_result(self) -> Result<Bytes, NetworkError> {
        if self.error.is_error() {
            Err(self.error)
        } else {
            Ok(self.body)
        }
    }
}

/// Awaits single requests over a [`Transport`].
///
/// Only one request can be in flight per handler; `&mut self` on the request
/// methods enforces it. Share the transport (`Arc<T>`) to run requests in
/// parallel through several handlers.
pub struct RequestHandler<T = HttpTransport> {
    transport: T,
    credentials: Option<Credentials>,
    last_error: NetworkError,
    /// Set once credentials were supplied for the current request
    login_failed: bool,
    /// Set when the handler aborted the current reply on a challenge
    auth_aborted: bool,
}

impl<T: Transport> RequestHandler<T> {
    /// Handler that answers the first authentication challenge with `credentials`
    pub fn new(transport: T, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials: Some(credentials),
            last_error: NetworkError::NoError,
            login_failed: false,
            auth_aborted: false,
        }
    }

    /// Handler without credentials; every challenge aborts the request
    pub fn anonymous(transport: T) -> Self {
        Self {
            transport,
            credentials: None,
            last_error: NetworkError::NoError,
            login_failed: false,
            auth_aborted: false,
        }
    }

    /// Transport used to issue requests
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Error code of the most recent request
    pub fn last_error(&self) -> NetworkError {
        self.last_error
    }

    /// Issue a GET and wait for its outcome
    pub async fn get_request(&mut self, url: &Url) -> Response {
        self.reset();
        debug!(url = %url, "GET request");
        let reply = self.transport.get(url);
        self.wait_for_reply(reply).await
    }

    /// Issue a POST with `data` as body and wait for its outcome
    pub async fn post_request(&mut self, url: &Url, data: Bytes) -> Response {
        self.reset();
        debug!(url = %url, bytes = data.len(), "POST request");
        let reply = self.transport.post(url, data);
        self.wait_for_reply(reply).await
    }

    fn reset(&mut self) {
        self.login_failed = false;
        self.auth_aborted = false;
        self.last_error = NetworkError::NoError;
    }

    async fn wait_for_reply(&mut self, mut reply: Reply) -> Response {
        while let Some(event) = reply.next_event().await {
            match event {
                ReplyEvent::AuthenticationRequired(sink) => self.authenticate(reply.url(), sink),
                ReplyEvent::Finished => {
                    let body = reply.read_all();
                    debug!(url = %reply.url(), bytes = body.len(), "Request finished");
                    return Response {
                        error: NetworkError::NoError,
                        body,
                    };
                }
                ReplyEvent::Error(code) => return self.handle_error(reply.url(), code),
            }
        }

        // next_event always yields a terminal event before `None`
        self.handle_error(reply.url(), NetworkError::OperationCanceled)
    }

    fn handle_error(&mut self, url: &Url, code: NetworkError) -> Response {
        let code = if self.auth_aborted {
            NetworkError::AuthenticationRequired
        } else {
            code
        };
        warn!(url = %url, code = code.code(), error = %code, "Request failed");
        self.last_error = code;
        Response::failed(code)
    }

    fn authenticate(&mut self, url: &Url, sink: CredentialSink) {
        match (&self.credentials, self.login_failed) {
            (Some(credentials), false) => {
                info!(url = %url, username = %credentials.username, "Supplying credentials");
                self.login_failed = true;
                sink.supply(credentials.clone());
            }
            (Some(_), true) => {
                warn!(url = %url, "Credentials rejected, aborting request");
                self.auth_aborted = true;
                sink.abort();
            }
            (None, _) => {
                warn!(url = %url, "Authentication required but no credentials configured");
                self.auth_aborted = true;
                sink.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ReplyController;
    use std::sync::Mutex;

    /// Transport that hands each controller to the test instead of the network
    #[derive(Default)]
    struct ManualTransport {
        issued: Mutex<Vec<(String, Option<Bytes>, ReplyController)>>,
    }

    impl ManualTransport {
        fn issue(&self, url: &Url, body: Option<Bytes>) -> Reply {
            let (controller, reply) = Reply::new(url.clone());
            self.issued
                .lock()
                .unwrap()
                .push((url.to_string(), body, controller));
            reply
        }
    }

    impl Transport for ManualTransport {
        fn get(&self, url: &Url) -> Reply {
            self.issue(url, None)
        }

        fn post(&self, url: &Url, body: Bytes) -> Reply {
            self.issue(url, Some(body))
        }
    }

    fn url() -> Url {
        Url::parse("https://gpodder.net/api/2/devices/alice.json").unwrap()
    }

    #[tokio::test]
    async fn test_post_passes_body_and_returns_response() {
        let transport = std::sync::Arc::new(ManualTransport::default());
        let mut handler = RequestHandler::anonymous(transport.clone());

        let server = async {
            tokio::task::yield_now().await;
            let (issued_url, body, controller) = transport.issued.lock().unwrap().pop().unwrap();
            assert_eq!(issued_url, url().to_string());
            assert_eq!(body, Some(Bytes::from_static(b"{\"caption\":\"x\"}")));
            controller.finish(&b"{}"[..]);
        };

        let target = url();
        let (response, ()) = tokio::join!(
            handler.post_request(&target, Bytes::from_static(b"{\"caption\":\"x\"}")),
            server
        );

        assert!(response.is_ok());
        assert_eq!(response.body, Bytes::from_static(b"{}"));
        assert_eq!(handler.last_error(), NetworkError::NoError);
    }

    #[tokio::test]
    async fn test_error_returns_empty_body() {
        let (controller, reply) = Reply::new(url());
        controller.fail(NetworkError::ContentNotFound);

        let mut handler = RequestHandler::anonymous(ManualTransport::default());
        let response = handler.wait_for_reply(reply).await;

        assert_eq!(response.error, NetworkError::ContentNotFound);
        assert!(response.body.is_empty());
        assert_eq!(handler.last_error(), NetworkError::ContentNotFound);
        assert_eq!(response.into_result(), Err(NetworkError::ContentNotFound));
    }

    #[tokio::test]
    async fn test_anonymous_handler_aborts_challenge() {
        let (controller, reply) = Reply::new(url());
        let server = tokio::spawn(async move {
            let answer = controller.authenticate().await;
            controller.fail(NetworkError::OperationCanceled);
            answer
        });

        let mut handler = RequestHandler::anonymous(ManualTransport::default());
        let response = handler.wait_for_reply(reply).await;

        assert_eq!(server.await.unwrap(), None);
        assert_eq!(response.error, NetworkError::AuthenticationRequired);
    }
}
