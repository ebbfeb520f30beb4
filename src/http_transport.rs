//! `reqwest`-backed transport

use crate::config::ClientConfig;
use crate::error::{NetworkError, Result};
use crate::transport::{Credentials, Reply, ReplyController, Transport};
use bytes::Bytes;
use reqwest::{header, Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP transport for the gpodder.net API.
///
/// Every issued request runs on its own tokio task, so `get`/`post` must be
/// called from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    /// Sent up front as basic auth on every request
    credentials: Option<Credentials>,
}

impl HttpTransport {
    /// Build a transport from the timeout and user agent in `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            credentials: None,
        })
    }

    /// Wrap an existing `reqwest` client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            credentials: None,
        }
    }

    /// Send `credentials` preemptively with every request
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn dispatch(&self, method: Method, url: &Url, body: Option<Bytes>) -> Reply {
        let (controller, reply) = Reply::new(url.clone());
        let exchange = Exchange {
            client: self.client.clone(),
            method,
            url: url.clone(),
            body,
            credentials: self.credentials.clone(),
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = controller.closed() => {
                    debug!(url = %exchange.url, "Reply dropped, abandoning request");
                }
                _ = exchange.run(&controller) => {}
            }
        });

        reply
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Reply {
        self.dispatch(Method::GET, url, None)
    }

    fn post(&self, url: &Url, body: Bytes) -> Reply {
        self.dispatch(Method::POST, url, Some(body))
    }
}

/// One request/response exchange, repeated when a challenge is answered
struct Exchange {
    client: Client,
    method: Method,
    url: Url,
    body: Option<Bytes>,
    credentials: Option<Credentials>,
}

impl Exchange {
    async fn run(&self, controller: &ReplyController) {
        let mut credentials = self.credentials.clone();

        loop {
            let mut request = self.client.request(self.method.clone(), self.url.clone());
            if let Some(ref body) = self.body {
                request = request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }
            if let Some(ref c) = credentials {
                request = request.basic_auth(&c.username, Some(&c.password));
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let code = NetworkError::from_reqwest(&e);
                    warn!(url = %self.url, error = %e, "HTTP request failed");
                    controller.fail(code);
                    return;
                }
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                debug!(url = %self.url, "Server requested authentication");
                match controller.authenticate().await {
                    Some(supplied) => {
                        credentials = Some(supplied);
                        continue;
                    }
                    None => {
                        controller.fail(NetworkError::AuthenticationRequired);
                        return;
                    }
                }
            }

            if let Some(code) = NetworkError::from_status(status) {
                debug!(url = %self.url, status = status.as_u16(), "HTTP error status");
                controller.fail(code);
                return;
            }

            match response.bytes().await {
                Ok(body) => controller.finish(body),
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Failed to read response body");
                    controller.fail(NetworkError::from_reqwest(&e));
                }
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{ListEvent, ListHandle};
    use crate::request_handler::RequestHandler;
    use crate::value::Value;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // "alice:secret"
    const ALICE_BASIC_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";

    fn transport() -> HttpTransport {
        HttpTransport::new(&ClientConfig::default()).unwrap()
    }

    fn endpoint(server: &MockServer, path: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), path)).unwrap()
    }

    #[test]
    fn test_build_from_config() {
        let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
        assert!(transport.credentials.is_none());

        let transport = transport.with_credentials(Some(Credentials::new("alice", "secret")));
        assert_eq!(transport.credentials.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_reply() {
        let transport = HttpTransport::new(&ClientConfig {
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        // Port 9 on localhost (discard) is not expected to accept HTTP
        let url = Url::parse("http://127.0.0.1:9/toplist/10.json").unwrap();
        let mut reply = transport.get(&url);

        match reply.next_event().await {
            Some(crate::transport::ReplyEvent::Error(code)) => assert!(code.is_error()),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_challenge_retried_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/alice/laptop.json"))
            .and(header("authorization", ALICE_BASIC_AUTH))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/alice/laptop.json"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let mut handler = RequestHandler::new(transport(), Credentials::new("alice", "secret"));
        let response = handler
            .get_request(&endpoint(&server, "/subscriptions/alice/laptop.json"))
            .await;

        assert_eq!(response.error, NetworkError::NoError);
        assert_eq!(response.body, Bytes::from_static(b"[]"));
    }

    #[tokio::test]
    async fn test_rejected_credentials_sent_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2/devices/alice.json"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let mut handler = RequestHandler::new(transport(), Credentials::new("alice", "wrong"));
        let response = handler
            .get_request(&endpoint(&server, "/api/2/devices/alice.json"))
            .await;

        assert_eq!(response.error, NetworkError::AuthenticationRequired);
        assert!(response.body.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2/devices/alice/phone.json"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut handler = RequestHandler::anonymous(transport());
        let response = handler
            .post_request(
                &endpoint(&server, "/api/2/devices/alice/phone.json"),
                Bytes::from_static(b"{\"caption\":\"Phone\"}"),
            )
            .await;

        assert_eq!(response.error, NetworkError::ContentNotFound);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_list_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2/favorites/alice.json"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let reply = transport().get(&endpoint(&server, "/api/2/favorites/alice.json"));
        let list = ListHandle::<Value>::new(reply);

        assert_eq!(
            list.finished().await,
            ListEvent::RequestError(NetworkError::AuthenticationRequired)
        );
        assert!(list.list().is_empty());
    }

    #[tokio::test]
    async fn test_preemptive_credentials_on_list_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2/favorites/alice.json"))
            .and(header("authorization", ALICE_BASIC_AUTH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"title":"A"}]"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport().with_credentials(Some(Credentials::new("alice", "secret")));
        let list = ListHandle::<Value>::new(
            transport.get(&endpoint(&server, "/api/2/favorites/alice.json")),
        );

        assert_eq!(list.finished().await, ListEvent::Finished);
        assert_eq!(list.list().len(), 1);
    }
}
