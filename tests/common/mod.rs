//! Scripted in-process transport shared by the integration tests

#![allow(dead_code)]

use bytes::Bytes;
use mygpo_client::{NetworkError, Reply, ReplyController, Transport};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use url::Url;

/// A request as seen by the scripted server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRequest {
    pub method: &'static str,
    pub url: Url,
    pub body: Option<Bytes>,
}

type Script =
    Arc<dyn Fn(IssuedRequest, ReplyController) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Transport whose replies are produced by a script running on a tokio task
pub struct ScriptedTransport {
    script: Script,
    issued: Mutex<Vec<IssuedRequest>>,
}

impl ScriptedTransport {
    pub fn new<F, Fut>(script: F) -> Self
    where
        F: Fn(IssuedRequest, ReplyController) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            script: Arc::new(move |request, controller| Box::pin(script(request, controller))),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Every request finishes with `body`
    pub fn respond(body: &'static str) -> Self {
        Self::new(move |_, controller| async move {
            controller.finish(body.as_bytes());
        })
    }

    /// Every request fails with `code`
    pub fn fail(code: NetworkError) -> Self {
        Self::new(move |_, controller| async move {
            controller.fail(code);
        })
    }

    /// Requests issued so far, oldest first
    pub fn issued(&self) -> Vec<IssuedRequest> {
        self.issued.lock().unwrap().clone()
    }

    fn issue(&self, method: &'static str, url: &Url, body: Option<Bytes>) -> Reply {
        let request = IssuedRequest {
            method,
            url: url.clone(),
            body,
        };
        self.issued.lock().unwrap().push(request.clone());

        let (controller, reply) = Reply::new(url.clone());
        tokio::spawn((self.script)(request, controller));
        reply
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &Url) -> Reply {
        self.issue("GET", url, None)
    }

    fn post(&self, url: &Url, body: Bytes) -> Reply {
        self.issue("POST", url, Some(body))
    }
}

pub fn url(path: &str) -> Url {
    Url::parse("https://gpodder.net/").unwrap().join(path).unwrap()
}
