//! End-to-end tests of the API facade over a scripted server

mod common;

use common::{IssuedRequest, ScriptedTransport};
use mygpo_client::{
    ApiRequest, ClientConfig, ClientError, DeviceType, ListEvent, NetworkError, ReplyController,
};
use std::sync::Arc;

/// Answers by path, the way the directory and account endpoints would
async fn gpodder(request: IssuedRequest, controller: ReplyController) {
    let body: &'static [u8] = match (request.method, request.url.path()) {
        ("GET", "/toplist/2.json") => {
            br#"[{"title":"Linux Outlaws","subscribers":1209},{"title":"TWiT","subscribers":800}]"#
        }
        ("GET", "/search.json") => br#"{"error":"search is an object here"}"#,
        ("GET", "/api/2/tags/2.json") => br#"[{"tag":"Technology","usage":530},{"tag":"News","usage":2}]"#,
        ("GET", "/api/2/devices/alice.json") => {
            br#"[{"id":"laptop","caption":"My laptop","type":"laptop","subscriptions":3}]"#
        }
        ("GET", "/subscriptions/alice/laptop.json") => {
            br#"["http://feeds.feedburner.com/linuxoutlaws","not a url","http://leo.am/podcasts/twit"]"#
        }
        ("POST", "/api/2/devices/alice/laptop.json") => b"",
        _ => {
            controller.fail(NetworkError::ContentNotFound);
            return;
        }
    };
    controller.finish(body);
}

fn api(config: ClientConfig) -> (Arc<ScriptedTransport>, ApiRequest<Arc<ScriptedTransport>>) {
    let transport = Arc::new(ScriptedTransport::new(gpodder));
    let api = ApiRequest::with_transport(config, transport.clone()).unwrap();
    (transport, api)
}

fn account() -> ClientConfig {
    ClientConfig {
        device_id: Some("laptop".into()),
        ..ClientConfig::with_account("alice", "secret")
    }
}

#[tokio::test]
async fn test_toplist() {
    let (_, api) = api(ClientConfig::default());
    let toplist = api.toplist(2).unwrap();

    assert_eq!(toplist.finished().await, ListEvent::Finished);
    let podcasts = toplist.list();
    assert_eq!(podcasts.len(), 2);
    assert_eq!(podcasts[0].title, "Linux Outlaws");
    assert_eq!(podcasts[0].subscribers, 1209);
    assert_eq!(podcasts[1].title, "TWiT");
}

#[tokio::test]
async fn test_top_tags_and_devices() {
    let (_, api) = api(account());

    let tags = api.top_tags(2).unwrap();
    let devices = api.list_devices().unwrap();

    assert_eq!(tags.finished().await, ListEvent::Finished);
    assert_eq!(devices.finished().await, ListEvent::Finished);
    assert_eq!(tags.list()[0].usage, 530);

    let device = &devices.list()[0];
    assert_eq!(device.id, "laptop");
    assert_eq!(device.device_type, DeviceType::Laptop);
}

#[tokio::test]
async fn test_search_with_object_payload_is_parse_error() {
    let (transport, api) = api(ClientConfig::default());
    let results = api.search("linux outlaws").unwrap();

    assert_eq!(results.finished().await, ListEvent::ParseError);
    assert!(results.list().is_empty());
    assert_eq!(
        transport.issued()[0].url.query(),
        Some("q=linux%20outlaws")
    );
}

#[tokio::test]
async fn test_unknown_endpoint_is_request_error() {
    let (_, api) = api(ClientConfig::default());
    let podcasts = api.podcasts_of_tag("nothing", 5).unwrap();

    assert_eq!(
        podcasts.finished().await,
        ListEvent::RequestError(NetworkError::ContentNotFound)
    );
    assert_eq!(podcasts.last_error(), NetworkError::ContentNotFound);
}

#[tokio::test]
async fn test_download_subscriptions_skips_invalid_urls() {
    let (_, api) = api(account());

    let feeds = api.download_subscriptions(None).await.unwrap();

    let feeds: Vec<&str> = feeds.iter().map(|u| u.as_str()).collect();
    assert_eq!(
        feeds,
        vec![
            "http://feeds.feedburner.com/linuxoutlaws",
            "http://leo.am/podcasts/twit"
        ]
    );
}

#[tokio::test]
async fn test_download_subscriptions_for_unknown_device() {
    let (_, api) = api(account());

    let err = api.download_subscriptions(Some("phone")).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Request(NetworkError::ContentNotFound)
    ));
}

#[tokio::test]
async fn test_update_device_posts_json() {
    let (transport, api) = api(account());

    api.update_device("laptop", "My laptop", DeviceType::Laptop)
        .await
        .unwrap();

    let issued = transport.issued();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].method, "POST");
    let body: serde_json::Value = serde_json::from_slice(issued[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"caption": "My laptop", "type": "laptop"})
    );
}

#[tokio::test]
async fn test_account_endpoints_need_username() {
    let (transport, api) = api(ClientConfig::default());

    assert!(matches!(api.favorite_episodes(), Err(ClientError::Config(_))));
    assert!(matches!(api.suggestions(5), Err(ClientError::Config(_))));
    assert!(matches!(
        api.download_subscriptions(Some("laptop")).await,
        Err(ClientError::Config(_))
    ));
    assert!(transport.issued().is_empty());
}

#[tokio::test]
async fn test_download_subscriptions_needs_device() {
    let (_, api) = api(ClientConfig::with_account("alice", "secret"));

    assert!(matches!(
        api.download_subscriptions(None).await,
        Err(ClientError::Config(_))
    ));
}
