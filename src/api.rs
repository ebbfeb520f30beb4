//! gpodder.net API endpoints
//!
//! List endpoints hand back a [`ListHandle`] immediately; the request runs in
//! the background. Account endpoints that need an answer before continuing go
//! through the [`RequestHandler`] and are awaited.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::http_transport::HttpTransport;
use crate::list::ListHandle;
use crate::request_handler::RequestHandler;
use crate::transport::Transport;
use crate::types::{DeviceList, DeviceType, EpisodeList, PodcastList, TagList};
use crate::value::FromValue;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Builds endpoint URLs below a server root
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(server: &Url) -> Self {
        Self {
            base: server.as_str().trim_end_matches('/').to_string(),
        }
    }

    fn build(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base, path))?)
    }

    /// Most subscribed podcasts
    pub fn toplist(&self, count: u32) -> Result<Url> {
        self.build(&format!("/toplist/{}.json", count))
    }

    /// Podcast search
    pub fn search(&self, query: &str) -> Result<Url> {
        self.build(&format!("/search.json?q={}", urlencoding::encode(query)))
    }

    /// Suggestions for the authenticated account
    pub fn suggestions(&self, count: u32) -> Result<Url> {
        self.build(&format!("/suggestions/{}.json", count))
    }

    /// Podcasts carrying a tag
    pub fn podcasts_of_tag(&self, tag: &str, count: u32) -> Result<Url> {
        self.build(&format!(
            "/api/2/tag/{}/{}.json",
            urlencoding::encode(tag),
            count
        ))
    }

    /// Most used tags
    pub fn top_tags(&self, count: u32) -> Result<Url> {
        self.build(&format!("/api/2/tags/{}.json", count))
    }

    /// Episodes marked as favorite by `username`
    pub fn favorite_episodes(&self, username: &str) -> Result<Url> {
        self.build(&format!(
            "/api/2/favorites/{}.json",
            urlencoding::encode(username)
        ))
    }

    /// Devices registered by `username`
    pub fn devices(&self, username: &str) -> Result<Url> {
        self.build(&format!(
            "/api/2/devices/{}.json",
            urlencoding::encode(username)
        ))
    }

    /// One device of `username`
    pub fn device(&self, username: &str, device_id: &str) -> Result<Url> {
        self.build(&format!(
            "/api/2/devices/{}/{}.json",
            urlencoding::encode(username),
            urlencoding::encode(device_id)
        ))
    }

    /// Subscription list of one device
    pub fn subscriptions(&self, username: &str, device_id: &str) -> Result<Url> {
        self.build(&format!(
            "/subscriptions/{}/{}.json",
            urlencoding::encode(username),
            urlencoding::encode(device_id)
        ))
    }
}

/// Entry point for the gpodder.net API
///
/// # Example
///
/// ```rust,no_run
/// use mygpo_client::{ApiRequest, ClientConfig, DeviceType};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = ApiRequest::new(ClientConfig {
///     device_id: Some("laptop".into()),
///     ..ClientConfig::with_account("alice", "secret")
/// })?;
///
/// api.update_device("laptop", "My laptop", DeviceType::Laptop).await?;
/// let feeds = api.download_subscriptions(None).await?;
/// println!("{} subscriptions", feeds.len());
/// # Ok(())
/// # }
/// ```
pub struct ApiRequest<T = HttpTransport> {
    config: ClientConfig,
    urls: UrlBuilder,
    /// Issues list requests
    lists: Arc<T>,
    /// Serializes awaited requests
    handler: Mutex<RequestHandler<Arc<T>>>,
}

impl ApiRequest<HttpTransport> {
    /// Client for the server and account in `config`.
    ///
    /// List requests send the account credentials up front; awaited requests
    /// send them when the server asks.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let lists = HttpTransport::new(&config)?.with_credentials(config.credentials());
        let bridge = HttpTransport::new(&config)?;
        Self::from_transports(config, Arc::new(lists), Arc::new(bridge))
    }
}

impl<T: Transport + 'static> ApiRequest<T> {
    /// Client issuing every request through `transport`
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let transport = Arc::new(transport);
        Self::from_transports(config, transport.clone(), transport)
    }

    /// Client with separate transports for list and awaited requests
    pub fn from_transports(config: ClientConfig, lists: Arc<T>, bridge: Arc<T>) -> Result<Self> {
        let urls = UrlBuilder::new(&config.server()?);
        let handler = match config.credentials() {
            Some(credentials) => RequestHandler::new(bridge, credentials),
            None => RequestHandler::anonymous(bridge),
        };

        Ok(Self {
            config,
            urls,
            lists,
            handler: Mutex::new(handler),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    // ==================== Directory ====================

    /// Most subscribed podcasts
    pub fn toplist(&self, count: u32) -> Result<PodcastList> {
        self.fetch_list(self.urls.toplist(count)?)
    }

    /// Search podcasts by title, description and URL
    pub fn search(&self, query: &str) -> Result<PodcastList> {
        self.fetch_list(self.urls.search(query)?)
    }

    /// Podcasts carrying `tag`
    pub fn podcasts_of_tag(&self, tag: &str, count: u32) -> Result<PodcastList> {
        self.fetch_list(self.urls.podcasts_of_tag(tag, count)?)
    }

    /// Most used tags
    pub fn top_tags(&self, count: u32) -> Result<TagList> {
        self.fetch_list(self.urls.top_tags(count)?)
    }

    // ==================== Account ====================

    /// Suggested podcasts for the account
    pub fn suggestions(&self, count: u32) -> Result<PodcastList> {
        self.username()?;
        self.fetch_list(self.urls.suggestions(count)?)
    }

    /// Favorite episodes of the account
    pub fn favorite_episodes(&self) -> Result<EpisodeList> {
        self.fetch_list(self.urls.favorite_episodes(self.username()?)?)
    }

    /// Devices registered with the account
    pub fn list_devices(&self) -> Result<DeviceList> {
        self.fetch_list(self.urls.devices(self.username()?)?)
    }

    /// Feed URLs subscribed on a device (`device_id`, or the configured one)
    pub async fn download_subscriptions(&self, device_id: Option<&str>) -> Result<Vec<Url>> {
        let device_id = self.device_id(device_id)?;
        let url = self.urls.subscriptions(self.username()?, device_id)?;

        let body = self.handler.lock().await.get_request(&url).await.into_result()?;
        let entries: Vec<String> = serde_json::from_slice(&body)?;

        let mut feeds = Vec::with_capacity(entries.len());
        for entry in entries {
            match Url::parse(&entry) {
                Ok(feed) => feeds.push(feed),
                Err(e) => warn!(entry = %entry, error = %e, "Skipping invalid subscription URL"),
            }
        }
        debug!(device_id, count = feeds.len(), "Downloaded subscriptions");
        Ok(feeds)
    }

    /// Set caption and type of a device, creating it if needed
    pub async fn update_device(
        &self,
        device_id: &str,
        caption: &str,
        device_type: DeviceType,
    ) -> Result<()> {
        let url = self.urls.device(self.username()?, device_id)?;
        let body = serde_json::to_vec(&serde_json::json!({
            "caption": caption,
            "type": device_type.as_str(),
        }))?;

        self.handler
            .lock()
            .await
            .post_request(&url, Bytes::from(body))
            .await
            .into_result()?;
        Ok(())
    }

    // ==================== Helper Methods ====================

    fn fetch_list<E: FromValue + Send + Sync + 'static>(&self, url: Url) -> Result<ListHandle<E>> {
        debug!(url = %url, "Fetching list");
        Ok(ListHandle::new(self.lists.get(&url)))
    }

    fn username(&self) -> Result<&str> {
        self.config
            .username
            .as_deref()
            .ok_or_else(|| ClientError::Config("username required for this endpoint".into()))
    }

    fn device_id<'a>(&'a self, device_id: Option<&'a str>) -> Result<&'a str> {
        device_id
            .or(self.config.device_id.as_deref())
            .ok_or_else(|| ClientError::Config("device_id required for this endpoint".into()))
    }
}
