//! Rust client for the gpodder.net podcast directory API
//!
//! Two building blocks sit under the per-endpoint glue in [`api`]:
//!
//! - [`RequestHandler`] awaits a single GET/POST through a [`Transport`] and
//!   returns a uniform [`NetworkError`] code plus the body, answering the first
//!   authentication challenge with the configured credentials.
//! - [`ListHandle`] wraps an issued [`Reply`], parses its JSON body into a typed
//!   list exactly once and notifies every clone of the handle.
//!
//! # Example
//!
//! ```rust,no_run
//! use mygpo_client::{ApiRequest, ClientConfig, ListEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiRequest::new(ClientConfig::default())?;
//!
//! let toplist = api.toplist(10)?;
//! if toplist.finished().await == ListEvent::Finished {
//!     for podcast in toplist.list() {
//!         println!("{} ({} subscribers)", podcast.title, podcast.subscribers);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod http_transport;
pub mod list;
pub mod request_handler;
pub mod transport;
pub mod types;
pub mod value;

// Re-export main types
pub use api::{ApiRequest, UrlBuilder};
pub use config::ClientConfig;
pub use error::{ClientError, NetworkError, Result};
pub use http_transport::HttpTransport;
pub use list::{ListEvent, ListHandle, ListStatus, ListSubscription};
pub use request_handler::{RequestHandler, Response};
pub use transport::{CredentialSink, Credentials, Reply, ReplyController, ReplyEvent, Transport};
pub use types::*;
pub use value::{FromValue, Value};
