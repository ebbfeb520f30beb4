//! Entity types returned by the gpodder.net API

use crate::list::ListHandle;
use crate::value::{decode_or_default, null_as_default, FromValue, Value};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Playback/download state of an episode for the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    New,
    Play,
    Download,
    Delete,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FromStr for EpisodeStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => EpisodeStatus::New,
            "play" => EpisodeStatus::Play,
            "download" => EpisodeStatus::Download,
            "delete" => EpisodeStatus::Delete,
            _ => EpisodeStatus::Unknown,
        })
    }
}

/// A podcast episode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    /// Media URL
    pub url: Option<Url>,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// Feed URL of the podcast the episode belongs to
    pub podcast_url: Option<Url>,
    #[serde(deserialize_with = "null_as_default")]
    pub podcast_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub website: Option<Url>,
    /// Episode page on gpodder.net
    pub mygpo_link: Option<Url>,
    /// Release time as sent by the API (`2009-12-12T09:00:00`)
    pub released: Option<NaiveDateTime>,
    #[serde(deserialize_with = "null_as_default")]
    pub status: EpisodeStatus,
}

impl FromValue for Episode {
    fn from_value(value: &Value) -> Self {
        decode_or_default(value)
    }
}

/// A podcast feed as listed by the directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Podcast {
    /// Feed URL
    pub url: Option<Url>,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subscribers: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub subscribers_last_week: u64,
    pub logo_url: Option<Url>,
    pub website: Option<Url>,
    /// Podcast page on gpodder.net
    pub mygpo_link: Option<Url>,
}

impl FromValue for Podcast {
    fn from_value(value: &Value) -> Self {
        decode_or_default(value)
    }
}

/// A directory tag and how many podcasts carry it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    /// Older API versions name the field "title"
    #[serde(alias = "title")]
    pub tag: String,
    pub usage: u64,
}

impl FromValue for Tag {
    fn from_value(value: &Value) -> Self {
        decode_or_default(value)
    }
}

/// Kind of device registered with an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Laptop,
    Mobile,
    Server,
    #[default]
    #[serde(other)]
    Other,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Laptop => "laptop",
            DeviceType::Mobile => "mobile",
            DeviceType::Server => "server",
            DeviceType::Other => "other",
        }
    }
}

impl FromStr for DeviceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "desktop" => DeviceType::Desktop,
            "laptop" => DeviceType::Laptop,
            "mobile" => DeviceType::Mobile,
            "server" => DeviceType::Server,
            _ => DeviceType::Other,
        })
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device registered with an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub caption: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Number of subscriptions on the device
    pub subscriptions: u64,
}

impl FromValue for Device {
    fn from_value(value: &Value) -> Self {
        decode_or_default(value)
    }
}

pub type EpisodeList = ListHandle<Episode>;
pub type PodcastList = ListHandle<Podcast>;
pub type TagList = ListHandle<Tag>;
pub type DeviceList = ListHandle<Device>;
