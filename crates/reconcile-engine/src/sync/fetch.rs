//! Feed descriptions and the fetch collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NetworkFetchError;
use crate::event::Event;

/// A subscription that produces events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub name: String,
    /// Zone for this feed's floating times; the config default when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Feed {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// Fetches a feed's events, already decoded from whatever wire format the
/// source speaks.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_events(&self, feed: &Feed) -> Result<Vec<Event>, NetworkFetchError>;
}
