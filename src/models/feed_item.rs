use serde::{Deserialize, Serialize};

/// One candidate entry pulled from a feed. Lives for a single pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Dedup key: feed-native id, else link, else title.
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
}
