mod article;
mod feed_item;
mod post;

pub use article::GeneratedArticle;
pub use feed_item::FeedItem;
pub use post::{InternalLink, LinkRef, PostRecord};
