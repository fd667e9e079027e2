pub mod affiliate;
mod blogger;
mod image_cache;
pub mod publisher;
mod telegram;

pub use affiliate::affiliate_block;
pub use image_cache::{HttpImageBackend, ImageBackend, ImageCache};
pub use publisher::Publisher;
