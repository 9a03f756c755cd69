pub mod classifier;
pub mod http;
pub mod images;
pub mod keywords;
pub mod stock_photo;

pub use classifier::classify;
pub use http::{HttpClient, HttpFetch};
pub use images::{ImageCache, ImageResolver};
pub use keywords::extract_keywords;
pub use stock_photo::{StockPhotoSearch, UnsplashClient};
