mod dates;
mod extractor;
mod fetcher;
pub mod item;
mod markup;

pub use extractor::extract;
#[cfg(test)]
pub use fetcher::parse_items;
pub use fetcher::FeedFetcher;
pub use item::RawItem;
