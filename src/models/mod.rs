mod article;
mod category;
mod source;

pub use article::{Article, ArticleQuery, GroupCount, InsertOutcome, NewArticle, Stats};
pub use category::Category;
pub use source::FeedSource;
