pub mod account;
pub mod connection;
pub mod post;

pub use account::{Account, AccountSummary, AuthorSummary, Relation, Relations, Role, Visibility};
pub use connection::{ConnectionError, ConnectionOp, ConnectionStatus, PairState, StatusView};
pub use post::{Comment, MediaItem, MediaType, Post, PostWithAuthor, TrendingPost};
