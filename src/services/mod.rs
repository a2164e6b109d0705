// Analytical services over the persistence store.

pub mod content;
pub mod feed;
pub mod graph;
pub mod recommend;
pub mod threads;
pub mod txn;

pub use content::ContentService;
pub use feed::FeedService;
pub use graph::GraphService;
pub use recommend::RecommendationService;
pub use threads::ThreadService;
pub use txn::{BatchItem, TransactionCoordinator};
