pub mod merge;
pub mod schema;
pub mod store;

pub use merge::deep_merge;
pub use schema::{AutoReplyConfig, AutomationConfig, CategoryReply, ClassificationConfig};
pub use store::ConfigStore;
