pub mod subscriptions;

pub use subscriptions::{SubscriptionRecord, SubscriptionService, UNKNOWN};
