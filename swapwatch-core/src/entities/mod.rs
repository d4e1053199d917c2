pub mod conversions;
pub mod subscriptions;

pub use conversions::ConversionEvent;
pub use subscriptions::Subscription;
