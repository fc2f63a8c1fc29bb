pub mod geo;
pub mod provider;
pub mod retry;

pub use geo::{Bounds, GeoError, GeoPoint, Region};
pub use provider::Provider;
pub use retry::RetryPolicy;
