pub mod ask;
pub(crate) mod health;
pub mod sessions;

pub use ask::ask;
pub use health::health_check;
