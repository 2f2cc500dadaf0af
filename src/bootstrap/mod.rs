mod lifecycle;
mod service;

pub use lifecycle::{Lifecycle, Phase};
pub use service::{Service, ServiceOptions};
