//! Protection Router and Relay Adapters (C8 + C9, §4.8).

pub mod bundle;
pub mod relay;
pub mod router;
pub mod strategy;

pub use bundle::{Bundle, BundleBuilder, BundleTransaction};
pub use relay::{RelayHealth, RelayRegistry};
pub use router::{ProtectionResult, ProtectionRouter};
pub use strategy::{Chain, ProtectionLevel, Strategy};
