//! Address-to-coordinate resolution.
//!
//! [`GeocodeResolver`] chains the postal registry, an optional keyed
//! provider and the public multi-host provider. Only
//! [`GeocodeError::FatalNetwork`] is meant to halt a caller's batch; every
//! other failure is scoped to the address being resolved.

pub mod error;
pub mod postal;
pub mod precise;
pub mod public;
pub mod resolver;
pub mod retry;

pub use error::GeocodeError;
pub use postal::{PostalClient, PostalFragment, PostalLookup};
pub use precise::PreciseProvider;
pub use public::{PublicCallPolicy, PublicProvider};
pub use resolver::{GeocodeResolver, Geocoder};
pub use retry::is_retryable_fault;
