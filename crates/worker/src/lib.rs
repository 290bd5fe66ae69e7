//! Offline-caching request worker.
//!
//! A [`ServiceWorker`] owns three handlers over one versioned cache store:
//! install/activate ([`lifecycle`]), fetch ([`routing`]) and control
//! messages ([`message`]). The [`Registration`] plays the hosting runtime:
//! it owns the lifecycle state machine, the set of open pages, and decides
//! which instance sees which request.

pub mod error;
pub mod lifecycle;
pub mod message;
pub mod registration;
pub mod routing;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::RegistrationError;
pub use lifecycle::{ActivateReport, InstallReport};
pub use message::ControlMessage;
pub use registration::{ClientId, Registration, WorkerId, WorkerState};
pub use routing::{Matcher, Route, RouteTable, Strategy};
pub use store::CacheStore;
pub use worker::{FetchOutcome, ServiceWorker};
