//! Queue module - admission control and request dispatch

pub mod admission;
pub mod dispatcher;

pub use admission::{AdmissionControl, AdmissionPermit, AdmissionSnapshot};
pub use dispatcher::{Dispatcher, DispatcherPhase};
