//! Backend module - upstream services and their liveness/latency state

pub mod registry;

pub use registry::{Backend, BackendRegistry};
