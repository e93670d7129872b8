//! Stackwright — declarative deployment topology builder.
//!
//! Builds an immutable graph of infrastructure descriptors (static site,
//! containerized service, load-balancer routing) from stack parameters,
//! binds it to existing shared infrastructure by strict lookup, and renders
//! a deterministic template for a provisioning engine.

pub mod cli;
pub mod core;
pub mod tripwire;
