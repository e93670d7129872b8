//! Tripwire — provenance event log and BLAKE3 hashing.

pub mod eventlog;
pub mod hasher;
