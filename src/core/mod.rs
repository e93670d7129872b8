//! Core topology logic — types, parsing, lookup, building, checking,
//! rendering, planning and synthesis.

pub mod builder;
pub mod lookup;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod scaffold;
pub mod state;
pub mod synth;
pub mod template;
pub mod types;
