//! Lock-free plumbing between the listener and the handlers.

pub mod barrier;
pub mod dataflow;
pub mod queue;
pub mod signal;
