//! Process exit codes.
//!
//! The external scheduler must never mistake a benchmark failure for
//! an execution fault, so `tick` always exits 0 — lock contention,
//! network errors, and failed benchmarks included. Non-zero is
//! reserved for usage errors (bad flags), which are the operator's
//! fault, not the schedule's.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE: i32 = 2;
