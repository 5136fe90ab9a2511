//! Perfilar - embedded line-level execution profiler for language runtimes
//!
//! This library provides the profiling engine a language runtime drives on
//! every traced instruction boundary: a concurrent registry of source
//! locations, per-line call-stack bookkeeping that keeps recursive and
//! nested re-entry correct, duration accumulation, and report
//! serialization.
//!
//! The host owns policy: when to call [`registry::Profiler::begin`] and
//! [`registry::Profiler::end`], how profiling is switched on, and when the
//! report is flushed via [`registry::Profiler::save`].

pub mod call_stack;
pub mod clock;
pub mod error;
pub mod line_entry;
pub mod registry;
pub mod report;
pub mod source_unit;
