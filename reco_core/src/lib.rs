//! `reco_core` — Two-body decay and resonance reconstruction.
//!
//! # Module layout
//! - [`types`]       — Fundamental types (Track, Event, particle masses)
//! - [`helix`]       — Charged-particle helix model in a uniform field
//! - [`dca`]         — Two-helix distance of closest approach
//! - [`builder`]     — Generic opposite-sign pair candidate builder
//! - [`selection`]   — Cut configuration structs and selection predicates
//! - [`mixing`]      — Event-mixing pool for combinatorial background
//! - [`accumulator`] — Histogram sink behind the `Accumulator` trait
//! - [`pipeline`]    — Single-threaded event-at-a-time orchestrator

pub mod accumulator;
pub mod builder;
pub mod dca;
pub mod helix;
pub mod mixing;
pub mod pipeline;
pub mod selection;
pub mod types;

pub use accumulator::{Accumulator, HistogramSet};
pub use builder::{Candidate, PairHypothesis, Topology, TopologyKind};
pub use pipeline::{CandidateBatch, Pipeline, RunReport};
pub use selection::AnalysisConfig;
pub use types::{Event, Track, Vec3};
