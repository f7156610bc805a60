//! `sim` — Toy collision-event generator with injected two-body decays.

pub mod event_gen;
pub mod scenarios;

pub use event_gen::EventGenerator;
pub use scenarios::{Scenario, ScenarioKind};
