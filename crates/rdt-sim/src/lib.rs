//! Link simulator for the `rdt-transport` ARQ core.
//!
//! Runs a sender and a receiver against each other over a seeded,
//! impaired point-to-point link in virtual time, and checks that the
//! application bytes come out exactly as they went in.

pub mod impairment;
pub mod link;
pub mod scenario;
pub mod simulator;
pub mod traffic;

pub use impairment::ImpairmentConfig;
pub use scenario::ScenarioConfig;
pub use simulator::{Outcome, SimulationReport, Simulator};
