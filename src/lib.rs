//! Cycle-based simulation of gate-level logic circuits.
//!
//! A [CircuitDescription] lists devices, connections and monitors. Building it validates every
//! statement and produces an immutable [Network], which can back any number of independent
//! [Simulation]s advanced one cycle at a time.

/// Asserts that the trace of monitor `label` matches `expected`, written with `_` for low and
/// `-` for high samples.
#[macro_export]
macro_rules! assert_trace {
    ($sim:expr, $label:expr, $expected:expr) => {
        let actual = $sim
            .monitors()
            .get($label)
            .unwrap_or_else(|| panic!("{} is not monitored", $label))
            .pattern();

        assert!(
            actual == $expected,
            "Trace of {} is {}, expected: {}",
            $label,
            actual,
            $expected
        );
    };
}

pub mod config;
pub mod data_structures;
pub mod error;
#[macro_use]
pub mod graph;
pub mod simulation;
pub use config::*;
pub use error::*;
pub use graph::*;
pub use simulation::*;
