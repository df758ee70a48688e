//! Build and simulation settings.

/// Default number of propagation passes allowed on top of the device count before a
/// propagation phase is declared an oscillation.
///
/// An acyclic network of `d` devices settles in at most `d + 1` passes.
pub const DEFAULT_STABILIZATION_MARGIN: usize = 2;

/// Options for [CircuitDescription::build_with](crate::CircuitDescription::build_with).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct BuildOptions {
    /// Accept feedback loops made only of gates, such as cross-coupled NOR latches.
    ///
    /// Such loops are rejected with [CombinationalCycle](crate::BuildError::CombinationalCycle)
    /// by default. When accepted, a loop that never settles is reported at run time as an
    /// [Oscillation](crate::SimError::Oscillation).
    pub allow_combinational_feedback: bool,
}

/// Configuration of a [Simulation](crate::Simulation).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SimulationConfig {
    /// Passes allowed per propagation phase on top of the device count.
    pub stabilization_margin: usize,
    /// Maximum number of samples kept per trace, the oldest samples are dropped first.
    /// [None] keeps every sample.
    pub max_trace_len: Option<usize>,
}

impl SimulationConfig {
    /// Returns the maximum number of passes a propagation phase may take in a network of
    /// `devices` devices.
    pub fn max_passes(&self, devices: usize) -> usize {
        devices + self.stabilization_margin
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            stabilization_margin: DEFAULT_STABILIZATION_MARGIN,
            max_trace_len: None,
        }
    }
}
