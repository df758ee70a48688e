//! Error types for building networks and running simulations.
//!
//! Everything that can be wrong with a circuit description is a [BuildError], found before any
//! simulation starts and reported together in [BuildErrors].
//! The only failure a running network can produce is a [SimError::Oscillation],
//! the other [SimError] variants reject bad requests between cycles.

use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};
use strum_macros::IntoStaticStr;

/// A problem with a circuit description, found while building the network.
#[derive(Clone, Debug, Eq, PartialEq, Hash, thiserror::Error, IntoStaticStr)]
pub enum BuildError {
    /// Two devices share a name.
    #[error("device `{name}` is declared more than once")]
    DuplicateDeviceName { name: String },

    /// A device name does not start with a letter, is not alphanumeric or is a list keyword.
    #[error("`{name}` is not a valid device name: {reason}")]
    InvalidDeviceName { name: String, reason: String },

    /// A device parameter is outside the range its kind accepts.
    #[error("device `{device}` is invalid: {reason}")]
    InvalidDeviceParameter { device: String, reason: String },

    /// A connection names a device that was never declared.
    #[error("`{reference}` refers to undeclared device `{device}`")]
    UnknownDeviceReference { device: String, reference: String },

    /// A connection names a pin its device does not have.
    #[error("`{reference}` is not a valid pin: {reason}")]
    InvalidPinReference { reference: String, reason: String },

    /// An input pin has no driver.
    #[error("input `{device}.{pin}` is not connected")]
    UnconnectedInput { device: String, pin: String },

    /// An input pin has more than one driver.
    #[error("input `{input}` is driven by both `{first}` and `{second}`")]
    DuplicateDriver {
        input: String,
        first: String,
        second: String,
    },

    /// A loop made only of gates, it has no memory element to break it.
    #[error("combinational feedback loop through {}", .devices.join(" -> "))]
    CombinationalCycle { devices: Vec<String> },

    /// A monitor names an undeclared device, an invalid output or an already monitored output.
    #[error("cannot monitor `{reference}`: {reason}")]
    InvalidMonitorTarget { reference: String, reason: String },
}

impl BuildError {
    /// Returns the name of the kind of error, e.g. `"UnconnectedInput"`.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Every [BuildError] found in a circuit description, in the order they were found.
///
/// Never empty.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BuildErrors(Vec<BuildError>);

impl BuildErrors {
    pub(crate) fn new(errors: Vec<BuildError>) -> Self {
        debug_assert!(!errors.is_empty(), "BuildErrors must not be empty");
        BuildErrors(errors)
    }

    /// Returns the errors in the order they were found.
    pub fn errors(&self) -> &[BuildError] {
        &self.0
    }

    /// Returns an iterator over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, BuildError> {
        self.0.iter()
    }

    /// Returns the number of errors.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the number of errors of kind `name`, see [BuildError::name].
    pub fn count(&self, name: &str) -> usize {
        self.0.iter().filter(|e| e.name() == name).count()
    }

    /// Returns true if any error is of kind `name`, see [BuildError::name].
    pub fn contains(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    /// Returns how many errors of each kind were found, in order of first appearance.
    pub fn counts(&self) -> IndexMap<&'static str, usize> {
        let mut counts = IndexMap::new();
        for error in &self.0 {
            *counts.entry(error.name()).or_insert(0) += 1;
        }
        counts
    }
}

impl Display for BuildErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) in circuit description", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {}: {}", error.name(), error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}

impl IntoIterator for BuildErrors {
    type Item = BuildError;
    type IntoIter = std::vec::IntoIter<BuildError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a BuildErrors {
    type Item = &'a BuildError;
    type IntoIter = std::slice::Iter<'a, BuildError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Errors reported by a [Simulation](crate::Simulation).
#[derive(Clone, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum SimError {
    /// Signals kept changing for the whole pass budget of a propagation phase.
    /// Cycle 0 is the cold start.
    #[error("signals did not settle within {max_passes} propagation passes in cycle {cycle}")]
    Oscillation { cycle: usize, max_passes: usize },

    /// No device has the given name.
    #[error("no device named `{0}`")]
    UnknownDevice(String),

    /// The named device exists but is not a switch.
    #[error("device `{0}` is not a switch")]
    NotASwitch(String),

    /// The output cannot be monitored.
    #[error("cannot monitor `{reference}`: {reason}")]
    InvalidMonitorTarget { reference: String, reason: String },

    /// No monitor has the given label.
    #[error("`{0}` is not monitored")]
    NotMonitored(String),
}
