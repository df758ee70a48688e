use super::device::DeviceKind;
use super::network::Network;
use super::network_builder::build_network;
use crate::config::BuildOptions;
use crate::error::BuildErrors;
use casey::pascal;
use concat_idents::concat_idents;
use std::fmt::{self, Display, Formatter};

use DeviceKind::*;

/// Reference to an output pin: a device name and, for DTYPE devices, `Q` or `QBAR`.
///
/// Converts from `"SW1"` or `"FF1.QBAR"`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct OutputRef {
    pub device: String,
    pub pin: Option<String>,
}

/// Reference to an input pin: a device name and a pin label such as `I2` or `CLK`.
///
/// Converts from `"G1.I2"`, a reference without a dot has an empty pin label and is rejected
/// when the network is built.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct InputRef {
    pub device: String,
    pub pin: String,
}

impl OutputRef {
    pub fn new<S: Into<String>>(device: S, pin: Option<&str>) -> Self {
        OutputRef {
            device: device.into(),
            pin: pin.map(Into::into),
        }
    }
}

impl InputRef {
    pub fn new<S: Into<String>, P: Into<String>>(device: S, pin: P) -> Self {
        InputRef {
            device: device.into(),
            pin: pin.into(),
        }
    }
}

impl From<&str> for OutputRef {
    fn from(s: &str) -> Self {
        match s.split_once('.') {
            Some((device, pin)) => OutputRef::new(device, Some(pin)),
            None => OutputRef::new(s, None),
        }
    }
}
impl From<String> for OutputRef {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}
impl From<&str> for InputRef {
    fn from(s: &str) -> Self {
        match s.split_once('.') {
            Some((device, pin)) => InputRef::new(device, pin),
            None => InputRef::new(s, ""),
        }
    }
}
impl From<String> for InputRef {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}

impl Display for OutputRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.pin {
            Some(pin) => write!(f, "{}.{}", self.device, pin),
            None => write!(f, "{}", self.device),
        }
    }
}
impl Display for InputRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.device, self.pin)
    }
}

/// A device declaration: `name: KIND [parameter]`.
///
/// The parameter is the input count of a gate, the initial state of a switch
/// or the half period of a clock.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceDecl {
    pub name: String,
    pub kind: DeviceKind,
    pub parameter: Option<u32>,
}

/// A connection declaration: `output -> input`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConnectionDecl {
    pub from: OutputRef,
    pub to: InputRef,
}

/// Creates name, and name_wired declarations for every gate with a variable number of inputs.
///
/// `name` declares the gate, `name_wired` also connects one driver to each of its inputs in order.
macro_rules! gate_declarations {
    ($name:ident,$($rest:ident),*) => {
        gate_declarations!($name);
        gate_declarations!($($rest),*);
    };
    ($name:ident) => {
        /// Declares a new gate with `inputs` inputs named I1 to In.
        pub fn $name<S: Into<String>>(&mut self, name: S, inputs: u32) -> &mut Self {
            self.device(name, pascal!($name), Some(inputs))
        }

        concat_idents!(name_wired = $name, _, wired {
            /// Declares a new gate with one input per driver in `drivers` and connects
            /// the nth driver to input In.
            pub fn name_wired<S: Into<String>>(&mut self, name: S, drivers: &[&str]) -> &mut Self {
                let name = name.into();
                self.device(name.clone(), pascal!($name), Some(drivers.len() as u32));
                self.wire(&name, drivers)
            }
        });
    };
}

/// The statement list of a circuit definition: device declarations, connections and monitors,
/// each kept in source order.
///
/// A parser fills one of these from a definition file, tests and programs can also write
/// circuits by hand with the chaining declaration methods. Nothing is checked until
/// [CircuitDescription::build] turns it into a [Network].
///
/// # Example
/// ```
/// # use logsim::CircuitDescription;
/// let mut c = CircuitDescription::new();
/// c.switch("SW1", false)
///     .switch("SW2", true)
///     .clock("CLK", 5)
///     .nand_wired("NAND", &["SW1", "CLK"])
///     .or_wired("OR", &["CLK", "SW2"])
///     .nor_wired("NOR", &["NAND", "OR"])
///     .monitor("CLK")
///     .monitor("NOR");
///
/// let network = c.build().unwrap();
/// let mut sim = network.simulate(Default::default());
///
/// let snapshot = sim.run_cycle().unwrap();
/// assert_eq!(snapshot.get("CLK"), Some(false));
/// assert_eq!(snapshot.get("NOR"), Some(false));
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CircuitDescription {
    pub devices: Vec<DeviceDecl>,
    pub connections: Vec<ConnectionDecl>,
    pub monitors: Vec<OutputRef>,
}

impl CircuitDescription {
    /// Returns an empty [CircuitDescription].
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns a [CircuitDescription] made of already parsed statement lists.
    pub fn from_parts(
        devices: Vec<DeviceDecl>,
        connections: Vec<ConnectionDecl>,
        monitors: Vec<OutputRef>,
    ) -> Self {
        CircuitDescription {
            devices,
            connections,
            monitors,
        }
    }

    /// Declares a device of any kind.
    pub fn device<S: Into<String>>(
        &mut self,
        name: S,
        kind: DeviceKind,
        parameter: Option<u32>,
    ) -> &mut Self {
        self.devices.push(DeviceDecl {
            name: name.into(),
            kind,
            parameter,
        });
        self
    }

    // Declarations for all gate types with a variable number of inputs.
    gate_declarations!(and, or, nand, nor);

    /// Declares a new XOR gate, inputs I1 and I2.
    pub fn xor<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.device(name, Xor, None)
    }

    /// Declares a new XOR gate and connects `a` to I1 and `b` to I2.
    pub fn xor_wired<S: Into<String>>(&mut self, name: S, a: &str, b: &str) -> &mut Self {
        let name = name.into();
        self.device(name.clone(), Xor, None);
        self.wire(&name, &[a, b])
    }

    /// Declares a new NOT gate, input I1.
    pub fn not<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.device(name, Not, None)
    }

    /// Declares a new NOT gate and connects `driver` to I1.
    pub fn not_wired<S: Into<String>>(&mut self, name: S, driver: &str) -> &mut Self {
        let name = name.into();
        self.device(name.clone(), Not, None);
        self.wire(&name, &[driver])
    }

    /// Declares a new switch in state `initial`.
    pub fn switch<S: Into<String>>(&mut self, name: S, initial: bool) -> &mut Self {
        self.device(name, Switch, Some(initial as u32))
    }

    /// Declares a new clock whose output holds each phase for `half_period` cycles.
    pub fn clock<S: Into<String>>(&mut self, name: S, half_period: u32) -> &mut Self {
        self.device(name, Clock, Some(half_period))
    }

    /// Declares a new D-type flip-flop, inputs DATA, CLK, SET, CLEAR and outputs Q, QBAR.
    pub fn dtype<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.device(name, Dtype, None)
    }

    /// Connects output `from` to input `to`.
    pub fn connect<O: Into<OutputRef>, I: Into<InputRef>>(&mut self, from: O, to: I) -> &mut Self {
        self.connections.push(ConnectionDecl {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Adds output `pin` to the monitored signals.
    pub fn monitor<O: Into<OutputRef>>(&mut self, pin: O) -> &mut Self {
        self.monitors.push(pin.into());
        self
    }

    /// Connects the nth driver to input In of `device`.
    fn wire(&mut self, device: &str, drivers: &[&str]) -> &mut Self {
        for (i, driver) in drivers.iter().enumerate() {
            self.connect(*driver, InputRef::new(device, format!("I{}", i + 1)));
        }
        self
    }

    /// Validates the description and returns the [Network] it describes, with default [BuildOptions].
    pub fn build(&self) -> Result<Network, BuildErrors> {
        self.build_with(BuildOptions::default())
    }

    /// Validates the description and returns the [Network] it describes.
    ///
    /// Every problem found is reported, see [BuildErrors].
    pub fn build_with(&self, options: BuildOptions) -> Result<Network, BuildErrors> {
        build_network(self, options)
    }
}
