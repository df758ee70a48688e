use super::cycles::combinational_cycles;
use super::description::{CircuitDescription, ConnectionDecl, InputRef, OutputRef};
use super::device::DeviceType;
use super::handles::*;
use super::network::{Network, Node, OutputPin};
use crate::config::BuildOptions;
use crate::error::{BuildError, BuildErrors};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

/// Words that open or close the statement lists of a definition file and cannot name a device.
const RESERVED_NAMES: [&str; 4] = ["DEVICE", "CONNECT", "MONITOR", "INPUTS"];

/// Binding of an input slot while the network is being built.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Slot {
    Open,
    /// Driven by `output` through connection number `connection`.
    Driven { output: OutputIndex, connection: usize },
    /// Driven by a device whose declaration was rejected, the slot isn't reported as unconnected.
    Rejected { connection: usize },
}

impl Slot {
    fn connection(self) -> Option<usize> {
        match self {
            Slot::Open => None,
            Slot::Driven { connection, .. } | Slot::Rejected { connection } => Some(connection),
        }
    }
}

/// Device being built, its inputs might not be driven yet.
struct BuildNode {
    /// [None] if the declaration was rejected. Connections touching it are not checked further,
    /// its declaration error is the only one reported for them.
    ty: Option<DeviceType>,
    drivers: SmallVec<[Slot; 4]>,
    first_output: OutputIndex,
    dependents: IndexSet<DeviceIndex>,
}

/// Validates a [CircuitDescription] and builds the [Network] it describes.
///
/// Problems are collected instead of stopping at the first one, the network is only
/// assembled if none were found.
struct NetworkBuilder<'a> {
    description: &'a CircuitDescription,
    options: BuildOptions,
    nodes: Vec<BuildNode>,
    names: IndexMap<String, DeviceIndex>,
    outputs: Vec<OutputPin>,
    errors: Vec<BuildError>,
}

pub(super) fn build_network(
    description: &CircuitDescription,
    options: BuildOptions,
) -> Result<Network, BuildErrors> {
    let mut builder = NetworkBuilder {
        description,
        options,
        nodes: Vec::with_capacity(description.devices.len()),
        names: IndexMap::with_capacity(description.devices.len()),
        outputs: Vec::new(),
        errors: Vec::new(),
    };
    builder.declare_devices();
    builder.connect();
    builder.check_unconnected();
    if !builder.options.allow_combinational_feedback {
        builder.check_cycles();
    }
    let monitors = builder.resolve_monitors();

    if !builder.errors.is_empty() {
        for error in &builder.errors {
            clilog::warn!("{}", error);
        }
        return Err(BuildErrors::new(builder.errors));
    }
    let network = builder.finish(monitors);
    clilog::info!(
        "built network: {} devices, {} connections, {} monitors",
        network.len(),
        network.connection_count(),
        network.monitors().len()
    );
    Ok(network)
}

/// Returns why `name` can't name a device, if it can't.
fn invalid_name_reason(name: &str) -> Option<&'static str> {
    match name.chars().next() {
        None => Some("names can't be empty"),
        Some(c) if !c.is_ascii_alphabetic() => Some("names must start with a letter"),
        _ if !name.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Some("names may only contain letters and digits")
        }
        _ if RESERVED_NAMES.contains(&name) => Some("names can't be a list keyword"),
        _ => None,
    }
}

impl<'a> NetworkBuilder<'a> {
    fn declare_devices(&mut self) {
        for decl in &self.description.devices {
            if let Some(reason) = invalid_name_reason(&decl.name) {
                self.errors.push(BuildError::InvalidDeviceName {
                    name: decl.name.clone(),
                    reason: reason.into(),
                });
            }
            if self.names.contains_key(&decl.name) {
                self.errors.push(BuildError::DuplicateDeviceName {
                    name: decl.name.clone(),
                });
                continue;
            }

            let (ty, inputs) = match decl.kind.instantiate(decl.parameter) {
                Ok((ty, inputs)) => (Some(ty), inputs),
                Err(reason) => {
                    self.errors.push(BuildError::InvalidDeviceParameter {
                        device: decl.name.clone(),
                        reason,
                    });
                    (None, 0)
                }
            };

            let idx = di!(self.nodes.len());
            let first_output = oi!(self.outputs.len());
            let output_count = ty.map_or(0, |ty| ty.output_count());
            for offset in 0..output_count {
                self.outputs.push(OutputPin {
                    device: idx,
                    offset,
                });
            }
            clilog::debug!("declared {}: {}", decl.name, decl.kind);
            self.names.insert(decl.name.clone(), idx);
            self.nodes.push(BuildNode {
                ty,
                drivers: std::iter::repeat(Slot::Open).take(inputs).collect(),
                first_output,
                dependents: Default::default(),
            });
        }
    }

    /// Returns the device `name` refers to.
    /// [None] means it was reported as unknown, or its declaration was rejected.
    fn lookup(&mut self, name: &str, reference: String) -> Option<(DeviceIndex, DeviceType)> {
        match self.names.get(name) {
            Some(idx) => self.nodes[idx.idx].ty.map(|ty| (*idx, ty)),
            None => {
                self.errors.push(BuildError::UnknownDeviceReference {
                    device: name.to_string(),
                    reference,
                });
                None
            }
        }
    }

    /// Returns true if `name` was declared but its declaration was rejected.
    fn is_rejected(&self, name: &str) -> bool {
        self.names
            .get(name)
            .map_or(false, |idx| self.nodes[idx.idx].ty.is_none())
    }

    fn resolve_output(&mut self, output: &OutputRef) -> Option<OutputIndex> {
        let (idx, ty) = self.lookup(&output.device, output.to_string())?;
        match ty.output_offset(output.pin.as_deref()) {
            Ok(offset) => Some(self.nodes[idx.idx].first_output.offset(offset)),
            Err(reason) => {
                self.errors.push(BuildError::InvalidPinReference {
                    reference: output.to_string(),
                    reason,
                });
                None
            }
        }
    }

    fn resolve_input(&mut self, input: &InputRef) -> Option<(DeviceIndex, usize)> {
        let (idx, ty) = self.lookup(&input.device, input.to_string())?;
        let inputs = self.nodes[idx.idx].drivers.len();
        match ty.input_slot(inputs, &input.pin) {
            Ok(slot) => Some((idx, slot)),
            Err(reason) => {
                self.errors.push(BuildError::InvalidPinReference {
                    reference: input.to_string(),
                    reason,
                });
                None
            }
        }
    }

    fn connect(&mut self) {
        let description = self.description;
        for (i, ConnectionDecl { from, to }) in description.connections.iter().enumerate() {
            // Both ends are resolved so that both get reported.
            let driver = self.resolve_output(from);
            let input = self.resolve_input(to);
            let (bound, (device, slot)) = match (driver, input) {
                (Some(output), Some(input)) => (
                    Slot::Driven {
                        output,
                        connection: i,
                    },
                    input,
                ),
                (None, Some(input)) if self.is_rejected(&from.device) => {
                    (Slot::Rejected { connection: i }, input)
                }
                _ => continue,
            };

            if let Some(first) = self.nodes[device.idx].drivers[slot].connection() {
                self.errors.push(BuildError::DuplicateDriver {
                    input: to.to_string(),
                    first: description.connections[first].from.to_string(),
                    second: from.to_string(),
                });
                continue;
            }
            self.nodes[device.idx].drivers[slot] = bound;
            if let Slot::Driven { output, .. } = bound {
                let driver_device = self.outputs[output.idx].device;
                self.nodes[driver_device.idx].dependents.insert(device);
            }
        }
    }

    fn check_unconnected(&mut self) {
        for (name, idx) in &self.names {
            let node = &self.nodes[idx.idx];
            let ty = match node.ty {
                Some(ty) => ty,
                None => continue,
            };
            for (slot, driver) in node.drivers.iter().enumerate() {
                if *driver == Slot::Open {
                    self.errors.push(BuildError::UnconnectedInput {
                        device: name.clone(),
                        pin: ty.input_label(slot),
                    });
                }
            }
        }
    }

    fn check_cycles(&mut self) {
        let nodes = &self.nodes;
        let cycles = combinational_cycles(
            nodes.len(),
            |i| nodes[i].ty.map_or(false, |ty| ty.is_combinational()),
            |i| nodes[i].dependents.iter().copied(),
        );
        for cycle in cycles {
            let devices = cycle
                .iter()
                .map(|d| self.names.get_index(d.idx).map(|(name, _)| name.clone()))
                .collect::<Option<Vec<_>>>()
                .unwrap_or_default();
            self.errors.push(BuildError::CombinationalCycle { devices });
        }
    }

    fn resolve_monitors(&mut self) -> Vec<OutputIndex> {
        let description = self.description;
        let mut monitors = IndexSet::new();
        for reference in &description.monitors {
            if !self.names.contains_key(&reference.device) {
                self.errors.push(BuildError::InvalidMonitorTarget {
                    reference: reference.to_string(),
                    reason: format!("no device named `{}`", reference.device),
                });
                continue;
            }
            let errors = self.errors.len();
            let output = match self.resolve_output(reference) {
                Some(output) => output,
                None => {
                    // Report the pin problem as a monitor problem.
                    if let Some(BuildError::InvalidPinReference { reason, .. }) =
                        self.errors.get(errors).cloned()
                    {
                        self.errors.truncate(errors);
                        self.errors.push(BuildError::InvalidMonitorTarget {
                            reference: reference.to_string(),
                            reason,
                        });
                    }
                    continue;
                }
            };
            if !monitors.insert(output) {
                self.errors.push(BuildError::InvalidMonitorTarget {
                    reference: reference.to_string(),
                    reason: "already monitored".into(),
                });
            }
        }
        monitors.into_iter().collect()
    }

    /// Assembles the network, only called when no errors were found.
    fn finish(self, monitors: Vec<OutputIndex>) -> Network {
        let mut gates = Vec::new();
        let mut clocks = Vec::new();
        let mut dtypes = Vec::new();
        let mut connections = 0;

        let nodes: Vec<Node> = self
            .nodes
            .into_iter()
            .enumerate()
            .filter_map(|(i, node)| {
                let ty = node.ty?;
                match ty {
                    DeviceType::Gate(_) => gates.push(di!(i)),
                    DeviceType::Clock { .. } => clocks.push(di!(i)),
                    DeviceType::Dtype => dtypes.push(di!(i)),
                    DeviceType::Switch { .. } => {}
                }
                let drivers: SmallVec<_> = node
                    .drivers
                    .into_iter()
                    .filter_map(|slot| match slot {
                        Slot::Driven { output, .. } => Some(output),
                        Slot::Open | Slot::Rejected { .. } => None,
                    })
                    .collect();
                connections += drivers.len();
                Some(Node {
                    ty,
                    drivers,
                    first_output: node.first_output,
                    dependents: node.dependents.into_iter().collect(),
                })
            })
            .collect();

        Network {
            nodes: nodes.into(),
            outputs: self.outputs.into(),
            names: self.names.into(),
            gates: gates.into(),
            clocks: clocks.into(),
            dtypes: dtypes.into(),
            monitors: monitors.into(),
            connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuildError, BuildOptions, CircuitDescription};

    #[test]
    fn test_valid_network() {
        let mut c = CircuitDescription::new();
        c.and("G1", 2)
            .and("G2", 2)
            .nor("G3", 2)
            .nor("G4", 2)
            .switch("SW1", false)
            .switch("SW2", true)
            .clock("CLK1", 10)
            .connect("SW1", "G1.I1")
            .connect("SW2", "G2.I2")
            .connect("CLK1", "G1.I2")
            .connect("CLK1", "G2.I1")
            .connect("G1", "G3.I1")
            .connect("G2", "G4.I2")
            .connect("G3", "G4.I1")
            .connect("G4", "G3.I2")
            .monitor("G3")
            .monitor("G4");

        let options = BuildOptions {
            allow_combinational_feedback: true,
        };
        let network = c.build_with(options).unwrap();
        let names: Vec<_> = network.devices().map(|(name, _)| name).collect();
        assert_eq!(names, ["G1", "G2", "G3", "G4", "SW1", "SW2", "CLK1"]);
        let monitors: Vec<_> = network
            .monitors()
            .iter()
            .map(|m| network.output_label(*m))
            .collect();
        assert_eq!(monitors, ["G3", "G4"]);

        // Without the option the latch is a combinational loop.
        let errors = c.build().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.errors()[0],
            BuildError::CombinationalCycle {
                devices: vec!["G3".into(), "G4".into(), "G3".into()]
            }
        );
    }

    #[test]
    fn test_unconnected_input() {
        let mut c = CircuitDescription::new();
        c.switch("SW", true).and("G1", 2).connect("SW", "G1.I1");

        let errors = c.build().unwrap_err();
        assert_eq!(
            errors.errors(),
            [BuildError::UnconnectedInput {
                device: "G1".into(),
                pin: "I2".into()
            }]
        );
    }

    #[test]
    fn test_unconnected_dtype_inputs_are_named() {
        let mut c = CircuitDescription::new();
        c.switch("SW", true).dtype("FF").connect("SW", "FF.DATA");

        let errors = c.build().unwrap_err();
        let pins: Vec<_> = errors
            .iter()
            .map(|e| match e {
                BuildError::UnconnectedInput { pin, .. } => pin.as_str(),
                e => panic!("unexpected error {}", e),
            })
            .collect();
        assert_eq!(pins, ["CLK", "SET", "CLEAR"]);
    }

    #[test]
    fn test_duplicate_names() {
        let mut c = CircuitDescription::new();
        c.switch("A", false).switch("A", true).not_wired("N", "A");

        let errors = c.build().unwrap_err();
        assert_eq!(
            errors.errors(),
            [BuildError::DuplicateDeviceName { name: "A".into() }]
        );
    }

    #[test]
    fn test_invalid_names() {
        let mut c = CircuitDescription::new();
        c.switch("1A", false)
            .switch("A_B", false)
            .switch("MONITOR", false)
            .switch("ok2", false);

        let errors = c.build().unwrap_err();
        assert_eq!(errors.count("InvalidDeviceName"), 3);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut c = CircuitDescription::new();
        c.and("G1", 100)
            .and("G2", 0)
            .clock("C", 0)
            .device("S", crate::DeviceKind::Switch, Some(2))
            .device("X", crate::DeviceKind::Xor, Some(3))
            .device("D", crate::DeviceKind::Dtype, Some(2))
            // Connections to rejected devices are not reported again.
            .connect("C", "G1.I1");

        let errors = c.build().unwrap_err();
        assert_eq!(errors.count("InvalidDeviceParameter"), 6);
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_rejected_driver_is_not_reported_again() {
        let mut c = CircuitDescription::new();
        c.clock("C", 0)
            .switch("SW", true)
            .and_wired("G", &["C", "SW"])
            .dtype("FF")
            .connect("C", "FF.CLK")
            .connect("SW", "FF.DATA")
            .connect("SW", "FF.SET")
            .connect("SW", "FF.CLEAR");
        assert_eq!(c.build().unwrap_err().len(), 1);

        c.connect("SW", "G.I1");
        let errors = c.build().unwrap_err();
        assert_eq!(errors.len(), 2, "{}", errors);
        assert_eq!(errors.count("InvalidDeviceParameter"), 1);
        // The slot is still taken, a second driver is reported.
        assert_eq!(
            errors.errors()[1],
            BuildError::DuplicateDriver {
                input: "G.I1".into(),
                first: "C".into(),
                second: "SW".into()
            }
        );
    }

    #[test]
    fn test_unknown_devices_and_pins() {
        let mut c = CircuitDescription::new();
        c.and("G1", 4)
            .xor("G2")
            .switch("SW", false)
            .connect("SW", "G1.I1")
            .connect("SW", "G1.I2")
            .connect("SW", "G1.I3")
            .connect("SW", "G1.I4")
            .connect("G2", "G3.I1")
            .connect("SW", "G2.NOTVALID")
            .connect("SW", "G2.I3")
            .connect("SW.Q", "G2.I1")
            .connect("G1", "SW.I1")
            .connect("SW", "G2");

        let errors = c.build().unwrap_err();
        assert_eq!(errors.count("UnknownDeviceReference"), 1);
        assert_eq!(errors.count("InvalidPinReference"), 5);
        // G2 never got a valid driver.
        assert_eq!(errors.count("UnconnectedInput"), 2);
    }

    #[test]
    fn test_duplicate_driver() {
        let mut c = CircuitDescription::new();
        c.xor("G1")
            .switch("SW1", false)
            .switch("SW2", false)
            .connect("SW1", "G1.I1")
            .connect("SW2", "G1.I1")
            .connect("SW2", "G1.I2");

        let errors = c.build().unwrap_err();
        assert_eq!(
            errors.errors(),
            [BuildError::DuplicateDriver {
                input: "G1.I1".into(),
                first: "SW1".into(),
                second: "SW2".into()
            }]
        );
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut c = CircuitDescription::new();
        c.not_wired("N", "N");

        let errors = c.build().unwrap_err();
        assert_eq!(
            errors.errors(),
            [BuildError::CombinationalCycle {
                devices: vec!["N".into(), "N".into()]
            }]
        );
    }

    #[test]
    fn test_feedback_through_dtype_is_legal() {
        let mut c = CircuitDescription::new();
        c.clock("C", 1)
            .switch("Z", false)
            .dtype("FF")
            .not_wired("N", "FF.Q")
            .connect("N", "FF.DATA")
            .connect("C", "FF.CLK")
            .connect("Z", "FF.SET")
            .connect("Z", "FF.CLEAR");

        assert!(c.build().is_ok());
    }

    #[test]
    fn test_invalid_monitors() {
        let mut c = CircuitDescription::new();
        c.switch("SW", false)
            .not_wired("N", "SW")
            .monitor("SW.Q")
            .monitor("X")
            .monitor("N")
            .monitor("N");

        let errors = c.build().unwrap_err();
        assert_eq!(errors.count("InvalidMonitorTarget"), 3);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_errors_are_collected() {
        let mut c = CircuitDescription::new();
        c.and("G", 2)
            .and("G", 2)
            .clock("C", 0)
            .connect("Y", "G.I1")
            .monitor("Z");

        let errors = c.build().unwrap_err();
        let counts: Vec<_> = errors.counts().into_iter().collect();
        assert_eq!(
            counts,
            [
                ("DuplicateDeviceName", 1),
                ("InvalidDeviceParameter", 1),
                ("UnknownDeviceReference", 1),
                ("UnconnectedInput", 2),
                ("InvalidMonitorTarget", 1),
            ]
        );
    }
}
