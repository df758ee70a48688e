use super::description::OutputRef;
use super::device::{DeviceKind, DeviceType};
use super::handles::*;
use crate::config::SimulationConfig;
use crate::data_structures::Immutable;
use crate::error::BuildError;
use crate::simulation::Simulation;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

/// Amount of input drivers kept in the stack for a device.
/// If a device has more than NODE_DRIVERS_TINYVEC_SIZE inputs, they will spill into the heap.
pub(crate) const NODE_DRIVERS_TINYVEC_SIZE: usize = 4;

/// Data structure which represents a device with its resolved pin bindings.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct Node {
    pub ty: DeviceType,
    /// Driver of every input pin, indexed by input slot.
    pub drivers: SmallVec<[OutputIndex; NODE_DRIVERS_TINYVEC_SIZE]>,
    /// First output pin, a DTYPE's QBAR is the next one.
    pub first_output: OutputIndex,
    /// Devices with at least one input driven by this device, in connection order.
    pub dependents: SmallVec<[DeviceIndex; 2]>,
}

/// Data structure which represents an output pin.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) struct OutputPin {
    pub device: DeviceIndex,
    pub offset: usize,
}

/// An immutable, validated device graph, created by
/// [CircuitDescription::build](super::CircuitDescription::build).
///
/// Devices and output pins are stored in dense tables indexed by [DeviceIndex] and
/// [OutputIndex], every input pin is bound to the output pin that drives it.
/// The topology never changes after building, all mutable state lives in the
/// [Simulation]s created with [Network::simulate], so one network can back any number of
/// independent runs.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) nodes: Immutable<Vec<Node>>,
    pub(crate) outputs: Immutable<Vec<OutputPin>>,
    pub(crate) names: Immutable<IndexMap<String, DeviceIndex>>,
    /// Gates in declaration order, the only devices recomputed during propagation.
    pub(crate) gates: Immutable<Vec<DeviceIndex>>,
    pub(crate) clocks: Immutable<Vec<DeviceIndex>>,
    pub(crate) dtypes: Immutable<Vec<DeviceIndex>>,
    pub(crate) monitors: Immutable<Vec<OutputIndex>>,
    pub(crate) connections: usize,
}

impl Network {
    /// Returns a new [Simulation] of `self` with the given configuration.
    ///
    /// The simulation starts from the cold start state, see [Simulation::new].
    pub fn simulate(&self, config: SimulationConfig) -> Simulation<'_> {
        Simulation::new(self, config)
    }

    /// Returns the number of devices in the network.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the network has no devices, an empty description builds one.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of connections in the network.
    pub fn connection_count(&self) -> usize {
        self.connections
    }

    /// Returns the [DeviceIndex] of the device called `name`.
    pub fn device(&self, name: &str) -> Option<DeviceIndex> {
        self.names.get().get(name).copied()
    }

    /// Returns the name of `device`.
    pub fn device_name(&self, device: DeviceIndex) -> &str {
        self.names
            .get_index(device.idx)
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    /// Returns the type of `device`.
    pub fn device_type(&self, device: DeviceIndex) -> DeviceType {
        self.nodes[device.idx].ty
    }

    /// Returns the kind of `device`.
    pub fn device_kind(&self, device: DeviceIndex) -> DeviceKind {
        self.nodes[device.idx].ty.kind()
    }

    /// Returns an iterator over the names and types of all devices in declaration order.
    pub fn devices(&self) -> impl Iterator<Item = (&str, DeviceType)> + '_ {
        self.names
            .iter()
            .map(move |(name, idx)| (name.as_str(), self.nodes[idx.idx].ty))
    }

    /// Returns the output pins monitored by the circuit description, in declaration order.
    pub fn monitors(&self) -> &[OutputIndex] {
        &self.monitors
    }

    /// Returns the output pin referenced by `reference`.
    pub fn output(&self, reference: &OutputRef) -> Result<OutputIndex, BuildError> {
        let device = self
            .device(&reference.device)
            .ok_or_else(|| BuildError::UnknownDeviceReference {
                device: reference.device.clone(),
                reference: reference.to_string(),
            })?;
        let node = &self.nodes[device.idx];
        let offset = node
            .ty
            .output_offset(reference.pin.as_deref())
            .map_err(|reason| BuildError::InvalidPinReference {
                reference: reference.to_string(),
                reason,
            })?;
        Ok(node.first_output.offset(offset))
    }

    /// Returns the device that owns `output`.
    pub fn output_device(&self, output: OutputIndex) -> DeviceIndex {
        self.outputs[output.idx].device
    }

    /// Returns the label of `output`, `NAME` or `NAME.Q` / `NAME.QBAR` for DTYPE outputs.
    pub fn output_label(&self, output: OutputIndex) -> String {
        let pin = self.outputs[output.idx];
        let name = self.device_name(pin.device);
        match self.nodes[pin.device.idx].ty.output_label(pin.offset) {
            Some(label) => format!("{}.{}", name, label),
            None => name.to_string(),
        }
    }

    /// Returns the label of input `slot` of `device`, e.g. `G1.I2` or `FF.CLK`.
    pub fn input_label(&self, device: DeviceIndex, slot: usize) -> String {
        format!(
            "{}.{}",
            self.device_name(device),
            self.nodes[device.idx].ty.input_label(slot)
        )
    }

    /// Returns the output pin driving input `slot` of `device`, [None] if `slot` is out of range.
    pub fn driver(&self, device: DeviceIndex, slot: usize) -> Option<OutputIndex> {
        self.nodes[device.idx].drivers.get(slot).copied()
    }

    /// Returns the devices driven by `device`, in connection order.
    pub fn dependents(&self, device: DeviceIndex) -> &[DeviceIndex] {
        &self.nodes[device.idx].dependents
    }

    /// Returns the number of output pins in the network.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Returns the graph in [dot](https://en.wikipedia.org/wiki/DOT_(graph_description_language)) format.
    ///
    /// Nodes are labeled `NAME:KIND`, edges with the input pin they drive.
    pub fn to_dot(&self) -> String {
        use petgraph::dot::Dot;
        let mut graph = petgraph::Graph::<String, String>::new();
        let mut index = HashMap::new();
        for (i, (name, _)) in self.names.iter().enumerate() {
            let label = format!("{}:{}", name, self.nodes[i].ty);
            index.insert(i, graph.add_node(label));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            for (slot, driver) in node.drivers.iter().enumerate() {
                let from = self.outputs[driver.idx].device.idx;
                graph.add_edge(
                    index[&from],
                    index[&i],
                    node.ty.input_label(slot),
                );
            }
        }
        format!("{}", Dot::new(&graph))
    }

    /// Dumps the graph in [dot](https://en.wikipedia.org/wiki/DOT_(graph_description_language)) format
    /// to `path`, see [Network::to_dot].
    pub fn dump_dot<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut f = std::fs::File::create(path)?;
        f.write_all(self.to_dot().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use crate::CircuitDescription;

    #[test]
    fn test_lookup_and_labels() {
        let mut c = CircuitDescription::new();
        c.switch("D", true)
            .clock("C", 1)
            .dtype("FF")
            .connect("D", "FF.DATA")
            .connect("C", "FF.CLK")
            .connect("D", "FF.SET")
            .connect("D", "FF.CLEAR")
            .not_wired("N", "FF.QBAR");
        let network = c.build().unwrap();

        assert_eq!(network.len(), 4);
        assert_eq!(network.connection_count(), 5);
        let ff = network.device("FF").unwrap();
        assert_eq!(network.device_name(ff), "FF");
        assert_eq!(network.device_kind(ff), crate::DeviceKind::Dtype);

        let qbar = network.output(&"FF.QBAR".into()).unwrap();
        assert_eq!(network.output_label(qbar), "FF.QBAR");
        assert_eq!(network.output_device(qbar), ff);

        let n = network.device("N").unwrap();
        assert_eq!(network.driver(n, 0), Some(qbar));
        assert_eq!(network.input_label(ff, 1), "FF.CLK");
        assert_eq!(network.dependents(ff), [n]);
        assert_eq!(network.dependents(network.device("D").unwrap()), [ff]);

        assert!(network.output(&"FF".into()).is_err());
        assert!(network.output(&"X".into()).is_err());
    }

    #[test]
    fn test_empty_network() {
        let network = CircuitDescription::new().build().unwrap();
        assert!(network.is_empty());
        assert_eq!(network.len(), 0);

        let mut sim = network.simulate(Default::default());
        let snapshot = sim.run_cycle().unwrap();
        assert_eq!(snapshot.passes(), 1);
        assert!(sim.trace().is_empty());
    }

    #[test]
    fn test_to_dot() {
        let mut c = CircuitDescription::new();
        c.switch("A", false).not_wired("N", "A");
        let dot = c.build().unwrap().to_dot();

        assert!(dot.contains("A:SWITCH 0"));
        assert!(dot.contains("N:NOT"));
        assert!(dot.contains("I1"));
    }
}
