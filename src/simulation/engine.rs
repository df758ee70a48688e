use super::monitors::{Monitors, Snapshot, Trace};
use crate::config::SimulationConfig;
use crate::data_structures::State;
use crate::error::SimError;
use crate::graph::{
    clock_tick, dtype_next, DeviceIndex, DeviceType, DtypeInput, DtypeOutput, Network, OutputRef,
};
use indexmap::IndexMap;

/// Lifecycle of a [Simulation].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RunState {
    /// Cold start settled, no cycle has run yet.
    Idle,
    /// A cycle is propagating.
    Stabilizing,
    /// The last cycle settled.
    Settled,
    /// A propagation phase did not settle, the run is over.
    Failed,
}

/// Per device state that is not an output value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Memory {
    Stateless,
    Clock { ticks: u32 },
    /// CLK as sampled by the last edge detection.
    Dtype { last_clk: bool },
}

/// Everything a failed cycle has to roll back.
#[derive(Clone, Debug)]
struct Checkpoint {
    state: State,
    memory: Vec<Memory>,
}

/// A run of a [Network], advanced one cycle at a time by [Simulation::run_cycle].
///
/// Every cycle:
/// 1. Ticks every clock.
/// 2. Propagates the gate outputs until a pass over all gates changes nothing.
/// 3. Commits the new value of every DTYPE that saw a rising edge on CLK.
/// 4. Propagates again if any DTYPE changed.
/// 5. Appends the monitored signals to their traces.
///
/// Gates are recomputed in declaration order and each one sees the outputs already computed
/// earlier in the same pass, so an acyclic network settles within `device count + 1` passes.
/// A phase that takes more than [SimulationConfig::max_passes] fails the cycle with
/// [SimError::Oscillation], the state is rolled back to the end of the previous cycle and every
/// later cycle fails with the same error.
///
/// # Example
/// ```
/// # use logsim::CircuitDescription;
/// let mut c = CircuitDescription::new();
/// c.clock("CLK", 1)
///     .switch("ZERO", false)
///     .dtype("FF")
///     .connect("FF.QBAR", "FF.DATA")
///     .connect("CLK", "FF.CLK")
///     .connect("ZERO", "FF.SET")
///     .connect("ZERO", "FF.CLEAR")
///     .monitor("FF.Q");
/// let network = c.build().unwrap();
///
/// let mut sim = network.simulate(Default::default());
/// sim.run_cycles(8).unwrap();
/// logsim::assert_trace!(sim, "FF.Q", "--__--__");
/// ```
#[derive(Debug, Clone)]
pub struct Simulation<'n> {
    network: &'n Network,
    config: SimulationConfig,
    /// One bit per output pin.
    state: State,
    memory: Vec<Memory>,
    monitors: Monitors,
    run_state: RunState,
    cycle: usize,
    /// Passes taken by the last settled cycle.
    passes: usize,
    failure: Option<SimError>,
    // Allocated outside to prevent allocations every cycle.
    pending_commits: Vec<(DeviceIndex, bool)>,
    checkpoint: Checkpoint,
}

impl<'n> Simulation<'n> {
    /// Returns a new [Simulation] of `network` after the cold start.
    ///
    /// The cold start is cycle 0: switches hold their declared state, clocks are low with their
    /// tick counter at 0, every DTYPE holds Q low and QBAR high, then the gates are propagated.
    /// Nothing is recorded for cycle 0.
    /// If the gates don't settle the simulation starts [Failed](RunState::Failed).
    pub fn new(network: &'n Network, config: SimulationConfig) -> Self {
        let mut monitors = Monitors::new(config.max_trace_len);
        for output in network.monitors() {
            // Labels of distinct outputs are distinct.
            let _ = monitors.add(network.output_label(*output), *output, 1);
        }
        let mut sim = Simulation {
            network,
            config,
            state: State::new(network.output_count()),
            memory: vec![Memory::Stateless; network.len()],
            monitors,
            run_state: RunState::Idle,
            cycle: 0,
            passes: 0,
            failure: None,
            pending_commits: Vec::with_capacity(network.dtypes.len()),
            checkpoint: Checkpoint {
                state: State::new(network.output_count()),
                memory: vec![Memory::Stateless; network.len()],
            },
        };
        sim.cold_start();
        sim
    }

    fn cold_start(&mut self) {
        let network = self.network;
        self.state = State::new(network.output_count());
        self.cycle = 0;
        self.passes = 0;
        self.failure = None;
        self.run_state = RunState::Stabilizing;

        for (i, node) in network.nodes.iter().enumerate() {
            self.memory[i] = match node.ty {
                DeviceType::Switch { initial } => {
                    self.state.set(node.first_output.idx, initial);
                    Memory::Stateless
                }
                DeviceType::Clock { .. } => Memory::Clock { ticks: 0 },
                DeviceType::Dtype => {
                    let qbar = node.first_output.offset(u8::from(DtypeOutput::Qbar) as usize);
                    self.state.set(qbar.idx, true);
                    Memory::Dtype { last_clk: false }
                }
                DeviceType::Gate(_) => Memory::Stateless,
            }
        }

        match self.propagate(0) {
            Ok(passes) => {
                for &dtype in network.dtypes.iter() {
                    let clk = self.input(dtype, DtypeInput::Clk);
                    self.memory[dtype.idx] = Memory::Dtype { last_clk: clk };
                }
                self.passes = passes;
                self.run_state = RunState::Idle;
                clilog::debug!("cold start settled after {} passes", passes);
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, e: SimError) {
        clilog::error!("{}", e);
        self.run_state = RunState::Failed;
        self.failure = Some(e);
    }

    /// Returns the value driving input `pin` of `device`.
    #[inline(always)]
    fn input(&self, device: DeviceIndex, pin: DtypeInput) -> bool {
        let driver = self.network.nodes[device.idx].drivers[pin.slot()];
        self.state.get_state(driver.idx)
    }

    /// Recomputes every gate until a pass changes nothing.
    /// Returns the number of passes, including the last one that changed nothing.
    fn propagate(&mut self, cycle: usize) -> Result<usize, SimError> {
        let network = self.network;
        let max_passes = self.config.max_passes(network.len());
        for pass in 1..=max_passes {
            self.state.tick();
            for &gate in network.gates.iter() {
                let node = &network.nodes[gate.idx];
                let ty = match node.ty {
                    DeviceType::Gate(ty) => ty,
                    _ => continue,
                };
                let state = &self.state;
                let value = ty.evaluate(node.drivers.iter().map(|d| state.get_state(d.idx)));
                let changed = self.state.set(node.first_output.idx, value);

                #[cfg(feature = "debug_probes")]
                if changed {
                    clilog::debug!(
                        "cycle {} pass {}: {} -> {}",
                        cycle,
                        pass,
                        network.output_label(node.first_output),
                        value as u8
                    );
                }
                #[cfg(not(feature = "debug_probes"))]
                let _ = changed;
            }
            if !self.state.any_changed() {
                return Ok(pass);
            }
        }
        Err(SimError::Oscillation { cycle, max_passes })
    }

    /// Ticks every clock, flipping the ones that completed a half period.
    fn tick_clocks(&mut self) {
        let network = self.network;
        for &clock in network.clocks.iter() {
            let node = &network.nodes[clock.idx];
            if let (DeviceType::Clock { half_period }, Memory::Clock { ticks }) =
                (node.ty, self.memory[clock.idx])
            {
                let (ticks, flip) = clock_tick(ticks, half_period);
                self.memory[clock.idx] = Memory::Clock { ticks };
                if flip {
                    let output = node.first_output.idx;
                    self.state.set(output, !self.state.get_state(output));
                }
            }
        }
    }

    /// Computes the next value of every DTYPE with a rising CLK edge, then commits them all.
    /// Returns true if any output changed.
    fn clock_dtypes(&mut self) -> bool {
        let network = self.network;
        self.pending_commits.clear();
        for &dtype in network.dtypes.iter() {
            let clk = self.input(dtype, DtypeInput::Clk);
            if let Memory::Dtype { last_clk } = self.memory[dtype.idx] {
                if clk && !last_clk {
                    let next = dtype_next(
                        self.input(dtype, DtypeInput::Data),
                        self.input(dtype, DtypeInput::Set),
                        self.input(dtype, DtypeInput::Clear),
                    );
                    self.pending_commits.push((dtype, next));
                }
            }
            self.memory[dtype.idx] = Memory::Dtype { last_clk: clk };
        }

        let mut changed = false;
        for &(dtype, q) in &self.pending_commits {
            let first = network.nodes[dtype.idx].first_output;
            changed |= self.state.set(first.offset(u8::from(DtypeOutput::Q) as usize).idx, q);
            self.state
                .set(first.offset(u8::from(DtypeOutput::Qbar) as usize).idx, !q);
        }
        changed
    }

    fn step(&mut self, cycle: usize) -> Result<usize, SimError> {
        self.tick_clocks();
        self.run_state = RunState::Stabilizing;
        let mut passes = self.propagate(cycle)?;
        if self.clock_dtypes() {
            passes += self.propagate(cycle)?;
        }
        Ok(passes)
    }

    /// Runs one cycle and returns the settled values of the monitors.
    ///
    /// Returns [SimError::Oscillation] if the cycle didn't settle, or if an earlier one didn't.
    pub fn run_cycle(&mut self) -> Result<Snapshot, SimError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.checkpoint.state.clone_from(&self.state);
        self.checkpoint.memory.clone_from(&self.memory);
        let cycle = self.cycle + 1;
        match self.step(cycle) {
            Ok(passes) => {
                self.cycle = cycle;
                self.passes = passes;
                self.run_state = RunState::Settled;
                self.monitors.record(&self.state);
                clilog::debug!("cycle {} settled after {} passes", cycle, passes);
                Ok(self.monitors.snapshot(&self.state, cycle, passes))
            }
            Err(e) => {
                self.state.clone_from(&self.checkpoint.state);
                self.memory.clone_from(&self.checkpoint.memory);
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    /// Runs `n` cycles, stopping at the first one that fails.
    pub fn run_cycles(&mut self, n: usize) -> Result<(), SimError> {
        for _ in 0..n {
            self.run_cycle()?;
        }
        Ok(())
    }

    /// Restores the cold start state and drops every recorded sample.
    ///
    /// Switches go back to their declared state, the monitor set is kept.
    pub fn reset(&mut self) {
        self.monitors.clear(1);
        self.cold_start();
        clilog::info!("simulation reset");
    }

    /// Sets the state of switch `name`, it takes effect in the next cycle.
    pub fn set_switch(&mut self, name: &str, value: bool) -> Result<(), SimError> {
        let device = self
            .network
            .device(name)
            .ok_or_else(|| SimError::UnknownDevice(name.to_string()))?;
        let node = &self.network.nodes[device.idx];
        match node.ty {
            DeviceType::Switch { .. } => {
                self.state.set(node.first_output.idx, value);
                Ok(())
            }
            _ => Err(SimError::NotASwitch(name.to_string())),
        }
    }

    /// Returns an iterator over the names and states of every switch, in declaration order.
    pub fn switches(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.network
            .devices()
            .filter(|(_, ty)| matches!(ty, DeviceType::Switch { .. }))
            .filter_map(move |(name, _)| {
                let device = self.network.device(name)?;
                let output = self.network.nodes[device.idx].first_output;
                Some((name, self.state.get_state(output.idx)))
            })
    }

    /// Returns the current value of any output pin, [None] if `reference` isn't one.
    pub fn value<O: Into<OutputRef>>(&self, reference: O) -> Option<bool> {
        let output = self.network.output(&reference.into()).ok()?;
        Some(self.state.get_state(output.idx))
    }

    /// Starts monitoring the output pin `reference`, its first sample is the next cycle.
    pub fn add_monitor<O: Into<OutputRef>>(&mut self, reference: O) -> Result<(), SimError> {
        let reference = reference.into();
        let output = self
            .network
            .output(&reference)
            .map_err(|e| SimError::InvalidMonitorTarget {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;
        let label = self.network.output_label(output);
        self.monitors.add(label, output, self.cycle + 1)?;
        clilog::debug!("monitoring {}", reference);
        Ok(())
    }

    /// Stops monitoring the pin labeled `label` and returns its trace.
    pub fn remove_monitor(&mut self, label: &str) -> Result<Trace, SimError> {
        let trace = self.monitors.remove(label)?;
        clilog::debug!("stopped monitoring {}", label);
        Ok(trace)
    }

    /// Returns the recorded samples of every monitor, in monitor order.
    pub fn trace(&self) -> IndexMap<String, Vec<bool>> {
        self.monitors
            .iter()
            .map(|trace| (trace.label().to_string(), trace.to_vec()))
            .collect()
    }

    /// Returns the monitors and their traces.
    pub fn monitors(&self) -> &Monitors {
        &self.monitors
    }

    /// Returns the monitored values of the last settled cycle, cycle 0 before any cycle ran.
    ///
    /// After a failure this is the state the failed cycle was rolled back to.
    pub fn last_stable_snapshot(&self) -> Snapshot {
        self.monitors.snapshot(&self.state, self.cycle, self.passes)
    }

    /// Returns the number of cycles that settled since the cold start.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Returns the current [RunState].
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Returns the error that ended the run, if any.
    pub fn failure(&self) -> Option<&SimError> {
        self.failure.as_ref()
    }

    /// Returns the simulated network.
    pub fn network(&self) -> &'n Network {
        self.network
    }

    /// Returns the configuration of the simulation.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns the signal bits, indexed by [OutputIndex](crate::OutputIndex).
    pub fn state(&self) -> &State {
        &self.state
    }
}
