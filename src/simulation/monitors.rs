use crate::data_structures::State;
use crate::error::SimError;
use crate::graph::OutputIndex;
use bitvec::prelude::*;
use indexmap::IndexMap;

/// Character used to render a high sample.
pub const HIGH: char = '-';
/// Character used to render a low sample.
pub const LOW: char = '_';

/// Recorded values of one monitored output pin, one sample per settled cycle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Trace {
    label: String,
    output: OutputIndex,
    first_cycle: usize,
    samples: BitVec,
}

impl Trace {
    fn new(label: String, output: OutputIndex, first_cycle: usize) -> Self {
        Trace {
            label,
            output,
            first_cycle,
            samples: BitVec::new(),
        }
    }

    /// Returns the label of the monitored pin, `NAME` or `NAME.Q` / `NAME.QBAR`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the monitored pin.
    pub fn output(&self) -> OutputIndex {
        self.output
    }

    /// Returns the cycle the first kept sample belongs to.
    pub fn first_cycle(&self) -> usize {
        self.first_cycle
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the sample recorded in `cycle`, [None] if it wasn't recorded or was dropped.
    pub fn at_cycle(&self, cycle: usize) -> Option<bool> {
        let i = cycle.checked_sub(self.first_cycle)?;
        self.samples.get(i).map(|bit| *bit)
    }

    /// Returns an iterator over the samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.samples.iter().by_vals()
    }

    /// Returns the samples, oldest first.
    pub fn to_vec(&self) -> Vec<bool> {
        self.iter().collect()
    }

    /// Returns the samples rendered as `_` for low and `-` for high.
    pub fn pattern(&self) -> String {
        self.iter().map(|v| if v { HIGH } else { LOW }).collect()
    }

    fn push(&mut self, value: bool, max_len: Option<usize>) {
        self.samples.push(value);
        if let Some(max_len) = max_len {
            let excess = self.samples.len().saturating_sub(max_len);
            if excess > 0 {
                drop(self.samples.drain(..excess));
                self.first_cycle += excess;
            }
        }
    }
}

/// Monitored signals of a single cycle, in monitor order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Snapshot {
    cycle: usize,
    passes: usize,
    values: IndexMap<String, bool>,
}

impl Snapshot {
    /// Returns the cycle the values were sampled at, 0 for the cold start.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Returns the number of propagation passes the cycle took to settle.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Returns the value of the monitor labeled `label`.
    pub fn get(&self, label: &str) -> Option<bool> {
        self.values.get(label).copied()
    }

    /// Returns the values of every monitor, in monitor order.
    pub fn values(&self) -> &IndexMap<String, bool> {
        &self.values
    }

    /// Returns an iterator over the labels and values, in monitor order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.values.iter().map(|(label, v)| (label.as_str(), *v))
    }
}

/// The monitored output pins of a simulation and their traces.
///
/// Monitors keep the order they were added in, which is the order of the monitor list of the
/// circuit description followed by monitors added while simulating.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Monitors {
    traces: IndexMap<String, Trace>,
    max_len: Option<usize>,
}

impl Monitors {
    pub(crate) fn new(max_len: Option<usize>) -> Self {
        Monitors {
            traces: IndexMap::new(),
            max_len,
        }
    }

    /// Starts recording `output` as `label`, its first sample will belong to `first_cycle`.
    pub(crate) fn add(
        &mut self,
        label: String,
        output: OutputIndex,
        first_cycle: usize,
    ) -> Result<(), SimError> {
        if self.traces.contains_key(&label) {
            return Err(SimError::InvalidMonitorTarget {
                reference: label,
                reason: "already monitored".into(),
            });
        }
        let trace = Trace::new(label.clone(), output, first_cycle);
        self.traces.insert(label, trace);
        Ok(())
    }

    /// Stops recording `label` and returns its trace.
    pub(crate) fn remove(&mut self, label: &str) -> Result<Trace, SimError> {
        self.traces
            .shift_remove(label)
            .ok_or_else(|| SimError::NotMonitored(label.to_string()))
    }

    /// Appends the current value of every monitored pin to its trace.
    pub(crate) fn record(&mut self, state: &State) {
        let max_len = self.max_len;
        for trace in self.traces.values_mut() {
            trace.push(state.get_state(trace.output.idx), max_len);
        }
    }

    /// Drops every sample, the next one will belong to `first_cycle`.
    pub(crate) fn clear(&mut self, first_cycle: usize) {
        for trace in self.traces.values_mut() {
            trace.samples.clear();
            trace.first_cycle = first_cycle;
        }
    }

    pub(crate) fn snapshot(&self, state: &State, cycle: usize, passes: usize) -> Snapshot {
        let values = self
            .traces
            .iter()
            .map(|(label, trace)| (label.clone(), state.get_state(trace.output.idx)))
            .collect();
        Snapshot {
            cycle,
            passes,
            values,
        }
    }

    /// Returns the trace labeled `label`.
    pub fn get(&self, label: &str) -> Option<&Trace> {
        self.traces.get(label)
    }

    /// Returns an iterator over the traces in monitor order.
    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.values()
    }

    /// Returns the number of monitored pins.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Returns true if no pin is monitored.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Returns the width of the longest label, used to align rendered traces.
    pub fn margin(&self) -> usize {
        self.traces.keys().map(|label| label.len()).max().unwrap_or(0)
    }

    /// Returns every trace as `label : pattern` lines, see [Trace::pattern].
    ///
    /// # Example
    /// ```
    /// # use logsim::CircuitDescription;
    /// let mut c = CircuitDescription::new();
    /// c.clock("CLK", 2).switch("SW", true).monitor("CLK").monitor("SW");
    /// let network = c.build().unwrap();
    /// let mut sim = network.simulate(Default::default());
    /// sim.run_cycles(6).unwrap();
    ///
    /// assert_eq!(sim.monitors().display_signals(), "CLK : _--__-\nSW  : ------");
    /// ```
    pub fn display_signals(&self) -> String {
        let margin = self.margin();
        self.traces
            .values()
            .map(|trace| format!("{:<width$} : {}", trace.label, trace.pattern(), width = margin))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Prints every trace to stdout, high samples in green and low samples in red.
    pub fn print(&self) {
        let margin = self.margin();
        for trace in self.traces.values() {
            colour::blue!("{:<width$} : ", trace.label, width = margin);
            for value in trace.iter() {
                if value {
                    colour::green!("{}", HIGH);
                } else {
                    colour::red!("{}", LOW);
                }
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(values: &[bool]) -> State {
        let mut state = State::new(values.len());
        for (i, v) in values.iter().enumerate() {
            state.set(i, *v);
        }
        state
    }

    #[test]
    fn test_record_and_remove() {
        let mut monitors = Monitors::new(None);
        monitors.add("A".into(), OutputIndex::new(0), 1).unwrap();
        monitors.add("B.QBAR".into(), OutputIndex::new(1), 1).unwrap();

        monitors.record(&state(&[true, false]));
        monitors.record(&state(&[false, false]));
        monitors.record(&state(&[true, true]));

        assert_eq!(monitors.get("A").unwrap().pattern(), "-_-");
        assert_eq!(monitors.get("B.QBAR").unwrap().to_vec(), [false, false, true]);
        assert_eq!(monitors.get("A").unwrap().at_cycle(2), Some(false));
        assert_eq!(monitors.get("A").unwrap().at_cycle(0), None);
        assert_eq!(monitors.margin(), 6);

        let removed = monitors.remove("A").unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(monitors.len(), 1);
        assert_eq!(
            monitors.remove("A"),
            Err(SimError::NotMonitored("A".into()))
        );
    }

    #[test]
    fn test_duplicate_label() {
        let mut monitors = Monitors::new(None);
        monitors.add("A".into(), OutputIndex::new(0), 1).unwrap();
        assert!(matches!(
            monitors.add("A".into(), OutputIndex::new(0), 3),
            Err(SimError::InvalidMonitorTarget { .. })
        ));
    }

    #[test]
    fn test_bounded_traces_drop_oldest() {
        let mut monitors = Monitors::new(Some(2));
        monitors.add("A".into(), OutputIndex::new(0), 1).unwrap();
        for v in [true, false, false, true] {
            monitors.record(&state(&[v]));
        }

        let trace = monitors.get("A").unwrap();
        assert_eq!(trace.pattern(), "_-");
        assert_eq!(trace.first_cycle(), 3);
        assert_eq!(trace.at_cycle(4), Some(true));
        assert_eq!(trace.at_cycle(2), None);
    }

    #[test]
    fn test_bounded_trace_keeps_latest_samples() {
        let mut monitors = Monitors::new(Some(3));
        monitors.add("A".into(), OutputIndex::new(0), 1).unwrap();
        let values = [true, true, false, true, false, false, true, true, false];
        for v in values {
            monitors.record(&state(&[v]));
        }

        let trace = monitors.get("A").unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.to_vec(), values[6..]);
        assert_eq!(trace.first_cycle(), 7);
        assert_eq!(trace.at_cycle(9), Some(false));

        let mut empty = Monitors::new(Some(0));
        empty.add("A".into(), OutputIndex::new(0), 1).unwrap();
        empty.record(&state(&[true]));
        empty.record(&state(&[true]));
        let trace = empty.get("A").unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.first_cycle(), 3);
    }

    #[test]
    fn test_snapshot_and_clear() {
        let mut monitors = Monitors::new(None);
        monitors.add("X".into(), OutputIndex::new(1), 1).unwrap();
        monitors.add("Y".into(), OutputIndex::new(0), 1).unwrap();
        let s = state(&[false, true]);
        monitors.record(&s);

        let snapshot = monitors.snapshot(&s, 1, 3);
        assert_eq!(snapshot.get("X"), Some(true));
        assert_eq!(snapshot.get("Y"), Some(false));
        assert_eq!(snapshot.get("Z"), None);
        let labels: Vec<_> = snapshot.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, ["X", "Y"]);

        monitors.clear(1);
        assert!(monitors.get("X").unwrap().is_empty());
        assert_eq!(monitors.display_signals(), "X : \nY : ");
    }
}
