use num_integer::div_ceil;
use unwrap::unwrap;

/// Returns the index of the word containing bit `index` and the mask that selects it.
#[inline(always)]
fn word_mask_64(index: usize) -> (usize, u64) {
    (index / 64, 1u64 << (index % 64))
}

/// Data structure that represents a fixed size (at runtime) array of signal bits,
/// one per output pin of a network.
///
/// [State] keeps track of which bits changed value until the next call to [State::tick],
/// which is what lets a propagation pass know whether it reached a fixed point.
///
/// State will allocate bits in multiples of 64.
/// # Example
/// ```
/// # use logsim::data_structures::State;
/// let mut s = State::new(2);
///
/// assert_eq!(s.len(), 64);
///
/// assert_eq!(s.set(1, true), true);
/// assert_eq!(s.get_state(1), true);
/// assert_eq!(s.get_changed(1), true);
///
/// s.tick();
/// assert_eq!(s.set(1, true), false);
/// assert_eq!(s.get_changed(1), false);
/// ```
///
/// # Panics
///
/// Panics if you try to read or write to an index >= [State::len()]
///
/// ```should_panic
/// # use logsim::data_structures::State;
/// let s = State::new(2);
///
/// s.get_state(64);
/// ```
#[derive(Debug, Eq, PartialEq, Hash)]
pub struct State {
    states: Vec<u64>,
    changed: Vec<u64>,
}

impl Clone for State {
    fn clone(&self) -> Self {
        State {
            states: self.states.clone(),
            changed: self.changed.clone(),
        }
    }

    /// Reuses the allocations of `self`.
    fn clone_from(&mut self, source: &Self) {
        self.states.clone_from(&source.states);
        self.changed.clone_from(&source.changed);
    }
}
impl State {
    /// Returns a new [State] with `n` bits all of which are initialized to `false`.
    pub fn new(n: usize) -> State {
        let states = vec![0; div_ceil(n, 64)];
        let changed = vec![0; div_ceil(n, 64)];

        State { states, changed }
    }

    /// Returns true if the bit at `index` is 1 in vector `v`.
    #[inline(always)]
    fn get_bit_from_vec(v: &[u64], index: usize) -> bool {
        let (word_index, mask) = word_mask_64(index);
        let word = unwrap!(
            v.get(word_index),
            "Tried to access index out of bounds:{}, size:{}",
            index,
            v.len() * 64,
        );

        word & mask != 0
    }

    /// Returns true if the bit at `index` is set.
    ///
    /// # Panics
    ///
    /// Panics if `index` >= [State::len()]
    pub fn get_state(&self, index: usize) -> bool {
        Self::get_bit_from_vec(&self.states, index)
    }

    /// Returns true if the bit at `index` has changed value since the last call to [State::tick].
    ///
    /// # Panics
    ///
    /// Panics if `index` >= [State::len()]
    pub fn get_changed(&self, index: usize) -> bool {
        Self::get_bit_from_vec(&self.changed, index)
    }

    /// Sets the bit at `index` to `value`.
    /// Returns true and marks the bit as changed if `value` differs from the previous state.
    ///
    /// # Panics
    ///
    /// Panics if `index` >= [State::len()]
    pub fn set(&mut self, index: usize, value: bool) -> bool {
        if self.get_state(index) == value {
            return false;
        }
        let (word_index, mask) = word_mask_64(index);

        let state = &mut self.states[word_index];
        if value {
            *state |= mask;
        } else {
            *state &= !mask;
        }

        self.changed[word_index] |= mask;
        true
    }

    /// Returns true if any bit has changed since the last call to [State::tick].
    pub fn any_changed(&self) -> bool {
        self.changed.iter().any(|word| *word != 0)
    }

    /// Resets the changed flag of every bit to false.
    pub fn tick(&mut self) {
        for changed in &mut self.changed {
            *changed = 0
        }
    }

    /// Returns the number of bits in the [State].
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.states.len() * 64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        for i in 2..100 {
            let mut state = State::new(100);
            assert_eq!(state.get_state(i), false);
            assert_eq!(state.get_changed(i), false);

            assert!(state.set(i, true));

            assert_eq!(state.get_state(i), true);
            assert_eq!(state.get_changed(i), true);

            assert!(state.set(i, false));

            assert_eq!(state.get_state(i), false);
            assert_eq!(state.get_changed(i), true);
        }
    }

    #[test]
    fn test_set_same_value_is_not_a_change() {
        let mut state = State::new(10);

        assert!(!state.set(3, false));
        assert!(!state.get_changed(3));
        assert!(!state.any_changed());
    }

    #[test]
    fn test_tick() {
        let mut state = State::new(100);
        for i in 2..100 {
            state.set(i, true);
            assert!(state.any_changed(), "index: {}", i);

            state.tick();

            assert_eq!(state.get_state(i), true, "index: {}", i);
            assert_eq!(state.get_changed(i), false, "index: {}", i);
            assert!(!state.any_changed(), "index: {}", i);
        }
    }

    #[test]
    fn test_clone_from_keeps_allocation() {
        let mut source = State::new(200);
        source.set(5, true);
        source.set(130, true);

        let mut copy = State::new(200);
        let words = copy.states.as_ptr();
        copy.clone_from(&source);

        assert_eq!(copy, source);
        assert_eq!(copy.states.as_ptr(), words);
        assert!(copy.get_state(130));
        assert!(copy.get_changed(5));
    }

    #[test]
    fn test_len() {
        assert_eq!(State::new(2).len(), 64);
        assert_eq!(State::new(64).len(), 64);
        assert_eq!(State::new(65).len(), 128);
    }

    #[test]
    #[should_panic(expected = "Tried to access index out of bounds:64, size:64")]
    fn test_get_state_out_of_bounds_panics() {
        let state = State::new(1);
        state.get_state(64);
    }
}
