use std::fmt::{self, Display, Formatter};

/// Represents the index of a device in a [Network](super::Network), devices are numbered
/// in declaration order.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct DeviceIndex {
    pub(crate) idx: usize,
}

/// Represents the index of an output pin in a [Network](super::Network).
///
/// Every output pin owns exactly one bit of simulation state, so an [OutputIndex]
/// doubles as the address of that signal.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
pub struct OutputIndex {
    pub(crate) idx: usize,
}

/// Returns a new DeviceIndex from a provided usize.
macro_rules! di {
    ( $x:expr ) => {{
        DeviceIndex::new($x)
    }};
}

/// Returns a new OutputIndex from a provided usize.
macro_rules! oi {
    ( $x:expr ) => {{
        OutputIndex::new($x)
    }};
}

impl DeviceIndex {
    pub(crate) const fn new(idx: usize) -> DeviceIndex {
        DeviceIndex { idx }
    }
}

impl OutputIndex {
    pub(crate) const fn new(idx: usize) -> OutputIndex {
        OutputIndex { idx }
    }

    /// Returns the output `offset` pins after `self`, QBAR sits right after Q.
    pub(crate) const fn offset(self, offset: usize) -> OutputIndex {
        OutputIndex {
            idx: self.idx + offset,
        }
    }
}

impl Display for DeviceIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.idx)
    }
}
impl Display for OutputIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.idx)
    }
}
