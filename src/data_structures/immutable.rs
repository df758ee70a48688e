use std::ops::Deref;

/// Read-only wrapper, the topology tables of a built network never change
/// so they are only handed out behind shared references.
#[repr(transparent)]
#[derive(Debug, Clone)]
pub struct Immutable<T>(T);
impl<T> Immutable<T> {
    pub fn new(i: T) -> Self {
        Self(i)
    }
    #[inline(always)]
    pub fn get(&self) -> &T {
        &self.0
    }
}

impl<T> Deref for Immutable<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Immutable<T> {
    fn from(i: T) -> Self {
        Self(i)
    }
}
