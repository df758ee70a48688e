mod immutable;
mod state;
pub use immutable::*;
pub use state::*;
