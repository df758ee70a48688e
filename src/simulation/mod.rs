mod engine;
mod monitors;
pub use engine::*;
pub use monitors::*;
