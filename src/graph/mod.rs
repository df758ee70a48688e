#[macro_use]
mod handles;
mod cycles;
mod description;
mod device;
mod network;
mod network_builder;
pub use description::*;
pub use device::*;
pub use handles::*;
pub use network::*;
