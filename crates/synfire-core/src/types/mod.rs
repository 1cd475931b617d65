pub mod identity;
pub mod signal;
pub mod synapse;

pub use identity::*;
pub use signal::*;
pub use synapse::*;
