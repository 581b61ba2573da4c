pub mod commands;
pub mod order;
pub mod topics;

pub use commands::*;
pub use order::*;
pub use topics::*;
