pub mod enums;
pub mod signal;

pub use enums::*;
pub use signal::{Signal, TakeProfit};
