mod descriptive;
mod distributions;

pub use descriptive::*;
pub use distributions::*;
