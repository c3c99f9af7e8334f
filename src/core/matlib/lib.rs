mod linalg;
mod mwc256;

pub use linalg::*;
pub use mwc256::*;
