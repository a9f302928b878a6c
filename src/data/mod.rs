//! # Raw demand data
//!
//! - `tensor` - the `(time, row, col, channel)` demand tensor
//! - `loader` - reading raw `.npy` arrays and stacking channels

mod loader;
mod tensor;

pub use loader::{load_array, load_demand, select_channels, stack_channels};
pub use tensor::DemandTensor;
