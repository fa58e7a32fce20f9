pub mod predict;

pub use predict::{PredictReadmissionCommand, PredictReadmissionResponse};
