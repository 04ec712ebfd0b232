//! Transfer pipeline: statistical distances, critic objectives, the gradient
//! penalty, loss history and the alternating optimization loop.

pub mod distance;
pub mod loss;
pub mod metrics;
pub mod penalty;
pub mod steps;
pub mod trainer;
