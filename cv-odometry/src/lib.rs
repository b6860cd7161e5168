//! Monocular visual odometry.
//!
//! Each frame is reduced to AKAZE features, matched against the previous frame,
//! and the relative camera motion recovered from the essential matrix is chained
//! into a trajectory. Monocular translation has no scale, so each step of the
//! trajectory is a unit direction, or zero when the camera did not move.

pub use cv_core::nalgebra;

mod consensus;
mod display;
mod error;
mod feature;
mod matching;
mod pipeline;
mod pose;
mod settings;
mod trajectory;
mod window;

pub use consensus::*;
pub use display::*;
pub use error::*;
pub use feature::*;
pub use matching::*;
pub use pipeline::*;
pub use pose::*;
pub use settings::*;
pub use trajectory::*;
pub use window::*;
