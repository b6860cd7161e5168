use crate::RelativePose;
use cv_core::nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};
use log::*;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The cumulative pose of the camera and the positions it has passed through.
///
/// Only grows by [`TrajectoryState::integrate`]. Points are never removed or reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryState {
    rotation: Rotation3<f64>,
    position: Vector3<f64>,
    points: Vec<Point3<f64>>,
}

impl Default for TrajectoryState {
    fn default() -> Self {
        Self {
            rotation: Rotation3::identity(),
            position: Vector3::zeros(),
            points: Vec::new(),
        }
    }
}

impl TrajectoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated rotation `Rpos`.
    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }

    /// The accumulated translation `Tpos`.
    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Chains a relative pose onto the trajectory and appends the new position.
    ///
    /// The translation is rotated into the accumulated frame before it is added,
    /// then the relative rotation is composed in front of the accumulated one.
    pub fn integrate(&mut self, pose: &RelativePose) {
        self.position += self.rotation * pose.translation;
        self.rotation = orthonormalize(pose.rotation * self.rotation);
        self.points.push(Point3::from(self.position));
        trace!(
            "trajectory point {} at [{:.3}, {:.3}, {:.3}]",
            self.points.len(),
            self.position.x,
            self.position.y,
            self.position.z
        );
    }

    /// A copy of the trajectory suitable for relaying or serializing.
    pub fn snapshot(&self) -> TrajectorySnapshot {
        TrajectorySnapshot {
            rotation: self.rotation.into_inner().into(),
            position: self.position.into(),
            points: self.points.iter().map(|p| [p.x, p.y, p.z]).collect(),
        }
    }
}

/// Removes the drift that repeated products introduce into a rotation matrix.
fn orthonormalize(rotation: Rotation3<f64>) -> Rotation3<f64> {
    UnitQuaternion::from_rotation_matrix(&rotation).to_rotation_matrix()
}

/// A plain data copy of a trajectory, such as one computed on another host.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrajectorySnapshot {
    /// The accumulated rotation, column major.
    pub rotation: [[f64; 3]; 3],
    pub position: [f64; 3],
    pub points: Vec<[f64; 3]>,
}

impl TrajectorySnapshot {
    pub fn points(&self) -> Vec<Point3<f64>> {
        self.points.iter().map(|&p| Point3::from(p)).collect()
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.rotation.into()
    }
}
