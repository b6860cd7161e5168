use crate::{consensus::Ransac, OdometrySettings, TrackingError, MINIMUM_CORRESPONDENCES};
use cv_core::{
    nalgebra::{Point2, Rotation3, UnitVector3, Vector2, Vector3},
    sample_consensus::{Consensus, Estimator, Model},
    CameraToCamera, FeatureMatch, Pose,
};
use cv_pinhole::{CameraIntrinsics, EssentialMatrix};
use float_ord::FloatOrd;
use log::*;
use nister_stewenius::NisterStewenius;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// The motion of the camera between the old and the new frame.
///
/// A point `x_old` in the old camera's frame appears at `rotation * x_old + translation`
/// in the new camera's frame. The translation is a direction only: it has unit norm,
/// or is zero when the frames show no measurable motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativePose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// The number of correspondences consistent with this pose.
    pub inliers: usize,
}

impl RelativePose {
    /// No rotation and no translation.
    pub fn stationary(inliers: usize) -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
            inliers,
        }
    }
}

/// Derives the relative camera motion from matched keypoints.
pub trait PoseEstimator {
    /// `old[i]` and `new[i]` are pixel coordinates of the same feature in the
    /// old and new working images.
    ///
    /// Returns [`TrackingError::InsufficientMatches`] without doing any work when
    /// fewer than [`MINIMUM_CORRESPONDENCES`] pairs are given.
    fn estimate(
        &mut self,
        old: &[Point2<f64>],
        new: &[Point2<f64>],
    ) -> Result<RelativePose, TrackingError>;
}

/// An essential matrix hypothesis scored by its Sampson error in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpipolarModel {
    pub essential: EssentialMatrix,
    /// Converts normalized image distances back to pixels.
    pub focal: f64,
}

impl Model<FeatureMatch> for EpipolarModel {
    fn residual(&self, data: &FeatureMatch) -> f64 {
        let EssentialMatrix(e) = self.essential;
        let &FeatureMatch(a, b) = data;
        let a = a.into_inner() / a.z;
        let b = b.into_inner() / b.z;
        let ea = e * a;
        let etb = e.transpose() * b;
        let denominator = ea.x * ea.x + ea.y * ea.y + etb.x * etb.x + etb.y * etb.y;
        if !(denominator > f64::EPSILON) {
            return f64::INFINITY;
        }
        self.focal * b.dot(&ea).abs() / denominator.sqrt()
    }
}

/// The minimal five-point essential matrix solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FivePoint {
    pub focal: f64,
}

impl FivePoint {
    pub fn new(focal: f64) -> Self {
        Self { focal }
    }
}

impl Estimator<FeatureMatch> for FivePoint {
    type Model = EpipolarModel;
    type ModelIter = Vec<EpipolarModel>;
    const MIN_SAMPLES: usize = 5;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = FeatureMatch> + Clone,
    {
        // The solver decomposes every essential matrix root into its four poses,
        // all of which share the root's essential matrix.
        NisterStewenius::new()
            .estimate(data)
            .into_iter()
            .step_by(4)
            .map(|pose| EpipolarModel {
                essential: EssentialMatrix::from(pose),
                focal: self.focal,
            })
            .collect()
    }
}

/// Robust essential matrix estimation followed by a cheirality-checked decomposition.
#[derive(Debug, Clone)]
pub struct EssentialPoseEstimator<C = Ransac<Pcg64>> {
    pub intrinsics: CameraIntrinsics,
    pub five_point: FivePoint,
    pub consensus: C,
    /// Median keypoint displacement in pixels below which the pair is taken as motionless.
    pub stationary_parallax: f64,
}

impl EssentialPoseEstimator {
    pub fn from_settings(settings: &OdometrySettings) -> Self {
        let intrinsics = settings.working_intrinsics();
        let consensus = Ransac::new(
            settings.consensus_confidence,
            settings.consensus_threshold,
            settings.consensus_max_iterations,
            Pcg64::seed_from_u64(settings.consensus_seed),
        );
        Self::new(intrinsics, consensus, settings.stationary_parallax)
    }
}

impl<C> EssentialPoseEstimator<C> {
    pub fn new(intrinsics: CameraIntrinsics, consensus: C, stationary_parallax: f64) -> Self {
        let focal = (intrinsics.focals.x + intrinsics.focals.y) / 2.0;
        Self {
            intrinsics,
            five_point: FivePoint::new(focal),
            consensus,
            stationary_parallax,
        }
    }

    fn bearing(&self, point: Point2<f64>) -> UnitVector3<f64> {
        let CameraIntrinsics {
            focals,
            principal_point,
            ..
        } = self.intrinsics;
        UnitVector3::new_normalize(Vector3::new(
            (point.x - principal_point.x) / focals.x,
            (point.y - principal_point.y) / focals.y,
            1.0,
        ))
    }
}

impl<C> PoseEstimator for EssentialPoseEstimator<C>
where
    C: Consensus<FivePoint, FeatureMatch>,
{
    fn estimate(
        &mut self,
        old: &[Point2<f64>],
        new: &[Point2<f64>],
    ) -> Result<RelativePose, TrackingError> {
        let found = old.len().min(new.len());
        if found < MINIMUM_CORRESPONDENCES {
            return Err(TrackingError::InsufficientMatches {
                found,
                required: MINIMUM_CORRESPONDENCES,
            });
        }
        let pairs = || old.iter().zip(new).take(found);
        let finite = |p: &Point2<f64>| p.x.is_finite() && p.y.is_finite();
        if !pairs().all(|(a, b)| finite(a) && finite(b)) {
            return Err(TrackingError::pose("non-finite keypoint coordinates"));
        }

        let mut parallax: Vec<f64> = pairs().map(|(a, b)| (b - a).norm()).collect();
        let median = *parallax
            .select_nth_unstable_by_key(found / 2, |&d| FloatOrd(d))
            .1;
        if median < self.stationary_parallax {
            debug!("median parallax {:.3}px, treating pair as stationary", median);
            return Ok(RelativePose::stationary(found));
        }

        if is_colinear(old.iter().take(found)) || is_colinear(new.iter().take(found)) {
            return Err(TrackingError::pose("keypoints are colinear"));
        }

        let matches: Vec<FeatureMatch> = pairs()
            .map(|(&a, &b)| FeatureMatch(self.bearing(a), self.bearing(b)))
            .collect();
        let (model, inliers) = self
            .consensus
            .model_inliers(&self.five_point, matches.iter().copied())
            .ok_or_else(|| TrackingError::pose("no essential matrix reached consensus"))?;
        let inliers: Vec<usize> = inliers.into_iter().collect();
        if is_colinear(inliers.iter().map(move |&ix| &old[ix]))
            || is_colinear(inliers.iter().map(move |&ix| &new[ix]))
        {
            return Err(TrackingError::pose("consensus inliers are colinear"));
        }
        let inliers: Vec<FeatureMatch> = inliers.into_iter().map(|ix| matches[ix]).collect();
        trace!("essential matrix has {} of {} inliers", inliers.len(), found);

        let poses = model
            .essential
            .possible_unscaled_poses(1e-6, 50)
            .ok_or_else(|| TrackingError::pose("essential matrix decomposition failed"))?;
        let (pose, in_front) = poses
            .iter()
            .map(|&pose| (pose, points_in_front(pose, &inliers)))
            .max_by_key(|&(_, count)| count)
            .ok_or_else(|| TrackingError::pose("no candidate poses"))?;
        if in_front == 0 {
            return Err(TrackingError::pose(
                "no candidate pose places points in front of both cameras",
            ));
        }

        let isometry = pose.isometry();
        let translation = isometry.translation.vector;
        let norm = translation.norm();
        if !(norm.is_finite() && norm > f64::EPSILON) {
            return Err(TrackingError::pose("degenerate translation"));
        }
        Ok(RelativePose {
            rotation: isometry.rotation,
            translation: translation / norm,
            inliers: in_front,
        })
    }
}

/// The smallest ratio of the minor to the major axis of a point spread that still
/// constrains an essential matrix.
const COLINEAR_RATIO: f64 = 1e-4;

/// True when the points lie on a common line, or all coincide.
///
/// Compares the eigenvalues of the 2x2 covariance of the points.
fn is_colinear<'a>(points: impl Iterator<Item = &'a Point2<f64>> + Clone) -> bool {
    let count = points.clone().count();
    if count == 0 {
        return true;
    }
    let mean = points.clone().fold(Vector2::zeros(), |sum, p| sum + p.coords) / count as f64;
    let (xx, xy, yy) = points.fold((0.0, 0.0, 0.0), |(xx, xy, yy), p| {
        let d = p.coords - mean;
        (xx + d.x * d.x, xy + d.x * d.y, yy + d.y * d.y)
    });
    let half_trace = (xx + yy) / 2.0;
    let spread = (((xx - yy) / 2.0).powi(2) + xy * xy).sqrt();
    let major = half_trace + spread;
    let minor = half_trace - spread;
    !(major > f64::EPSILON) || minor / major < COLINEAR_RATIO
}

/// Counts the matches that triangulate with positive depth in both cameras.
fn points_in_front(pose: CameraToCamera, matches: &[FeatureMatch]) -> usize {
    let isometry = pose.isometry();
    let t = isometry.translation.vector;
    matches
        .iter()
        .filter(|FeatureMatch(a, b)| {
            // Solve `d_new * b = d_old * R * a + t` for both depths in the least squares sense.
            let ra = isometry.rotation * a.into_inner();
            let b = b.into_inner();
            let c = ra.dot(&b);
            let det = 1.0 - c * c;
            if det < 1e-12 {
                return false;
            }
            let p = -ra.dot(&t);
            let q = b.dot(&t);
            let depth_old = (p + c * q) / det;
            let depth_new = (c * p + q) / det;
            depth_old > 0.0 && depth_new > 0.0
        })
        .count()
}
