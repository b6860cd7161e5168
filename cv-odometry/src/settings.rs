use crate::SettingsError;
use cv_core::nalgebra::{Point2, Vector2};
use cv_pinhole::CameraIntrinsics;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The number of correspondences below which pose estimation is never attempted.
///
/// This is the sample size of the five-point solver and is not configurable.
pub const MINIMUM_CORRESPONDENCES: usize = 5;

/// The settings for the odometry process.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OdometrySettings {
    /// The factor frames are scaled by before feature extraction (0, 1]
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_rescale_factor")
    )]
    pub rescale_factor: f64,
    /// The nearest neighbor must be closer than this fraction of the second nearest neighbor
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_matching_ratio")
    )]
    pub matching_ratio: f32,
    /// The threshold used for akaze
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_akaze_threshold")
    )]
    pub akaze_threshold: f64,
    /// The candidate list size used when searching the HNSW index
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_hnsw_search_width")
    )]
    pub hnsw_search_width: usize,
    /// The focal length in pixels at capture resolution
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_focal_length"))]
    pub focal_length: f64,
    /// The principal point in pixels at capture resolution
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_principal_point")
    )]
    pub principal_point: [f64; 2],
    /// The probability that consensus finds an outlier-free sample
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_confidence")
    )]
    pub consensus_confidence: f64,
    /// The epipolar error in pixels of the rescaled image below which a match is an inlier
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_threshold")
    )]
    pub consensus_threshold: f64,
    /// The maximum number of consensus samples drawn per frame pair
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_max_iterations")
    )]
    pub consensus_max_iterations: usize,
    /// The seed for the consensus random number generator
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_seed")
    )]
    pub consensus_seed: u64,
    /// The median keypoint displacement in pixels below which a frame pair is considered motionless
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_stationary_parallax")
    )]
    pub stationary_parallax: f64,
    /// The width and height of the rendering surfaces
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_display_resolution")
    )]
    pub display_resolution: [u32; 2],
}

impl Default for OdometrySettings {
    fn default() -> Self {
        Self {
            rescale_factor: default_rescale_factor(),
            matching_ratio: default_matching_ratio(),
            akaze_threshold: default_akaze_threshold(),
            hnsw_search_width: default_hnsw_search_width(),
            focal_length: default_focal_length(),
            principal_point: default_principal_point(),
            consensus_confidence: default_consensus_confidence(),
            consensus_threshold: default_consensus_threshold(),
            consensus_max_iterations: default_consensus_max_iterations(),
            consensus_seed: default_consensus_seed(),
            stationary_parallax: default_stationary_parallax(),
            display_resolution: default_display_resolution(),
        }
    }
}

impl OdometrySettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.rescale_factor > 0.0 && self.rescale_factor <= 1.0) {
            return Err(SettingsError::RescaleFactor(self.rescale_factor));
        }
        if !(self.matching_ratio > 0.0 && self.matching_ratio < 1.0) {
            return Err(SettingsError::MatchingRatio(self.matching_ratio));
        }
        if !(self.consensus_confidence > 0.0 && self.consensus_confidence < 1.0) {
            return Err(SettingsError::ConsensusConfidence(
                self.consensus_confidence,
            ));
        }
        if !(self.consensus_threshold > 0.0) {
            return Err(SettingsError::ConsensusThreshold(self.consensus_threshold));
        }
        if self.consensus_max_iterations == 0 {
            return Err(SettingsError::ConsensusIterations);
        }
        if !(self.focal_length > 0.0) {
            return Err(SettingsError::FocalLength(self.focal_length));
        }
        let [width, height] = self.display_resolution;
        if width == 0 || height == 0 {
            return Err(SettingsError::DisplayResolution(width, height));
        }
        Ok(())
    }

    /// The pinhole intrinsics of the rescaled working image.
    ///
    /// Keypoints are detected after rescaling, so the capture-resolution focal length
    /// and principal point are scaled by the same factor.
    pub fn working_intrinsics(&self) -> CameraIntrinsics {
        let [cx, cy] = self.principal_point;
        let scale = self.rescale_factor;
        CameraIntrinsics::identity()
            .focals(Vector2::new(self.focal_length, self.focal_length) * scale)
            .principal_point(Point2::new(cx * scale, cy * scale))
    }
}

fn default_rescale_factor() -> f64 {
    0.5
}

fn default_matching_ratio() -> f32 {
    0.7
}

fn default_akaze_threshold() -> f64 {
    0.001
}

fn default_hnsw_search_width() -> usize {
    24
}

fn default_focal_length() -> f64 {
    525.0
}

fn default_principal_point() -> [f64; 2] {
    [320.0, 240.0]
}

fn default_consensus_confidence() -> f64 {
    0.999
}

fn default_consensus_threshold() -> f64 {
    1.0
}

fn default_consensus_max_iterations() -> usize {
    1000
}

fn default_consensus_seed() -> u64 {
    5
}

fn default_stationary_parallax() -> f64 {
    0.5
}

fn default_display_resolution() -> [u32; 2] {
    [640, 480]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(OdometrySettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let settings = OdometrySettings {
            rescale_factor: 1.5,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::RescaleFactor(1.5)));

        let settings = OdometrySettings {
            matching_ratio: 1.0,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::MatchingRatio(1.0)));

        let settings = OdometrySettings {
            display_resolution: [640, 0],
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::DisplayResolution(640, 0))
        );
    }

    #[test]
    fn intrinsics_follow_rescale() {
        let settings = OdometrySettings {
            rescale_factor: 0.25,
            focal_length: 800.0,
            principal_point: [400.0, 300.0],
            ..Default::default()
        };
        let intrinsics = settings.working_intrinsics();
        assert_eq!(intrinsics.focals, Vector2::new(200.0, 200.0));
        assert_eq!(intrinsics.principal_point, Point2::new(100.0, 75.0));
        assert_eq!(intrinsics.skew, 0.0);
    }

    #[cfg(feature = "serde-serialize")]
    #[test]
    fn missing_fields_take_defaults() {
        let settings: OdometrySettings =
            serde_json::from_str(r#"{ "rescale_factor": 0.25 }"#).unwrap();
        assert_eq!(settings.rescale_factor, 0.25);
        assert_eq!(settings.consensus_confidence, 0.999);
        assert_eq!(settings.display_resolution, [640, 480]);
    }
}
