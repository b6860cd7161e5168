use thiserror::Error;

/// The reason a tracking cycle did not grow the trajectory.
///
/// None of these are fatal. The [`Odometry`](crate::Odometry) engine absorbs every
/// one of them at the per-frame boundary and keeps the feedback loop running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("fewer than two frames are buffered")]
    InsufficientFrames,
    #[error("found {found} correspondences but {required} are required")]
    InsufficientMatches { found: usize, required: usize },
    #[error("descriptor matching could not run: {reason}")]
    MatchingFailed { reason: &'static str },
    #[error("relative pose recovery failed: {reason}")]
    PoseRecoveryFailed { reason: &'static str },
}

/// A fieldless discriminant of [`TrackingError`] for log lines and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InsufficientFrames,
    InsufficientMatches,
    MatchingFailed,
    PoseRecoveryFailed,
}

impl FailureKind {
    pub fn name(self) -> &'static str {
        match self {
            FailureKind::InsufficientFrames => "insufficient_frames",
            FailureKind::InsufficientMatches => "insufficient_matches",
            FailureKind::MatchingFailed => "matching_failed",
            FailureKind::PoseRecoveryFailed => "pose_recovery_failed",
        }
    }
}

impl TrackingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TrackingError::InsufficientFrames => FailureKind::InsufficientFrames,
            TrackingError::InsufficientMatches { .. } => FailureKind::InsufficientMatches,
            TrackingError::MatchingFailed { .. } => FailureKind::MatchingFailed,
            TrackingError::PoseRecoveryFailed { .. } => FailureKind::PoseRecoveryFailed,
        }
    }

    pub(crate) fn pose(reason: &'static str) -> Self {
        TrackingError::PoseRecoveryFailed { reason }
    }
}

/// A configuration value outside of its permitted range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("rescale factor must be in (0, 1], got {0}")]
    RescaleFactor(f64),
    #[error("matching ratio must be in (0, 1), got {0}")]
    MatchingRatio(f32),
    #[error("consensus confidence must be in (0, 1), got {0}")]
    ConsensusConfidence(f64),
    #[error("consensus threshold must be positive, got {0}")]
    ConsensusThreshold(f64),
    #[error("consensus must be allowed at least one iteration")]
    ConsensusIterations,
    #[error("focal length must be positive, got {0}")]
    FocalLength(f64),
    #[error("display resolution must be non-zero, got {0}x{1}")]
    DisplayResolution(u32, u32),
}
