use crate::{
    annotate_matches, rescale_image, AkazeExtractor, EssentialPoseEstimator, FeatureExtractor,
    FeatureMatcher, FeatureSet, FrameDisplay, FrameWindow, HnswMatcher, MapSurface,
    OdometrySettings, PoseEstimator, RelativePose, SettingsError, TrackingError, TrajectoryState,
    WindowState, FRAME_LABEL, MAP_LABEL, MINIMUM_CORRESPONDENCES,
};
use image::{DynamicImage, RgbImage};
use log::*;

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Counts frames from 1.
    pub sequence: u64,
    /// The window state after the frame was buffered.
    pub state: WindowState,
    pub keypoints: usize,
    pub matches: usize,
    /// The pose that grew the trajectory, or why it did not grow.
    pub outcome: Result<RelativePose, TrackingError>,
}

impl CycleReport {
    pub fn tracked(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The frame-to-frame visual odometry engine.
///
/// Call [`Odometry::process_frame`] once per frame from a single thread. No failure
/// escapes it: a frame that cannot be tracked leaves the trajectory untouched and is
/// still displayed.
pub struct Odometry<X = AkazeExtractor, M = HnswMatcher, P = EssentialPoseEstimator> {
    settings: OdometrySettings,
    extractor: X,
    matcher: M,
    estimator: P,
    window: FrameWindow<FeatureSet>,
    trajectory: TrajectoryState,
    surface_created: bool,
    sequence: u64,
}

impl Odometry {
    /// AKAZE features, HNSW matching and five-point pose estimation configured by `settings`.
    pub fn with_settings(settings: OdometrySettings) -> Result<Self, SettingsError> {
        Self::new(
            settings,
            AkazeExtractor::new(settings.akaze_threshold),
            HnswMatcher::new(settings.hnsw_search_width),
            EssentialPoseEstimator::from_settings(&settings),
        )
    }
}

impl<X, M, P> Odometry<X, M, P>
where
    X: FeatureExtractor,
    M: FeatureMatcher,
    P: PoseEstimator,
{
    pub fn new(
        settings: OdometrySettings,
        extractor: X,
        matcher: M,
        estimator: P,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings,
            extractor,
            matcher,
            estimator,
            window: FrameWindow::new(),
            trajectory: TrajectoryState::new(),
            surface_created: false,
            sequence: 0,
        })
    }

    /// Runs one tracking cycle on `frame`.
    pub fn process_frame<D, S>(
        &mut self,
        frame: &DynamicImage,
        display: &mut D,
        map: &mut S,
    ) -> CycleReport
    where
        D: FrameDisplay + ?Sized,
        S: MapSurface + ?Sized,
    {
        self.sequence += 1;
        if !self.surface_created {
            let [width, height] = self.settings.display_resolution;
            info!("creating map surface {}x{}", width, height);
            map.create(MAP_LABEL, width, height);
            self.surface_created = true;
        }

        let rescale = self.settings.rescale_factor;
        let features = self.extractor.extract(frame, rescale);
        trace!("frame {} has {} keypoints", self.sequence, features.len());
        let mut shown = rescale_image(frame, rescale).to_rgb8();

        let keypoints = features.len();
        let previous = self.window.state();
        self.window.push(features);
        let state = self.window.state();
        if state != previous {
            debug!("window went from {:?} to {:?}", previous, state);
        }
        let mut report = CycleReport {
            sequence: self.sequence,
            state,
            keypoints,
            matches: 0,
            outcome: Err(TrackingError::InsufficientFrames),
        };

        report.outcome = self.track(&mut shown, &mut report);
        display.show(FRAME_LABEL, &shown);

        match &report.outcome {
            Ok(pose) => {
                self.trajectory.integrate(pose);
                map.rebuild(self.trajectory.points());
                let position = self.trajectory.position();
                info!(
                    "frame {} tracked with {} inliers, position [{:.3}, {:.3}, {:.3}]",
                    self.sequence, pose.inliers, position.x, position.y, position.z
                );
            }
            Err(e @ TrackingError::InsufficientFrames) => {
                debug!("frame {} skipped ({}): {}", self.sequence, e.kind().name(), e);
            }
            Err(e @ TrackingError::InsufficientMatches { .. }) => {
                info!("frame {} skipped ({}): {}", self.sequence, e.kind().name(), e);
            }
            Err(e) => {
                warn!("frame {} skipped ({}): {}", self.sequence, e.kind().name(), e);
            }
        }
        report
    }

    fn track(
        &mut self,
        shown: &mut RgbImage,
        report: &mut CycleReport,
    ) -> Result<RelativePose, TrackingError> {
        let (old, new) = self.window.pair().ok_or(TrackingError::InsufficientFrames)?;
        let matches = self.matcher.match_descriptors(
            old.descriptors(),
            new.descriptors(),
            self.settings.matching_ratio,
        )?;
        report.matches = matches.len();
        if matches.len() < MINIMUM_CORRESPONDENCES {
            return Err(TrackingError::InsufficientMatches {
                found: matches.len(),
                required: MINIMUM_CORRESPONDENCES,
            });
        }

        let (old_points, new_points): (Vec<_>, Vec<_>) = matches
            .iter()
            .map(|m| (old.keypoint(m.old), new.keypoint(m.new)))
            .unzip();
        annotate_matches(
            shown,
            old_points.iter().copied().zip(new_points.iter().copied()),
        );
        self.estimator.estimate(&old_points, &new_points)
    }

    /// Forgets that the map surface exists so the next frame creates it again.
    ///
    /// Hosts call this after closing surfaces on a stale feed.
    pub fn reset_surfaces(&mut self) {
        self.surface_created = false;
    }

    pub fn surface_created(&self) -> bool {
        self.surface_created
    }

    pub fn trajectory(&self) -> &TrajectoryState {
        &self.trajectory
    }

    pub fn state(&self) -> WindowState {
        self.window.state()
    }

    pub fn settings(&self) -> &OdometrySettings {
        &self.settings
    }
}
