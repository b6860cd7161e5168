//! The rendering surfaces the engine pushes its results to.

use crate::TrajectorySnapshot;
use cv_core::nalgebra::{Point2, Point3};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

/// The label of the surface showing the current annotated frame.
pub const FRAME_LABEL: &str = "Frame";
/// The label of the surface showing the trajectory.
pub const MAP_LABEL: &str = "3D plot";

const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Shows the current working frame.
pub trait FrameDisplay {
    fn show(&mut self, label: &str, image: &RgbImage);
}

/// A 3D view of the trajectory.
pub trait MapSurface {
    /// Creates the surface. Called again after the host closed a stale surface.
    fn create(&mut self, label: &str, width: u32, height: u32);

    /// Removes all displayed geometry.
    fn clear(&mut self);

    fn add_points(&mut self, points: &[Point3<f64>]);

    fn redraw(&mut self);

    /// Replaces everything displayed with `points`.
    ///
    /// The surface is always repopulated from scratch so it matches the trajectory exactly.
    fn rebuild(&mut self, points: &[Point3<f64>]) {
        self.clear();
        self.add_points(points);
        self.redraw();
    }
}

/// Draws a line from each old keypoint to its matched new keypoint.
pub fn annotate_matches(
    image: &mut RgbImage,
    pairs: impl IntoIterator<Item = (Point2<f64>, Point2<f64>)>,
) {
    for (old, new) in pairs {
        draw_line_segment_mut(
            image,
            (old.x as f32, old.y as f32),
            (new.x as f32, new.y as f32),
            MATCH_COLOR,
        );
    }
}

/// Shows a trajectory computed elsewhere without touching the local one.
pub fn relay_snapshot<S: MapSurface + ?Sized>(map: &mut S, snapshot: &TrajectorySnapshot) {
    map.rebuild(&snapshot.points());
}
