use cv_odometry::{nalgebra::Point3, FrameDisplay, MapSurface};
use image::RgbImage;
use log::*;
use std::path::PathBuf;

/// Writes every displayed frame into a directory as a numbered PNG.
///
/// Without a directory, frames are only counted.
pub struct FrameDirectory {
    directory: Option<PathBuf>,
    shown: usize,
}

impl FrameDirectory {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory,
            shown: 0,
        }
    }

    pub fn shown(&self) -> usize {
        self.shown
    }
}

impl FrameDisplay for FrameDirectory {
    fn show(&mut self, label: &str, image: &RgbImage) {
        self.shown += 1;
        if let Some(directory) = &self.directory {
            let path = directory.join(format!(
                "{}-{:05}.png",
                label.to_lowercase().replace(' ', "-"),
                self.shown
            ));
            if let Err(e) = image.save(&path) {
                error!("unable to write frame to {}: {}", path.display(), e);
            }
        }
    }
}

/// A map surface that only reports what it would draw.
#[derive(Default)]
pub struct LogPlot {
    open: Option<String>,
    points: Vec<Point3<f64>>,
}

impl LogPlot {
    pub fn close(&mut self) {
        if let Some(label) = self.open.take() {
            info!("closing stale surface \"{}\"", label);
        }
        self.points.clear();
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

impl MapSurface for LogPlot {
    fn create(&mut self, label: &str, width: u32, height: u32) {
        info!("opening surface \"{}\" at {}x{}", label, width, height);
        self.open = Some(label.to_owned());
    }

    fn clear(&mut self) {
        self.points.clear();
    }

    fn add_points(&mut self, points: &[Point3<f64>]) {
        self.points.extend_from_slice(points);
    }

    fn redraw(&mut self) {
        match self.points.last() {
            Some(p) => debug!(
                "plotting {} points, latest [{:.3}, {:.3}, {:.3}]",
                self.points.len(),
                p.x,
                p.y,
                p.z
            ),
            None => debug!("plotting an empty trajectory"),
        }
    }
}
