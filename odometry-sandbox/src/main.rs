mod surfaces;
mod watchdog;

use cv_odometry::{relay_snapshot, Odometry, OdometrySettings, TrajectorySnapshot};
use log::*;
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};
use structopt::StructOpt;
use surfaces::{FrameDirectory, LogPlot};
use watchdog::StaleFeed;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "odometry-sandbox",
    about = "Replays image files through monocular visual odometry"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `cv_odometry::OdometrySettings`.
    #[structopt(short, long, default_value = "odometry-settings.json")]
    settings: PathBuf,
    /// The focal length in pixels, overriding the settings file
    #[structopt(long)]
    focal: Option<f64>,
    /// The x optical center coordinate, overriding the settings file
    #[structopt(long)]
    x_center: Option<f64>,
    /// The y optical center coordinate, overriding the settings file
    #[structopt(long)]
    y_center: Option<f64>,
    /// The factor frames are scaled by before extraction, overriding the settings file
    #[structopt(long)]
    rescale: Option<f64>,
    /// The matching ratio, overriding the settings file
    #[structopt(long)]
    ratio: Option<f32>,
    /// Seconds without a frame after which the surfaces are considered stale
    #[structopt(long, default_value = "2.0")]
    stale_timeout: f64,
    /// Directory to write annotated frames to
    #[structopt(short, long)]
    output: Option<PathBuf>,
    /// File to write the final trajectory to as JSON
    #[structopt(short, long)]
    trajectory: Option<PathBuf>,
    /// Show a trajectory JSON file computed elsewhere instead of replaying images
    #[structopt(long)]
    relay: Option<PathBuf>,
    /// List of image files
    #[structopt(parse(from_os_str))]
    images: Vec<PathBuf>,
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let mut settings: OdometrySettings = settings.unwrap_or_default();
    if let Some(focal) = opt.focal {
        settings.focal_length = focal;
    }
    if let Some(x) = opt.x_center {
        settings.principal_point[0] = x;
    }
    if let Some(y) = opt.y_center {
        settings.principal_point[1] = y;
    }
    if let Some(rescale) = opt.rescale {
        settings.rescale_factor = rescale;
    }
    if let Some(ratio) = opt.ratio {
        settings.matching_ratio = ratio;
    }

    let mut plot = LogPlot::default();

    if let Some(path) = &opt.relay {
        let snapshot: Option<TrajectorySnapshot> = std::fs::File::open(path)
            .ok()
            .and_then(|file| serde_json::from_reader(file).ok());
        match snapshot {
            Some(snapshot) => {
                info!("relaying {} trajectory points", snapshot.points.len());
                relay_snapshot(&mut plot, &snapshot);
            }
            None => error!("unable to read trajectory from {}", path.display()),
        }
        return;
    }

    let mut odometry = match Odometry::with_settings(settings) {
        Ok(odometry) => odometry,
        Err(e) => {
            error!("invalid settings: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(directory) = &opt.output {
        if let Err(e) = std::fs::create_dir_all(directory) {
            error!("unable to create {}: {}", directory.display(), e);
        }
    }
    let mut frames = FrameDirectory::new(opt.output.clone());
    let mut feed = StaleFeed::new(Duration::from_secs_f64(opt.stale_timeout.max(0.0)));

    let mut tracked = 0;
    for path in &opt.images {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if feed.is_stale(Instant::now()) {
            plot.close();
            odometry.reset_surfaces();
            feed.clear();
        }

        let report = odometry.process_frame(&image, &mut frames, &mut plot);
        feed.observe_frame(Instant::now());
        if report.tracked() {
            tracked += 1;
        }
    }

    info!(
        "tracked {} of {} frames, displayed {}, trajectory has {} points",
        tracked,
        opt.images.len(),
        frames.shown(),
        plot.points().len()
    );

    if let Some(path) = opt.trajectory {
        info!("saving the trajectory");
        match std::fs::File::create(&path) {
            Ok(file) => {
                if let Err(e) = serde_json::to_writer_pretty(file, &odometry.trajectory().snapshot())
                {
                    error!("unable to save trajectory: {}", e);
                }
            }
            Err(e) => error!("unable to create {}: {}", path.display(), e),
        }
    }
}
