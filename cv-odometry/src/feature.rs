use akaze::Akaze;
use bitarray::BitArray;
use cv_core::nalgebra::Point2;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use log::*;

/// The binary AKAZE descriptor (486 bits packed into 64 bytes).
pub type Descriptor = BitArray<64>;

/// Keypoints paired by index with their descriptors.
///
/// There is always exactly one descriptor per keypoint. An empty set is valid
/// and is what a frame without any texture produces.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    keypoints: Vec<Point2<f64>>,
    descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Sub-pixel keypoint coordinates in the rescaled working image.
    pub fn keypoints(&self) -> &[Point2<f64>] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn keypoint(&self, ix: usize) -> Point2<f64> {
        self.keypoints[ix]
    }
}

impl FromIterator<(Point2<f64>, Descriptor)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (Point2<f64>, Descriptor)>>(iter: I) -> Self {
        let (keypoints, descriptors) = iter.into_iter().unzip();
        Self {
            keypoints,
            descriptors,
        }
    }
}

/// Converts a frame into a [`FeatureSet`].
///
/// Implementations must be deterministic for a fixed image and configuration.
pub trait FeatureExtractor {
    /// Extracts features from `image` after scaling it by `rescale` (0, 1].
    fn extract(&self, image: &DynamicImage, rescale: f64) -> FeatureSet;
}

/// Extracts AKAZE keypoints and binary descriptors from the intensity image.
#[derive(Debug, Copy, Clone)]
pub struct AkazeExtractor {
    pub akaze: Akaze,
}

impl AkazeExtractor {
    pub fn new(threshold: f64) -> Self {
        Self {
            akaze: Akaze::new(threshold),
        }
    }
}

impl Default for AkazeExtractor {
    fn default() -> Self {
        Self {
            akaze: Akaze::default(),
        }
    }
}

impl FeatureExtractor for AkazeExtractor {
    fn extract(&self, image: &DynamicImage, rescale: f64) -> FeatureSet {
        let (width, height) = working_size(image.dimensions(), rescale);
        trace!("extracting features at {}x{}", width, height);
        let gray = image.to_luma8();
        let gray = if (width, height) == gray.dimensions() {
            gray
        } else {
            image::imageops::resize(&gray, width, height, FilterType::Triangle)
        };
        let (keypoints, descriptors) = self.akaze.extract(&DynamicImage::ImageLuma8(gray));
        keypoints
            .into_iter()
            .map(|kp| Point2::new(kp.point.0 as f64, kp.point.1 as f64))
            .zip(descriptors)
            .collect()
    }
}

/// Scales the color frame by `rescale`, producing the working image that keypoint
/// coordinates refer to.
pub fn rescale_image(image: &DynamicImage, rescale: f64) -> DynamicImage {
    let (width, height) = working_size(image.dimensions(), rescale);
    if (width, height) == image.dimensions() {
        image.clone()
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    }
}

fn working_size((width, height): (u32, u32), rescale: f64) -> (u32, u32) {
    let scale = |n: u32| ((n as f64 * rescale).round() as u32).max(1);
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn textured_image(width: u32, height: u32) -> DynamicImage {
        let mut rng = Pcg64::from_seed([3; 32]);
        let mut image = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        for _ in 0..60 {
            let x = rng.gen_range(0..width as i32 - 8);
            let y = rng.gen_range(0..height as i32 - 8);
            let w = rng.gen_range(4..24);
            let h = rng.gen_range(4..24);
            let shade = rng.gen::<u8>();
            draw_filled_rect_mut(&mut image, Rect::at(x, y).of_size(w, h), Rgb([shade; 3]));
        }
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn working_size_rounds_and_never_collapses() {
        assert_eq!(working_size((640, 480), 0.5), (320, 240));
        assert_eq!(working_size((641, 481), 0.5), (321, 241));
        assert_eq!(working_size((3, 3), 0.01), (1, 1));
        assert_eq!(working_size((640, 480), 1.0), (640, 480));
    }

    #[test]
    fn rescale_keeps_color() {
        let image = textured_image(200, 100);
        let scaled = rescale_image(&image, 0.5);
        assert_eq!(scaled.dimensions(), (100, 50));
        assert_eq!(scaled.color(), image.color());
    }

    #[test]
    fn feature_set_pairs_by_index() {
        let set: FeatureSet = vec![
            (Point2::new(1.0, 2.0), BitArray::zeros()),
            (Point2::new(3.5, 4.25), BitArray::new([0xFF; 64])),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.descriptors().len(), 2);
        assert_eq!(set.keypoint(1), Point2::new(3.5, 4.25));
        assert!(FeatureSet::default().is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let image = textured_image(320, 240);
        let extractor = AkazeExtractor::default();
        let a = extractor.extract(&image, 0.5);
        let b = extractor.extract(&image, 0.5);
        assert_eq!(a.keypoints(), b.keypoints());
        assert_eq!(a.descriptors(), b.descriptors());
        assert_eq!(a.keypoints().len(), a.descriptors().len());
        for kp in a.keypoints() {
            assert!(kp.x >= 0.0 && kp.x < 160.0 && kp.y >= 0.0 && kp.y < 120.0);
        }
    }
}
