use cv_core::sample_consensus::{Consensus, Estimator, Model};
use rand::{seq::index::sample, RngCore};

/// Random sample consensus with an adaptive stopping criterion.
///
/// After every improvement the number of samples still needed is recomputed so that,
/// with probability `confidence`, at least one drawn sample was outlier free.
///
/// `arrsac::Arrsac` implements the same [`Consensus`] trait and can be dropped into
/// [`EssentialPoseEstimator`](crate::EssentialPoseEstimator) instead. This type exists
/// because ARRSAC has no confidence parameter, while pose recovery here is tuned to
/// an explicit confidence of 0.999.
#[derive(Debug, Clone)]
pub struct Ransac<R> {
    pub confidence: f64,
    pub threshold: f64,
    pub max_iterations: usize,
    rng: R,
}

impl<R> Ransac<R>
where
    R: RngCore,
{
    pub fn new(confidence: f64, threshold: f64, max_iterations: usize, rng: R) -> Self {
        Self {
            confidence,
            threshold,
            max_iterations,
            rng,
        }
    }

    fn inliers<M, Data>(&self, model: &M, data: &[Data]) -> Vec<usize>
    where
        M: Model<Data>,
    {
        data.iter()
            .enumerate()
            .filter(|(_, datum)| model.residual(datum) < self.threshold)
            .map(|(ix, _)| ix)
            .collect()
    }
}

/// The number of samples of size `sample_size` needed to draw an all-inlier sample
/// with probability `confidence`, given the observed `inlier_ratio`.
pub fn required_iterations(
    confidence: f64,
    inlier_ratio: f64,
    sample_size: usize,
    max_iterations: usize,
) -> usize {
    let all_inliers = inlier_ratio.powi(sample_size as i32);
    if all_inliers >= 1.0 {
        return 1;
    }
    let numerator = (1.0 - confidence).ln();
    let denominator = (1.0 - all_inliers).ln();
    if denominator >= 0.0 || !numerator.is_finite() {
        return max_iterations;
    }
    let iterations = (numerator / denominator).ceil();
    if iterations >= max_iterations as f64 {
        max_iterations
    } else {
        iterations.max(1.0) as usize
    }
}

impl<E, R, Data> Consensus<E, Data> for Ransac<R>
where
    E: Estimator<Data>,
    R: RngCore,
    Data: Clone,
{
    type Inliers = Vec<usize>;

    fn model<I>(&mut self, estimator: &E, data: I) -> Option<E::Model>
    where
        I: Iterator<Item = Data> + Clone,
    {
        self.model_inliers(estimator, data).map(|(model, _)| model)
    }

    fn model_inliers<I>(&mut self, estimator: &E, data: I) -> Option<(E::Model, Self::Inliers)>
    where
        I: Iterator<Item = Data> + Clone,
    {
        let data: Vec<Data> = data.collect();
        if data.len() < E::MIN_SAMPLES {
            return None;
        }

        let mut best: Option<(E::Model, Vec<usize>)> = None;
        let mut needed = self.max_iterations;
        let mut iteration = 0;
        while iteration < needed {
            iteration += 1;
            let samples: Vec<Data> = sample(&mut self.rng, data.len(), E::MIN_SAMPLES)
                .into_iter()
                .map(|ix| data[ix].clone())
                .collect();
            let models = estimator.estimate(samples.into_iter());
            for model in models {
                let inliers = self.inliers(&model, &data);
                let best_count = best.as_ref().map_or(0, |(_, inliers)| inliers.len());
                if inliers.len() > best_count {
                    let ratio = inliers.len() as f64 / data.len() as f64;
                    needed = required_iterations(
                        self.confidence,
                        ratio,
                        E::MIN_SAMPLES,
                        self.max_iterations,
                    );
                    best = Some((model, inliers));
                }
            }
        }

        // A model that only explains its own minimal sample is no consensus, unless
        // the minimal sample is all the data there is.
        let required = if data.len() == E::MIN_SAMPLES {
            E::MIN_SAMPLES
        } else {
            E::MIN_SAMPLES + 1
        };
        best.filter(|(_, inliers)| inliers.len() >= required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    /// A line through the origin `y = slope * x`.
    struct Slope(f64);

    impl Model<[f64; 2]> for Slope {
        fn residual(&self, &[x, y]: &[f64; 2]) -> f64 {
            (y - self.0 * x).abs()
        }
    }

    struct SlopeEstimator;

    impl Estimator<[f64; 2]> for SlopeEstimator {
        type Model = Slope;
        type ModelIter = Option<Slope>;
        const MIN_SAMPLES: usize = 1;

        fn estimate<I>(&self, mut data: I) -> Self::ModelIter
        where
            I: Iterator<Item = [f64; 2]> + Clone,
        {
            data.next()
                .filter(|&[x, _]| x.abs() > 1e-9)
                .map(|[x, y]| Slope(y / x))
        }
    }

    #[test]
    fn iteration_bound() {
        // All inliers means a single sample suffices.
        assert_eq!(required_iterations(0.999, 1.0, 5, 1000), 1);
        // No inliers can never terminate early.
        assert_eq!(required_iterations(0.999, 0.0, 5, 1000), 1000);
        // ln(0.001) / ln(1 - 0.5^5) = 217.6
        assert_eq!(required_iterations(0.999, 0.5, 5, 1000), 218);
        assert_eq!(required_iterations(0.999, 0.1, 5, 1000), 1000);
    }

    #[test]
    fn finds_line_among_outliers() {
        let mut data: Vec<[f64; 2]> = (1..=30).map(|x| [x as f64, 2.0 * x as f64]).collect();
        data.extend((1..=10).map(|x| [x as f64, -7.0 * x as f64 + 3.0]));
        let mut ransac = Ransac::new(0.999, 1e-6, 1000, Pcg64::from_seed([1; 32]));
        let (model, inliers) = ransac
            .model_inliers(&SlopeEstimator, data.iter().copied())
            .unwrap();
        assert!((model.0 - 2.0).abs() < 1e-9);
        assert_eq!(inliers, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn minimal_data_is_enough() {
        let mut ransac = Ransac::new(0.999, 1e-6, 1000, Pcg64::from_seed([1; 32]));
        let (model, inliers) = ransac
            .model_inliers(&SlopeEstimator, std::iter::once([2.0, 5.0]))
            .unwrap();
        assert!((model.0 - 2.5).abs() < 1e-9);
        assert_eq!(inliers, vec![0]);

        // With more data, a model explaining only its own sample is rejected.
        let scattered = [[1.0, 1.0], [1.0, 5.0], [1.0, -3.0]];
        assert!(ransac
            .model(&SlopeEstimator, scattered.iter().copied())
            .is_none());
    }

    #[test]
    fn too_little_data_gives_no_model() {
        let mut ransac = Ransac::new(0.999, 1e-6, 1000, Pcg64::from_seed([1; 32]));
        assert!(ransac
            .model(&SlopeEstimator, std::iter::empty::<[f64; 2]>())
            .is_none());
    }
}
