use arrsac::Arrsac;
use cv_core::nalgebra::{IsometryMatrix3, Point2, Point3, Rotation3, Vector2, Vector3};
use cv_odometry::{EssentialPoseEstimator, PoseEstimator, Ransac};
use cv_pinhole::CameraIntrinsics;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

const FOCAL: f64 = 300.0;

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focals(Vector2::new(FOCAL, FOCAL))
        .principal_point(Point2::new(160.0, 120.0))
}

fn project(point: Point3<f64>) -> Point2<f64> {
    Point2::new(
        FOCAL * point.x / point.z + 160.0,
        FOCAL * point.y / point.z + 120.0,
    )
}

/// Forward motion with a slight turn, a fifth of the matches replaced by noise.
fn matches() -> (IsometryMatrix3<f64>, Vec<Point2<f64>>, Vec<Point2<f64>>) {
    let motion = IsometryMatrix3::from_parts(
        Vector3::new(0.05, 0.0, -0.5).into(),
        Rotation3::from_euler_angles(0.0, 0.04, 0.0),
    );
    let mut rng = Pcg64::from_seed([7; 32]);
    let (old, mut new): (Vec<_>, Vec<_>) = (0..150)
        .map(|_| {
            let point = Point3::new(
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(5.0..12.0),
            );
            (project(point), project(motion * point))
        })
        .unzip();
    for point in new.iter_mut().step_by(5) {
        *point = Point2::new(rng.gen_range(0.0..320.0), rng.gen_range(0.0..240.0));
    }
    (motion, old, new)
}

#[test]
fn ransac_agrees_with_arrsac() {
    let (motion, old, new) = matches();

    let mut ransac = EssentialPoseEstimator::new(
        intrinsics(),
        Ransac::new(0.999, 1.0, 2000, Pcg64::from_seed([5; 32])),
        0.5,
    );
    let mut arrsac = EssentialPoseEstimator::new(
        intrinsics(),
        Arrsac::new(1.0, Pcg64::from_seed([5; 32])),
        0.5,
    );
    let a = ransac.estimate(&old, &new).unwrap();
    let b = arrsac.estimate(&old, &new).unwrap();

    let expected = motion.translation.vector.normalize();
    for pose in [a, b] {
        assert!(pose.rotation.rotation_to(&motion.rotation).angle() < 1e-3);
        assert!(pose.translation.dot(&expected) > 0.999);
    }
    assert!(a.rotation.rotation_to(&b.rotation).angle() < 1e-3);
    assert!(a.inliers >= 110);
}
