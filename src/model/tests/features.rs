use approx::assert_abs_diff_eq;
use ndarray::Array4;

use crate::model::{FeatureExtractor, PatchPoolExtractor};

#[test]
fn test_patch_pool_shapes_and_statistics() {
    let extractor = PatchPoolExtractor::new(2);
    assert_eq!(extractor.num_regions(), 4);
    assert_eq!(extractor.feature_dim(), 6);

    // 第0张图：左上区域为 1，其余为 0；第1张图全为 -1
    let mut images = Array4::<f32>::zeros((2, 4, 4, 3));
    for y in 0..2 {
        for x in 0..2 {
            for c in 0..3 {
                images[[0, y, x, c]] = 1.0;
            }
        }
    }
    images.slice_mut(ndarray::s![1, .., .., ..]).fill(-1.0);

    let features = extractor.extract(&images);
    assert_eq!(features.shape(), &[8, 6]);
    assert_eq!(features.row(0), vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert_eq!(features.row(1), vec![0.0; 6]);
    for r in 4..8 {
        for c in 0..3 {
            assert_abs_diff_eq!(features[[r, c]], -1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(features[[r, 3 + c]], 0.0, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_patch_pool_std_within_region() {
    let extractor = PatchPoolExtractor::new(1);
    let mut images = Array4::<f32>::zeros((1, 2, 1, 3));
    images[[0, 0, 0, 0]] = 1.0;
    images[[0, 1, 0, 0]] = -1.0;
    let features = extractor.extract(&images);
    assert_abs_diff_eq!(features[[0, 0]], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(features[[0, 3]], 1.0, epsilon = 1e-6);
}

#[test]
fn test_grid_larger_than_image_still_covers_pixels() {
    let extractor = PatchPoolExtractor::new(3);
    let images = Array4::<f32>::from_elem((1, 2, 2, 3), 0.5);
    let features = extractor.extract(&images);
    assert_eq!(features.shape(), &[9, 6]);
    for r in 0..9 {
        assert_abs_diff_eq!(features[[r, 0]], 0.5, epsilon = 1e-6);
    }
}
