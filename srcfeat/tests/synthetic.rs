//! End-to-end checks of the extraction pipeline on synthetic cubes

use approx::assert_relative_eq;
use ndarray::{Array2, Array3, Axis};

use shared::image_proc::noise::simple_normal_array;
use shared::image_proc::test_patterns::{gaussian_cube, gaussian_spot, stack_channels};
use srcfeat::color_index::{compute_color_index, ColorIndexStats};
use srcfeat::config::{ColorIndexOptions, DetectionOptions, OutputOptions};
use srcfeat::detection::SourceDetector;
use srcfeat::geometry::compute_geometry;
use srcfeat::moments::{MomentComputer, MomentSet, ReferenceAnchor};
use srcfeat::similarity::{compute_similarity, SummaryStats};
use srcfeat::{
    ClassId, ExtractionError, ExtractorConfig, FeatureExtractor, FeatureExtractorHelper,
    ImageCube, SourceInfo,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn info(name: &str) -> SourceInfo {
    SourceInfo::new(name, "TEST", ClassId::Single(1))
}

fn noisy_spot(size: usize, center: (f64, f64), sigma: f64, amplitude: f64, seed: u64) -> Array2<f64> {
    let noise = simple_normal_array((size, size), 0.0, 1.0, seed).unwrap();
    gaussian_spot((size, size), center, sigma, amplitude) + noise
}

fn swap_channels(cube: &ImageCube) -> ImageCube {
    let mut data = cube.data().clone();
    data.invert_axis(Axis(2));
    ImageCube::new(data).unwrap()
}

fn full_anchor(size: usize) -> ReferenceAnchor {
    ReferenceAnchor {
        mask: Array2::from_elem((size, size), true),
        centroid: (size as f64 / 2.0, size as f64 / 2.0),
        radius: Some(size as f64 / 2.0),
    }
}

#[test]
fn test_mask_contains_peak_and_stays_compact() {
    init_logging();
    let sigma = 3.0;
    let half_width = sigma * (2.0 * 2f64.ln()).sqrt();
    let image = noisy_spot(48, (24.0, 24.0), sigma, 50.0, 21);

    let det = SourceDetector::new(DetectionOptions::default()).detect(image.view());
    let mask = det.mask().expect("source detected");

    assert!(mask[[24, 24]]);
    for ((r, c), &m) in mask.indexed_iter() {
        if m {
            let d = ((r as f64 - 24.0).powi(2) + (c as f64 - 24.0).powi(2)).sqrt();
            assert!(d <= 3.0 * half_width, "pixel ({r},{c}) at distance {d}");
        }
    }
}

#[test]
fn test_iou_bounds() {
    init_logging();
    let channels = vec![
        noisy_spot(40, (20.0, 20.0), 3.0, 60.0, 1),
        noisy_spot(40, (21.0, 19.0), 2.5, 30.0, 2),
        noisy_spot(40, (20.0, 20.0), 3.0, 60.0, 1),
    ];
    let detector = SourceDetector::new(DetectionOptions::default());
    let detections: Vec<_> = channels.iter().map(|c| detector.detect(c.view())).collect();

    for g in compute_geometry(&detections) {
        assert!((0.0..=1.0).contains(&g.iou), "pair {} iou {}", g.pair, g.iou);
    }
    // Channels 0 and 2 are identical
    let geom = compute_geometry(&detections);
    assert_eq!(geom[1].iou, 1.0);
    assert!(geom[0].iou < 1.0);
}

#[test]
fn test_moments_are_deterministic() {
    let image = noisy_spot(32, (16.0, 15.0), 3.0, 40.0, 5);
    let mask = image.mapv(|v| v > 5.0);
    let computer = MomentComputer::default();

    let run = || {
        computer
            .compute(image.view(), Some(mask.view()), Some((16.0, 15.0)), Some(8.0))
            .unwrap()
            .moments
    };
    let bits = |m: &MomentSet| -> Vec<u64> {
        m.central
            .iter()
            .chain(m.hu.iter())
            .chain(m.zernike_values().iter())
            .map(|v| v.to_bits())
            .collect()
    };
    assert_eq!(bits(&run()), bits(&run()));
}

#[test]
fn test_ssim_mean_is_symmetric() {
    init_logging();
    let data = stack_channels(&[
        noisy_spot(32, (16.0, 16.0), 3.0, 40.0, 8) + 10.0,
        noisy_spot(32, (15.0, 17.0), 4.0, 25.0, 9) + 10.0,
    ])
    .unwrap();
    let cube = ImageCube::new(data).unwrap();
    let anchor = full_anchor(32);

    let computer = MomentComputer::default();
    let ab = compute_similarity(&cube, &anchor, &computer, 3);
    let ba = compute_similarity(&swap_channels(&cube), &anchor, &computer, 3);
    assert_relative_eq!(ab[0].stats.mean, ba[0].stats.mean, epsilon = 1e-12);
}

#[test]
fn test_color_index_flips_sign() {
    init_logging();
    let data = stack_channels(&[
        noisy_spot(32, (16.0, 16.0), 3.0, 40.0, 11) + 20.0,
        noisy_spot(32, (16.0, 16.0), 4.0, 15.0, 12) + 20.0,
    ])
    .unwrap();
    let cube = ImageCube::new(data).unwrap();
    let anchor = full_anchor(32);
    let opts = ColorIndexOptions {
        colorind_safe: -100.0,
        ..Default::default()
    };

    let computer = MomentComputer::default();
    let ab = compute_color_index(&cube, &anchor, &computer, None, &opts).unwrap();
    let ba = compute_color_index(&swap_channels(&cube), &anchor, &computer, None, &opts).unwrap();

    let mut checked = 0;
    for (x, y) in ab[0].map.iter().zip(ba[0].map.iter()) {
        if *x != opts.colorind_safe && *y != opts.colorind_safe {
            assert_relative_eq!(x - opts.colorind_thr, -(y - opts.colorind_thr), epsilon = 1e-9);
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_all_masked_pair_gives_sentinels() {
    init_logging();
    let cube = ImageCube::new(Array3::zeros((16, 16, 2))).unwrap();
    let anchor = full_anchor(16);

    let computer = MomentComputer::default();
    let ssim = compute_similarity(&cube, &anchor, &computer, 3);
    assert_eq!(ssim[0].stats, SummaryStats::sentinel());
    assert_eq!(ssim[0].moments.central, vec![-999.0; 16]);
    assert_eq!(ssim[0].moments.hu, [-999.0; 7]);
    assert_eq!(ssim[0].moments.zernike_values(), [-999.0; 9]);

    let cind = compute_color_index(
        &cube,
        &anchor,
        &computer,
        Some(&ssim),
        &ColorIndexOptions::default(),
    )
    .unwrap();
    assert_eq!(cind[0].stats, ColorIndexStats::sentinel());
    assert_eq!(cind[0].moments, MomentSet::sentinel());
}

#[test]
fn test_reference_without_source_emits_nothing() {
    init_logging();
    let data = stack_channels(&[
        simple_normal_array((32, 32), 0.0, 1.0, 77).unwrap(),
        noisy_spot(32, (16.0, 16.0), 3.0, 50.0, 78),
    ])
    .unwrap();
    let cube = ImageCube::new(data).unwrap();

    let helper = FeatureExtractorHelper::new(ExtractorConfig::default()).unwrap();
    assert!(matches!(
        helper.extract(&cube, &info("faint")),
        Err(ExtractionError::NoReferenceSource(0))
    ));

    let table = FeatureExtractor::new(ExtractorConfig::default())
        .unwrap()
        .run(vec![(cube, info("faint"))]);
    assert!(table.is_empty());
}

#[test]
fn test_scaled_gaussian_scenario() {
    init_logging();
    let cube = ImageCube::new(gaussian_cube(64, 5.0, 100.0, &[1.0, 0.5, 0.2])).unwrap();
    let helper = FeatureExtractorHelper::new(ExtractorConfig::default()).unwrap();

    let result = helper.process(&cube, &info("scaled")).unwrap();
    assert!(result.detections.iter().all(|d| d.source.is_some()));

    let record = helper.extract(&cube, &info("scaled")).unwrap();
    let get = |name: &str| record.get_f64(name).unwrap();

    assert!(get("flux_ch1") > get("flux_ch2"));
    assert!(get("flux_ch2") > get("flux_ch3"));
    assert!(get("flux_ch3") > 0.0);
    assert_relative_eq!(get("color_ch1_2"), 2f64.log10(), epsilon = 1e-6);
    assert_relative_eq!(get("color_ch1_3"), 5f64.log10(), epsilon = 1e-6);
    for name in ["iou_ch1_2", "iou_ch1_3", "iou_ch2_3"] {
        let iou = get(name);
        assert!(iou > 0.5 && iou <= 1.0, "{name} = {iou}");
    }
}

#[test]
fn test_identical_channels_scenario() {
    init_logging();
    let cube = ImageCube::new(gaussian_cube(48, 4.0, 100.0, &[1.0, 1.0])).unwrap();
    let config = ExtractorConfig {
        output: OutputOptions {
            save_ssim_pars: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let record = FeatureExtractorHelper::new(config)
        .unwrap()
        .extract(&cube, &info("twin"))
        .unwrap();

    assert_relative_eq!(record.get_f64("ssim_mean_ch1_2").unwrap(), 1.0, epsilon = 1e-6);
    assert_eq!(record.get_f64("iou_ch1_2"), Some(1.0));
    assert_relative_eq!(record.get_f64("color_ch1_2").unwrap(), 0.0, epsilon = 1e-12);
    assert_eq!(record.get_f64("sep_ch1_2"), Some(0.0));
}
