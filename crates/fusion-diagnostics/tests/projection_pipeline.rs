// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Projection Pipeline Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Field lines read from record archives, projected into camera images.

use fusion_diagnostics::{
    read_reference_points, write_reference_points, CameraPose, DirectStrategy, LegacyStrategy,
    ProjectionEngine, ViewAppearance,
};
use fusion_fieldlines::metadata::SurfaceMetadata;
use fusion_fieldlines::record::RecordWriter;
use fusion_fieldlines::{FieldLineStore, ReadParameters};
use fusion_types::config::StoreConfig;
use fusion_types::constants::FIELD_LINE_POSITION;
use fusion_types::error::FusionError;
use ndarray::{array, Array1, Array2, Array3, Axis, Ix3};
use std::f64::consts::PI;
use tempfile::TempDir;

const CONFIG: &str = "EIM";
const SURFACE: usize = 7;

fn edicam_pose() -> CameraPose {
    CameraPose {
        r0: 6.31,
        theta0: -PI / 3.0,
        z0: 0.57,
        rp: 6.274,
        thetap: 5.0 * PI / 12.0,
        zp: 0.023,
    }
}

/// Helical line on a torus of major radius 5.5 m, minor radius 0.3 m.
fn helix(line: usize, tor: usize, backward: bool) -> [f64; 3] {
    let sign = if backward { -1.0 } else { 1.0 };
    let phi = sign * tor as f64 * 0.01;
    let u = line as f64 * 0.2 + phi * 5.0;
    let r = 5.5 + 0.3 * u.cos();
    [r * phi.cos(), r * phi.sin(), 0.3 * u.sin()]
}

fn store_with_helices(lines: usize, samples: usize) -> (TempDir, FieldLineStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::rooted_at(dir.path());
    let data_dir = dir.path().join(&config.field_line_subdir);
    std::fs::create_dir(&data_dir).unwrap();

    SurfaceMetadata {
        iota: Array1::linspace(0.85, 1.0, SURFACE + 1),
        reff: Array1::linspace(0.0, 0.5, SURFACE + 1),
        separatrix: vec![SURFACE],
        island_names: vec![],
        island_flags: Array1::zeros(SURFACE + 1),
    }
    .write(dir.path().join(&config.metadata_file))
    .unwrap();

    let mut writer =
        RecordWriter::create(data_dir.join(config.surface_file_name(CONFIG, SURFACE))).unwrap();
    for k in 0..6 {
        let backward = k >= 3;
        let arr = Array2::from_shape_fn((lines, samples), |(i, j)| helix(i, j, backward)[k % 3]);
        writer.add_field(FIELD_LINE_POSITION + k, &arr).unwrap();
    }
    writer.finish().unwrap();

    let store = FieldLineStore::open(CONFIG, &config).unwrap();
    (dir, store)
}

fn loaded_lines(store: &mut FieldLineStore) -> Array3<f64> {
    store
        .load_data(false, false)
        .unwrap()
        .field_lines()
        .into_dimensionality::<Ix3>()
        .unwrap()
        .to_owned()
}

#[test]
fn test_field_lines_project_pointwise() {
    let (_dir, mut store) = store_with_helices(6, 40);
    store
        .update_read_parameters(
            ReadParameters::new()
                .surfaces(vec![SURFACE as i64])
                .toroidal_range("0:80:4")
                .direction_name("both")
                .unwrap(),
        )
        .unwrap();
    let lines = loaded_lines(&mut store);
    assert_eq!(lines.shape(), &[3, 6, 20]);

    let engine = ProjectionEngine::new(
        DirectStrategy::mirrored(),
        edicam_pose(),
        &ViewAppearance::new(180.0, 2.5, 300.0, -200.0),
    )
    .unwrap();
    let pixels = engine.calc_pixel_coord(&lines).unwrap();
    assert_eq!(pixels.shape(), &[2, 6, 20]);

    for i in [0, 3, 5] {
        for j in [0, 9, 10, 19] {
            let single = engine
                .point_pixel(lines.slice(ndarray::s![.., i, j]))
                .unwrap();
            assert!((pixels[[0, i, j]] - single[0]).abs() < 1e-9);
            assert!((pixels[[1, i, j]] - single[1]).abs() < 1e-9);
        }
    }
}

#[test]
fn test_projected_field_lines_on_image_plane() {
    let (_dir, mut store) = store_with_helices(4, 30);
    let lines = loaded_lines(&mut store);

    let engine = ProjectionEngine::new(
        LegacyStrategy,
        edicam_pose(),
        &ViewAppearance::new(1.63, 3.14, -2.51, 8.25),
    )
    .unwrap();
    let plane = engine.project_points(&lines).unwrap();
    let geometry = engine.geometry();
    for q in plane.lanes(Axis(0)) {
        let residual = geometry.normal.dot(&q) + geometry.plane_constant;
        assert!(residual.abs() < 1e-9, "residual {residual}");
    }
}

#[test]
fn test_full_stack_rank_rejected() {
    let (_dir, mut store) = store_with_helices(2, 10);
    let data = store.load_data(false, false).unwrap();
    let engine = ProjectionEngine::new(
        DirectStrategy::default(),
        edicam_pose(),
        &ViewAppearance::default(),
    )
    .unwrap();
    assert!(matches!(
        engine.calc_pixel_coord(data.field_lines_full()),
        Err(FusionError::Shape(_))
    ));
}

#[test]
fn test_look_at_lands_on_offset() {
    let pose = edicam_pose();
    let engine = ProjectionEngine::new(
        DirectStrategy::default(),
        pose,
        &ViewAppearance::new(90.0, 0.4, 512.0, 640.0),
    )
    .unwrap();
    let look_at = engine.geometry().look_at.clone();
    let px = engine.point_pixel(look_at.view()).unwrap();
    assert!((px[0] - 512.0).abs() < 1e-9);
    assert!((px[1] - 640.0).abs() < 1e-9);
}

#[test]
fn test_calibration_from_reference_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference_points.txt");
    write_reference_points(&path, &array![[2.74, 3.321], [4.13, 5.7], [0.234, 0.45]]).unwrap();
    let points = read_reference_points(&path).unwrap();

    let truth = ViewAppearance::new(180.0, 2.5, 300.0, -200.0);
    let reference =
        ProjectionEngine::new(DirectStrategy::mirrored(), edicam_pose(), &truth).unwrap();
    let pixels = reference.calc_pixel_coord(&points).unwrap();

    let mut engine = ProjectionEngine::new(
        DirectStrategy::mirrored(),
        edicam_pose(),
        &ViewAppearance::default(),
    )
    .unwrap();
    let fit = engine
        .calculate_parameters(
            [pixels[[0, 0]], pixels[[1, 0]]],
            [pixels[[0, 1]], pixels[[1, 1]]],
            points.column(0),
            points.column(1),
        )
        .unwrap();
    assert!(fit.verified);
    assert!((fit.enh - truth.enh).abs() < 1e-6);
    assert!((fit.alpha - truth.alpha).abs() < 1e-6);
    assert!((fit.xoff - truth.xoff).abs() < 1e-4);
    assert!((fit.yoff - truth.yoff).abs() < 1e-4);

    let again = engine.calc_pixel_coord(&points).unwrap();
    assert!((&again - &pixels).iter().all(|d| d.abs() < 1e-4));
}

#[test]
fn test_catalog_views_reproduce_legacy_transform() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("precalibrated_views.txt");
    std::fs::write(
        &path,
        "W7X-AEQ41\nW7X-AEQ50\n!!!\n\
         W7X-AEQ41\nshot: 20160309\ncam: edicam\n\
         {R0:6.34720, z0:0.643984, theta0:3.81564, Rp:6.31, zp:-0.56, thetap:-1.15, enh:1.56, alpha:0.17, xoff:-2.95, yoff:8.0}\n!!!\n\
         W7X-AEQ50\nshot: 20160309\ncam: edicam\n\
         {R0:6.34459, z0:-0.643974, theta0:-1.30240, Rp:6.31, zp:0.56, thetap:3.72, enh:1.63, alpha:-2.24, xoff:-2.41, yoff:8.36}\n!!!\n",
    )
    .unwrap();

    let expected = [
        (
            "W7X-AEQ41",
            array![
                [74.68264825, 283.39567647, 44.29844928],
                [33.3574145, -54.04568694, 289.51564141]
            ],
            [2012.3945, 425.5164],
        ),
        (
            "W7X-AEQ50",
            array![
                [106.53871141, 289.68105731, -25.46523136],
                [-55.14896823, -6.50117809, -304.68084283]
            ],
            [2080.7945, 528.1164],
        ),
    ];
    for (view, matrix, offset) in expected {
        let engine =
            ProjectionEngine::<LegacyStrategy>::from_catalog_file(&path, view, "20160309", "edicam")
                .unwrap();
        let (m, o) = engine.view_parameters();
        assert!((&m - &matrix).iter().all(|d| d.abs() < 1e-6), "{view}: {m}");
        assert!((o[[0, 0]] - offset[0]).abs() < 1e-6);
        assert!((o[[1, 0]] - offset[1]).abs() < 1e-6);
    }

    assert!(matches!(
        ProjectionEngine::<LegacyStrategy>::from_catalog_file(&path, "W7X-AEQ41", "1", "edicam"),
        Err(FusionError::Lookup(_))
    ));
}
