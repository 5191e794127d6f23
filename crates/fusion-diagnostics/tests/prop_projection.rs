// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Property-Based Tests (proptest) for fusion-diagnostics
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for the projection engine using proptest.
//!
//! Covers: image-plane membership, enlargement scaling and in-plane rotation
//! for both strategies, pixel-space translation.

use fusion_diagnostics::{
    CameraPose, DirectStrategy, LegacyStrategy, ProjectionEngine, ViewAppearance,
};
use ndarray::{array, Array1};
use proptest::prelude::*;

fn pose_strategy() -> impl Strategy<Value = CameraPose> {
    (
        5.5f64..7.0,
        -3.1f64..3.1,
        -0.8f64..0.8,
        4.5f64..6.5,
        -3.1f64..3.1,
        -0.8f64..0.8,
    )
        .prop_map(|(r0, theta0, z0, rp, thetap, zp)| CameraPose {
            r0,
            theta0,
            z0,
            rp,
            thetap,
            zp,
        })
}

fn point_strategy() -> impl Strategy<Value = Array1<f64>> {
    (-7.0f64..7.0, -7.0f64..7.0, -1.2f64..1.2).prop_map(|(x, y, z)| array![x, y, z])
}

// ── Image Plane ──────────────────────────────────────────────────────

proptest! {
    /// Every projected point satisfies the image-plane equation.
    #[test]
    fn projected_points_lie_on_plane(pose in pose_strategy(), p in point_strategy()) {
        let engine = ProjectionEngine::new(LegacyStrategy, pose, &ViewAppearance::default());
        prop_assume!(engine.is_ok());
        let engine = engine.unwrap();
        let g = engine.geometry();
        prop_assume!(g.normal.dot(&(&p - &g.camera)).abs() > 0.1);

        let q = engine.project_points(&p).unwrap();
        let residual = g.normal.dot(&q) + g.plane_constant;
        let scale = 1.0 + q.iter().map(|v| v.abs()).fold(0.0, f64::max);
        prop_assert!(residual.abs() < 1e-9 * scale, "residual {}", residual);
    }
}

// ── Appearance Parameters ────────────────────────────────────────────

proptest! {
    /// Pixel distance from the look-at pixel grows linearly with `enh`.
    #[test]
    fn enlargement_scales_about_offset(
        pose in pose_strategy(),
        p in point_strategy(),
        enh in 0.1f64..500.0,
        xoff in -1000.0f64..1000.0,
        yoff in -1000.0f64..1000.0,
    ) {
        let unit = ProjectionEngine::new(
            DirectStrategy::default(),
            pose,
            &ViewAppearance::new(1.0, 0.0, xoff, yoff),
        );
        prop_assume!(unit.is_ok());
        let unit = unit.unwrap();
        let g = unit.geometry();
        prop_assume!(g.normal.dot(&(&p - &g.camera)).abs() > 0.1);
        let scaled = ProjectionEngine::new(
            DirectStrategy::default(),
            pose,
            &ViewAppearance::new(enh, 0.0, xoff, yoff),
        )
        .unwrap();

        let off = array![xoff, yoff];
        let a = unit.point_pixel(p.view()).unwrap() - &off;
        let b = scaled.point_pixel(p.view()).unwrap() - &off;
        let tol = 1e-8 * (1.0 + enh * a.iter().map(|v| v.abs()).fold(0.0, f64::max));
        prop_assert!((b[0] - enh * a[0]).abs() < tol);
        prop_assert!((b[1] - enh * a[1]).abs() < tol);
    }

    /// `alpha` rotates pixels about the look-at pixel.
    #[test]
    fn alpha_rotates_about_offset(
        pose in pose_strategy(),
        p in point_strategy(),
        alpha in -3.1f64..3.1,
    ) {
        let straight = ProjectionEngine::new(
            DirectStrategy::default(),
            pose,
            &ViewAppearance::new(100.0, 0.0, 500.0, 600.0),
        );
        prop_assume!(straight.is_ok());
        let straight = straight.unwrap();
        let g = straight.geometry();
        prop_assume!(g.normal.dot(&(&p - &g.camera)).abs() > 0.1);
        let turned = ProjectionEngine::new(
            DirectStrategy::default(),
            pose,
            &ViewAppearance::new(100.0, alpha, 500.0, 600.0),
        )
        .unwrap();

        let off = array![500.0, 600.0];
        let a = straight.point_pixel(p.view()).unwrap() - &off;
        let b = turned.point_pixel(p.view()).unwrap() - &off;
        let (s, c) = alpha.sin_cos();
        let tol = 1e-8 * (1.0 + a.iter().map(|v| v.abs()).fold(0.0, f64::max));
        prop_assert!((b[0] - (c * a[0] + s * a[1])).abs() < tol);
        prop_assert!((b[1] - (-s * a[0] + c * a[1])).abs() < tol);
    }

    /// Legacy pixels scale with `enh` about the look-at pixel, which itself
    /// moves with `enh`.
    #[test]
    fn legacy_enlargement_scales_about_look_at(
        pose in pose_strategy(),
        p in point_strategy(),
        enh in 0.1f64..50.0,
    ) {
        let unit = ProjectionEngine::new(
            LegacyStrategy,
            pose,
            &ViewAppearance::new(1.0, 0.0, -2.51, 8.25),
        );
        prop_assume!(unit.is_ok());
        let unit = unit.unwrap();
        let g = unit.geometry();
        prop_assume!(g.normal.dot(&(&p - &g.camera)).abs() > 0.1);
        let scaled = ProjectionEngine::new(
            LegacyStrategy,
            pose,
            &ViewAppearance::new(enh, 0.0, -2.51, 8.25),
        )
        .unwrap();

        let look_at = g.look_at.view();
        let a = unit.point_pixel(p.view()).unwrap() - unit.point_pixel(look_at).unwrap();
        let b = scaled.point_pixel(p.view()).unwrap() - scaled.point_pixel(look_at).unwrap();
        let tol = 1e-8 * (1.0 + enh * a.iter().map(|v| v.abs()).fold(0.0, f64::max));
        prop_assert!((b[0] - enh * a[0]).abs() < tol);
        prop_assert!((b[1] - enh * a[1]).abs() < tol);
    }

    /// Legacy `alpha` turns pixels about the look-at pixel in the same sense
    /// as the direct strategy.
    #[test]
    fn legacy_alpha_rotates_about_look_at(
        pose in pose_strategy(),
        p in point_strategy(),
        alpha in -3.1f64..3.1,
    ) {
        let straight = ProjectionEngine::new(
            LegacyStrategy,
            pose,
            &ViewAppearance::new(1.63, 0.0, -2.51, 8.25),
        );
        prop_assume!(straight.is_ok());
        let straight = straight.unwrap();
        let g = straight.geometry();
        prop_assume!(g.normal.dot(&(&p - &g.camera)).abs() > 0.1);
        let turned = ProjectionEngine::new(
            LegacyStrategy,
            pose,
            &ViewAppearance::new(1.63, alpha, -2.51, 8.25),
        )
        .unwrap();

        let look_at = g.look_at.view();
        let a = straight.point_pixel(p.view()).unwrap() - straight.point_pixel(look_at).unwrap();
        let b = turned.point_pixel(p.view()).unwrap() - turned.point_pixel(look_at).unwrap();
        let (s, c) = alpha.sin_cos();
        let tol = 1e-8 * (1.0 + a.iter().map(|v| v.abs()).fold(0.0, f64::max));
        prop_assert!((b[0] - (c * a[0] + s * a[1])).abs() < tol);
        prop_assert!((b[1] - (-s * a[0] + c * a[1])).abs() < tol);
    }

    /// A pure translation update shifts every pixel by the same amount.
    #[test]
    fn translation_update_shifts_pixels(
        pose in pose_strategy(),
        p in point_strategy(),
        dx in -300.0f64..300.0,
        dy in -300.0f64..300.0,
    ) {
        let engine = ProjectionEngine::new(
            LegacyStrategy,
            pose,
            &ViewAppearance::new(1.63, 3.14, -2.51, 8.25),
        );
        prop_assume!(engine.is_ok());
        let mut engine = engine.unwrap();
        let g = engine.geometry();
        prop_assume!(g.normal.dot(&(&p - &g.camera)).abs() > 0.1);

        let before = engine.point_pixel(p.view()).unwrap();
        engine.update_projection(&ViewAppearance::new(1.0, 0.0, dx, dy));
        let after = engine.point_pixel(p.view()).unwrap();
        let tol = 1e-8 * (1.0 + before.iter().map(|v| v.abs()).fold(0.0, f64::max));
        prop_assert!((after[0] - before[0] - dx).abs() < tol);
        prop_assert!((after[1] - before[1] - dy).abs() < tol);
    }
}
