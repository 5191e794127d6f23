// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Camera Projection
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Device coordinates → camera pixel coordinates.
//!
//! A point is first projected centrally from the camera position onto the
//! image plane (the plane through the look-at point, perpendicular to the
//! line of view), then mapped to pixels by a 2×3 matrix and a 2-vector
//! offset. Two strategies build that matrix from the pose and appearance:
//! [`LegacyStrategy`] reproduces the historical EDICAM calibration tool and
//! [`DirectStrategy`] builds an orthonormal image-plane basis directly.

use fusion_math::linalg::{
    cross3, cylindrical_to_cartesian, norm, quadratic_roots, rodrigues_rotation, rotation_2d,
    unit_direction,
};
use fusion_types::constants::{
    CALIBRATION_TOLERANCE_PX, DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH, LEGACY_PIXEL_SCALE,
    LEGACY_X_OFFSET, LEGACY_Y_OFFSET,
};
use fusion_types::error::{FusionError, FusionResult};
use ndarray::{array, Array, Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, warn};

/// Camera and look-at positions in cylindrical device coordinates (m, rad).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub r0: f64,
    pub theta0: f64,
    pub z0: f64,
    pub rp: f64,
    pub thetap: f64,
    pub zp: f64,
}

impl Default for CameraPose {
    fn default() -> Self {
        CameraPose {
            r0: 1.0,
            theta0: 0.0,
            z0: 0.0,
            rp: 2.0,
            thetap: 0.0,
            zp: 0.0,
        }
    }
}

/// Enlargement, rotation (rad) and pixel translation on the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewAppearance {
    pub enh: f64,
    pub alpha: f64,
    pub xoff: f64,
    pub yoff: f64,
}

impl Default for ViewAppearance {
    fn default() -> Self {
        ViewAppearance {
            enh: 1.0,
            alpha: 0.0,
            xoff: 0.0,
            yoff: 0.0,
        }
    }
}

impl ViewAppearance {
    pub fn new(enh: f64, alpha: f64, xoff: f64, yoff: f64) -> Self {
        ViewAppearance {
            enh,
            alpha,
            xoff,
            yoff,
        }
    }
}

/// Camera image dimensions; pixel (0, 0) is the upper left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Vertical extent.
    pub height: usize,
    /// Horizontal extent.
    pub width: usize,
}

impl Default for ImageSize {
    fn default() -> Self {
        ImageSize {
            height: DEFAULT_IMAGE_HEIGHT,
            width: DEFAULT_IMAGE_WIDTH,
        }
    }
}

impl ImageSize {
    /// Image centre in (x, y) pixel coordinates.
    pub fn centre(&self) -> Array1<f64> {
        array![
            (self.width as f64 - 1.0) / 2.0,
            (self.height as f64 - 1.0) / 2.0
        ]
    }
}

/// Cartesian camera geometry derived from a [`CameraPose`].
#[derive(Debug, Clone, PartialEq)]
pub struct CameraGeometry {
    pub camera: Array1<f64>,
    pub look_at: Array1<f64>,
    /// Unit vector from the look-at point towards the camera.
    pub normal: Array1<f64>,
    /// Plane constant `d` with `normal · x + d = 0` on the image plane.
    pub plane_constant: f64,
}

impl CameraGeometry {
    pub fn from_pose(pose: &CameraPose) -> FusionResult<Self> {
        let camera = cylindrical_to_cartesian(pose.r0, pose.theta0, pose.z0);
        let look_at = cylindrical_to_cartesian(pose.rp, pose.thetap, pose.zp);
        let normal = unit_direction(&camera, &look_at).ok_or_else(|| {
            FusionError::DegenerateGeometry("camera and look-at point coincide".to_string())
        })?;
        let plane_constant = -normal.dot(&look_at);
        Ok(CameraGeometry {
            camera,
            look_at,
            normal,
            plane_constant,
        })
    }

    /// Central projection of one point onto the image plane.
    ///
    /// Points on a plane through the camera parallel to the image plane have
    /// no intersection and come out non-finite.
    fn project_lane(&self, p: ArrayView1<f64>) -> [f64; 3] {
        let c = &self.camera;
        let n = &self.normal;
        let rel = [p[0] - c[0], p[1] - c[1], p[2] - c[2]];
        let t = (-self.plane_constant - n.dot(c)) / (n[0] * rel[0] + n[1] * rel[1] + n[2] * rel[2]);
        [rel[0] * t + c[0], rel[1] * t + c[1], rel[2] * t + c[2]]
    }
}

/// 2×3 matrix and 2-vector offset from image-plane points to pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionTransform {
    pub matrix: Array2<f64>,
    pub offset: Array1<f64>,
}

impl ProjectionTransform {
    fn apply(&self, q: &[f64; 3]) -> [f64; 2] {
        let m = &self.matrix;
        [
            m[[0, 0]] * q[0] + m[[0, 1]] * q[1] + m[[0, 2]] * q[2] + self.offset[0],
            m[[1, 0]] * q[0] + m[[1, 1]] * q[1] + m[[1, 2]] * q[2] + self.offset[1],
        ]
    }
}

/// Builds the pixel transform of a camera from its geometry and appearance.
pub trait ProjectionStrategy: Debug {
    fn transform(
        &self,
        geometry: &CameraGeometry,
        appearance: &ViewAppearance,
    ) -> FusionResult<ProjectionTransform>;

    fn name(&self) -> &'static str;
}

/// Historical EDICAM calibration: Rodrigues rotation about the plane normal
/// composed with a fixed empirical basis, then a fixed scale and offset.
///
/// NOTE: the scale and offsets in `fusion_types::constants` were fitted for
/// one camera/resolution setup; appearance parameters from other calibration
/// tools are not interchangeable with these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyStrategy;

impl ProjectionStrategy for LegacyStrategy {
    fn transform(
        &self,
        geometry: &CameraGeometry,
        appearance: &ViewAppearance,
    ) -> FusionResult<ProjectionTransform> {
        let n = &geometry.normal;
        let (a, b, c) = (n[0], n[1], n[2]);
        if (a - 1.0).abs() < 1e-12 {
            return Err(FusionError::DegenerateGeometry(
                "legacy basis undefined for a line of view along +x".to_string(),
            ));
        }
        let rotation = rodrigues_rotation(n.view(), appearance.alpha);
        let base_0 = array![c, (b * c) / (a - 1.0), 1.0 + c * c / (a - 1.0)];
        let base_1 = cross3(n.view(), base_0.view());
        let basis = ndarray::stack(Axis(0), &[base_1.view(), base_0.view()])
            .map_err(|e| FusionError::Shape(e.to_string()))?;

        let matrix = basis.dot(&rotation) * (LEGACY_PIXEL_SCALE * appearance.enh);
        let offset = array![
            LEGACY_PIXEL_SCALE * (appearance.yoff + LEGACY_Y_OFFSET),
            LEGACY_PIXEL_SCALE * (appearance.xoff + LEGACY_X_OFFSET)
        ];
        Ok(ProjectionTransform { matrix, offset })
    }

    fn name(&self) -> &'static str {
        "legacy"
    }
}

/// Orthonormal image-plane basis from the normal, then scale × rotation
/// (× optional left-right mirror), offset chosen so the look-at point lands
/// on `(xoff, yoff)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectStrategy {
    /// Flip the second image axis, for images whose origin is the upper left corner.
    pub mirror: bool,
}

impl DirectStrategy {
    pub fn mirrored() -> Self {
        DirectStrategy { mirror: true }
    }
}

impl ProjectionStrategy for DirectStrategy {
    fn transform(
        &self,
        geometry: &CameraGeometry,
        appearance: &ViewAppearance,
    ) -> FusionResult<ProjectionTransform> {
        let n = &geometry.normal;
        let horizontal = array![n[1], -n[0], 0.0];
        let len = norm(horizontal.view());
        if len < 1e-12 {
            return Err(FusionError::DegenerateGeometry(
                "image-plane basis undefined for a vertical line of view".to_string(),
            ));
        }
        let base_0 = horizontal / len;
        let base_1 = cross3(n.view(), base_0.view());
        let basis = ndarray::stack(Axis(0), &[base_0.view(), base_1.view()])
            .map_err(|e| FusionError::Shape(e.to_string()))?;

        let flip = if self.mirror { -1.0 } else { 1.0 };
        let (s, c) = appearance.alpha.sin_cos();
        let turn = array![[c, flip * s], [-s, flip * c]];
        let matrix = turn.dot(&basis) * appearance.enh;
        let offset = -matrix.dot(&geometry.look_at) + array![appearance.xoff, appearance.yoff];
        Ok(ProjectionTransform { matrix, offset })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Which root of the offset quadratic two-point calibration kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadraticRoot {
    Plus,
    Minus,
}

/// Outcome of [`ProjectionEngine::calculate_parameters`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPointCalibration {
    pub enh: f64,
    pub alpha: f64,
    pub xoff: f64,
    pub yoff: f64,
    pub root: QuadraticRoot,
    /// Whether the kept offset reprojects the first reference point within tolerance.
    /// The minus root is kept even when it does not.
    pub verified: bool,
}

fn check_points(shape: &[usize], min_rank: usize, max_rank: usize) -> FusionResult<()> {
    if shape.len() < min_rank.max(1) || shape.len() > max_rank {
        return Err(FusionError::Shape(format!(
            "point arrays must have rank {min_rank} to {max_rank}, got rank {}",
            shape.len()
        )));
    }
    if shape[0] != 3 {
        return Err(FusionError::Shape(format!(
            "leading axis must hold the 3 Cartesian components, got {}",
            shape[0]
        )));
    }
    Ok(())
}

/// Projection of device points into one camera view.
#[derive(Debug, Clone)]
pub struct ProjectionEngine<S: ProjectionStrategy> {
    strategy: S,
    pose: CameraPose,
    geometry: CameraGeometry,
    image_size: ImageSize,
    transform: ProjectionTransform,
    pub viewpoint: Option<String>,
    pub shot: Option<String>,
    pub camera: Option<String>,
}

impl<S: ProjectionStrategy> ProjectionEngine<S> {
    pub fn new(strategy: S, pose: CameraPose, appearance: &ViewAppearance) -> FusionResult<Self> {
        let geometry = CameraGeometry::from_pose(&pose)?;
        let transform = strategy.transform(&geometry, appearance)?;
        debug!("Projection engine set up with {} strategy", strategy.name());
        Ok(ProjectionEngine {
            strategy,
            pose,
            geometry,
            image_size: ImageSize::default(),
            transform,
            viewpoint: None,
            shot: None,
            camera: None,
        })
    }

    pub fn with_image_size(mut self, image_size: ImageSize) -> Self {
        self.image_size = image_size;
        self
    }

    /// Attach the viewpoint, reference shot and camera names.
    pub fn with_labels(
        mut self,
        viewpoint: impl Into<String>,
        shot: impl Into<String>,
        camera: impl Into<String>,
    ) -> Self {
        self.viewpoint = Some(viewpoint.into());
        self.shot = Some(shot.into());
        self.camera = Some(camera.into());
        self
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn geometry(&self) -> &CameraGeometry {
        &self.geometry
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn transform(&self) -> &ProjectionTransform {
        &self.transform
    }

    /// Copies of the matrix (2×3) and offset (2×1).
    pub fn view_parameters(&self) -> (Array2<f64>, Array2<f64>) {
        let offset = self.transform.offset.clone().insert_axis(Axis(1));
        (self.transform.matrix.clone(), offset)
    }

    /// Rebuild the transform from new appearance parameters.
    pub fn set_appearance(&mut self, appearance: &ViewAppearance) -> FusionResult<()> {
        self.transform = self.strategy.transform(&self.geometry, appearance)?;
        Ok(())
    }

    /// Scale and rotate the current transform about the image centre, then
    /// translate in pixel space. Used for manual correction after calibration.
    pub fn update_projection(&mut self, adjustment: &ViewAppearance) {
        let centre = self.image_size.centre();
        let enh = adjustment.enh;
        let turn = rotation_2d(adjustment.alpha);

        let scaled = &self.transform.offset * enh + &centre * (1.0 - enh);
        self.transform.matrix = turn.dot(&(&self.transform.matrix * enh));
        self.transform.offset =
            turn.dot(&(scaled - &centre)) + &centre + array![adjustment.xoff, adjustment.yoff];
    }

    /// Project points onto the image plane.
    ///
    /// The leading axis holds the x, y, z components; any trailing shape is kept.
    pub fn project_points<T, D>(&self, points: &ArrayBase<T, D>) -> FusionResult<Array<f64, D>>
    where
        T: Data<Elem = f64>,
        D: Dimension,
    {
        check_points(points.shape(), 1, usize::MAX)?;
        let mut out = points.to_owned();
        for mut lane in out.lanes_mut(Axis(0)) {
            let q = self.geometry.project_lane(lane.view());
            lane[0] = q[0];
            lane[1] = q[1];
            lane[2] = q[2];
        }
        Ok(out)
    }

    /// Pixel coordinates of a batch (3×N) or a stack of batches (3×N×M).
    /// The result has 2 in place of the leading 3. Single points go through
    /// [`point_pixel`](Self::point_pixel).
    pub fn calc_pixel_coord<T, D>(&self, points: &ArrayBase<T, D>) -> FusionResult<Array<f64, D>>
    where
        T: Data<Elem = f64>,
        D: Dimension,
    {
        check_points(points.shape(), 2, 3)?;
        let mut dim = points.raw_dim();
        dim[0] = 2;
        let mut out = Array::<f64, D>::zeros(dim);
        Zip::from(out.lanes_mut(Axis(0)))
            .and(points.lanes(Axis(0)))
            .for_each(|mut px, p| {
                let q = self.geometry.project_lane(p);
                let [u, v] = self.transform.apply(&q);
                px[0] = u;
                px[1] = v;
            });
        Ok(out)
    }

    /// Pixel coordinates of one point.
    pub fn point_pixel(&self, point: ArrayView1<f64>) -> FusionResult<Array1<f64>> {
        let px = self.calc_pixel_coord(&point.insert_axis(Axis(1)))?;
        Ok(px.index_axis_move(Axis(1), 0))
    }
}

impl ProjectionEngine<DirectStrategy> {
    /// Recover enlargement, rotation and offset from two device points with
    /// known pixel positions.
    ///
    /// The offset solves a quadratic in `yoff`, or in `xoff` when both
    /// reference pixels share an x coordinate. The plus root is kept when it
    /// reprojects `point1` within half a pixel of `pixel1`, otherwise the
    /// minus root is kept as is and reported with `verified == false` if it
    /// fails the same check.
    pub fn calculate_parameters(
        &mut self,
        pixel1: [f64; 2],
        pixel2: [f64; 2],
        point1: ArrayView1<f64>,
        point2: ArrayView1<f64>,
    ) -> FusionResult<TwoPointCalibration> {
        let [x1, y1] = pixel1;
        let [x2, y2] = pixel2;

        self.set_appearance(&ViewAppearance::default())?;
        let p1 = self.point_pixel(point1)?;
        let p2 = self.point_pixel(point2)?;
        let source = &p2 - &p1;
        let target = array![x2 - x1, y2 - y1];
        let l_source = norm(source.view());
        let l_target = norm(target.view());
        if l_source < 1e-12 || l_target < 1e-12 || !l_source.is_finite() {
            return Err(FusionError::DegenerateGeometry(
                "reference points project onto one pixel".to_string(),
            ));
        }

        let cos = (target.dot(&source) / (l_target * l_source)).clamp(-1.0, 1.0);
        let mut alpha = cos.acos();
        if target[0] * source[1] - target[1] * source[0] < 0.0 {
            alpha = -alpha;
        }
        let enh = l_target / l_source;

        // |pixel_i − offset| = enh · |p_i| for both points; their difference is
        // linear, u = m + n · v, leaving a quadratic in v. (u, v) is
        // (xoff, yoff) unless the pixels share a column.
        let swap = x2 == x1;
        let (u1, v1, u2, v2) = if swap { (y1, x1, y2, x2) } else { (x1, y1, x2, y2) };
        let ra = norm(p1.view()) * enh;
        let rb = norm(p2.view()) * enh;
        let f = ra * ra - u1 * u1 - v1 * v1;
        let n = (v1 - v2) / (u2 - u1);
        let m = (ra * ra - rb * rb - u1 * u1 + u2 * u2 - v1 * v1 + v2 * v2) / (2.0 * (u2 - u1));
        let (plus, minus) = quadratic_roots(
            n * n + 1.0,
            2.0 * n * m - 2.0 * u1 * n - 2.0 * v1,
            m * m - 2.0 * u1 * m - f,
        )
        .ok_or_else(|| {
            FusionError::DegenerateGeometry("no real offset fits both reference points".to_string())
        })?;
        let offset_at = |v: f64| if swap { (v, m + n * v) } else { (m + n * v, v) };

        let (xoff, yoff) = offset_at(plus);
        let mut calibration = TwoPointCalibration {
            enh,
            alpha,
            xoff,
            yoff,
            root: QuadraticRoot::Plus,
            verified: false,
        };
        self.apply_calibration(&calibration)?;
        calibration.verified = self.reprojects(point1, pixel1)?;
        if !calibration.verified {
            (calibration.xoff, calibration.yoff) = offset_at(minus);
            calibration.root = QuadraticRoot::Minus;
            self.apply_calibration(&calibration)?;
            calibration.verified = self.reprojects(point1, pixel1)?;
            if !calibration.verified {
                warn!(
                    "Two-point calibration kept the minus root although it misses ({x1}, {y1}) by more than {CALIBRATION_TOLERANCE_PX} px"
                );
            }
        }
        Ok(calibration)
    }

    fn apply_calibration(&mut self, c: &TwoPointCalibration) -> FusionResult<()> {
        self.set_appearance(&ViewAppearance::new(c.enh, c.alpha, c.xoff, c.yoff))
    }

    fn reprojects(&self, point: ArrayView1<f64>, pixel: [f64; 2]) -> FusionResult<bool> {
        let p = self.point_pixel(point)?;
        Ok((p[0] - pixel[0]).abs() <= CALIBRATION_TOLERANCE_PX
            && (p[1] - pixel[1]).abs() <= CALIBRATION_TOLERANCE_PX)
    }
}
