// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Pixels per image-plane unit of the legacy EDICAM calibration.
/// NOTE: tied to one historical camera/resolution setup; other cameras
/// should be calibrated with the direct strategy.
pub const LEGACY_PIXEL_SCALE: f64 = 190.0;

/// Legacy vertical offset constant (added to `yoff`, image-plane units).
pub const LEGACY_Y_OFFSET: f64 = 2.59155;

/// Legacy horizontal offset constant (added to `xoff`, image-plane units).
pub const LEGACY_X_OFFSET: f64 = 5.18956;

/// Pixel tolerance used to pick the quadratic root in two-point calibration.
pub const CALIBRATION_TOLERANCE_PX: f64 = 0.5;

/// Default camera image height [px] (first `imsize` entry).
pub const DEFAULT_IMAGE_HEIGHT: usize = 1280;

/// Default camera image width [px] (second `imsize` entry).
pub const DEFAULT_IMAGE_WIDTH: usize = 1024;

/// Zero-padded width of the surface index in record file names.
pub const SURFACE_INDEX_WIDTH: usize = 3;

/// Record field position of the first field-line coordinate array.
pub const FIELD_LINE_POSITION: usize = 4;

/// Record field position of the first magnetic-field array.
pub const MAGNETIC_FIELD_POSITION: usize = 10;

/// Record field position of the first field-gradient array.
pub const FIELD_GRADIENT_POSITION: usize = 16;
