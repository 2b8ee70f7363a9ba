// panorama.rs — 视角参数：经纬度、缩放级别与视场角

use crate::geometry::{clamp, clamp_latitude, clamp_zoom_level, fov_for_level, level_for_fov, look_direction, MAX_ZOOM_LEVEL};
use glam::DVec3;

/// Camera orientation inside the sphere.
///
/// `theta` is stored as given; wrapping it is left to whoever displays or
/// animates it. `phi` is always inside `[-π/2, π/2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Orientation {
    theta: f64,
    phi: f64,
    zoom_level: u8,
    /// Field of view set directly (default or reset) rather than through a
    /// zoom level; dropped by the next zoom.
    exact_fov: Option<f64>,
    min_fov: f64,
    max_fov: f64,
}

impl Orientation {
    /// `min_fov`/`max_fov` in degrees, assumed already validated.
    pub fn new(theta: f64, phi: f64, default_fov: f64, min_fov: f64, max_fov: f64) -> Self {
        let mut o = Self {
            theta,
            phi: clamp_latitude(phi),
            zoom_level: 0,
            exact_fov: None,
            min_fov,
            max_fov,
        };
        o.set_fov(default_fov);
        o
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn zoom_level(&self) -> u8 {
        self.zoom_level
    }

    pub fn min_fov(&self) -> f64 {
        self.min_fov
    }

    pub fn max_fov(&self) -> f64 {
        self.max_fov
    }

    /// Degrees.
    pub fn fov(&self) -> f64 {
        self.exact_fov
            .unwrap_or_else(|| fov_for_level(self.zoom_level, self.min_fov, self.max_fov))
    }

    /// Sets the field of view itself, clamped into the allowed range. The zoom
    /// level becomes the nearest one. Returns that level.
    pub fn set_fov(&mut self, fov: f64) -> u8 {
        let fov = clamp(fov, self.min_fov, self.max_fov);
        self.exact_fov = Some(fov);
        self.zoom_level = level_for_fov(fov, self.min_fov, self.max_fov);
        self.zoom_level
    }

    pub fn set_position(&mut self, theta: f64, phi: f64) {
        self.theta = theta;
        self.phi = clamp_latitude(phi);
    }

    /// Stores the rounded, clamped level and returns it.
    pub fn set_zoom_level(&mut self, level: f64) -> u8 {
        self.exact_fov = None;
        self.zoom_level = clamp_zoom_level(level);
        self.zoom_level
    }

    pub fn zoom_in_level(&self) -> u8 {
        self.zoom_level.saturating_add(1).min(MAX_ZOOM_LEVEL)
    }

    pub fn zoom_out_level(&self) -> u8 {
        self.zoom_level.saturating_sub(1)
    }

    /// Target angles for a pointer move of `(dx, dy)` pixels.
    pub fn drag_target(&self, dx: f64, dy: f64, long_offset: f64, lat_offset: f64) -> (f64, f64) {
        (self.theta + dx * long_offset, self.phi + dy * lat_offset)
    }

    pub fn look_direction(&self) -> DVec3 {
        look_direction(self.theta, self.phi)
    }
}
