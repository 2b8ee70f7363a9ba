// geometry.rs — 数值夹取、单位换算、元数据属性提取

use glam::DVec3;
use std::f64::consts::{FRAC_PI_2, TAU};

pub const MIN_LATITUDE: f64 = -FRAC_PI_2;
pub const MAX_LATITUDE: f64 = FRAC_PI_2;

pub const FOV_LOWER_BOUND: f64 = 1.0;
pub const FOV_UPPER_BOUND: f64 = 179.0;

pub const MAX_ZOOM_LEVEL: u8 = 100;

/// Clamps `x` into `[min, max]`. Unlike `f64::clamp` this never panics when
/// the bounds are inverted; `min` wins.
pub fn clamp(x: f64, min: f64, max: f64) -> f64 {
    x.min(max).max(min)
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad.to_degrees()
}

pub fn clamp_latitude(phi: f64) -> f64 {
    clamp(phi, MIN_LATITUDE, MAX_LATITUDE)
}

/// Maps a longitude into `[0, 2π)`.
pub fn normalize_longitude(theta: f64) -> f64 {
    let t = theta.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if t >= TAU {
        0.0
    } else {
        t
    }
}

/// Rounds and clamps an arbitrary zoom request to an integer level.
pub fn clamp_zoom_level(level: f64) -> u8 {
    if level.is_nan() {
        return 0;
    }
    clamp(level.round(), 0.0, MAX_ZOOM_LEVEL as f64) as u8
}

/// Level 0 is the widest view (`max_fov`), level 100 the narrowest (`min_fov`).
pub fn fov_for_level(level: u8, min_fov: f64, max_fov: f64) -> f64 {
    max_fov + (level as f64 / MAX_ZOOM_LEVEL as f64) * (min_fov - max_fov)
}

/// Inverse of [`fov_for_level`], rounded to the nearest level.
pub fn level_for_fov(fov: f64, min_fov: f64, max_fov: f64) -> u8 {
    let span = max_fov - min_fov;
    if span.abs() < f64::EPSILON {
        return 0;
    }
    clamp_zoom_level((max_fov - fov) / span * MAX_ZOOM_LEVEL as f64)
}

/// Unit vector the camera looks along for longitude `theta` and latitude `phi`.
pub fn look_direction(theta: f64, phi: f64) -> DVec3 {
    DVec3::new(phi.cos() * theta.sin(), phi.sin(), phi.cos() * theta.cos())
}

/// First occurrence of `needle` in `haystack` at or after `from`.
pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Extracts the text value of `name` inside `block`.
///
/// Accepts both the attribute form `name="value"` and the element form
/// `<name>value</name>` used by some XMP writers.
pub fn extract_attribute<'a>(block: &'a str, name: &str) -> Option<&'a str> {
    let attr = format!("{}=\"", name);
    if let Some(start) = block.find(&attr) {
        let start = start + attr.len();
        let end = block[start..].find('"')? + start;
        return Some(&block[start..end]);
    }

    let open = format!("<{}>", name);
    let start = block.find(&open)? + open.len();
    let end = block[start..].find('<')? + start;
    Some(block[start..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn clamp_prefers_min_on_inverted_bounds() {
        assert_eq!(clamp(5.0, 1.0, 3.0), 3.0);
        assert_eq!(clamp(-5.0, 1.0, 3.0), 1.0);
        assert_eq!(clamp(2.0, 4.0, 3.0), 4.0);
    }

    #[test]
    fn longitude_wraps_into_one_turn() {
        assert!((normalize_longitude(TAU + 0.5) - 0.5).abs() < 1e-12);
        assert!((normalize_longitude(-0.5) - (TAU - 0.5)).abs() < 1e-12);
        assert_eq!(normalize_longitude(0.0), 0.0);
    }

    #[test]
    fn zoom_levels_round_and_saturate() {
        assert_eq!(clamp_zoom_level(-3.0), 0);
        assert_eq!(clamp_zoom_level(42.4), 42);
        assert_eq!(clamp_zoom_level(42.6), 43);
        assert_eq!(clamp_zoom_level(1e9), 100);
        assert_eq!(clamp_zoom_level(f64::NAN), 0);
    }

    #[test]
    fn level_maps_inversely_to_fov() {
        assert_eq!(fov_for_level(0, 30.0, 90.0), 90.0);
        assert_eq!(fov_for_level(100, 30.0, 90.0), 30.0);
        assert_eq!(fov_for_level(50, 30.0, 90.0), 60.0);
        assert_eq!(level_for_fov(60.0, 30.0, 90.0), 50);
        assert_eq!(level_for_fov(45.0, 45.0, 45.0), 0);
    }

    #[test]
    fn look_direction_is_unit_length() {
        for &(t, p) in &[(0.0, 0.0), (1.0, 0.3), (-2.0, -1.2), (PI, PI / 2.0)] {
            assert!((look_direction(t, p).length() - 1.0).abs() < 1e-12);
        }
        let forward = look_direction(0.0, 0.0);
        assert!((forward.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn finds_first_occurrence_only() {
        let hay = b"abc<x>abc<x>";
        assert_eq!(find_bytes(hay, b"<x>", 0), Some(3));
        assert_eq!(find_bytes(hay, b"<x>", 4), Some(9));
        assert_eq!(find_bytes(hay, b"<y>", 0), None);
        assert_eq!(find_bytes(hay, b"", 0), None);
    }

    #[test]
    fn extracts_attribute_and_element_forms() {
        let block = r#"<rdf GPano:FullPanoWidthPixels="4000"><GPano:CroppedAreaTopPixels> 12 </GPano:CroppedAreaTopPixels>"#;
        assert_eq!(extract_attribute(block, "GPano:FullPanoWidthPixels"), Some("4000"));
        assert_eq!(extract_attribute(block, "GPano:CroppedAreaTopPixels"), Some("12"));
        assert_eq!(extract_attribute(block, "GPano:Missing"), None);
    }
}
