// mesh.rs — 从球心观看的全景球体网格

use std::f32::consts::{FRAC_PI_2, PI, TAU};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

/// UV sphere whose texture coordinates follow the camera's look-at
/// convention: direction `(cosφ·sinθ, sinφ, cosφ·cosθ)` samples
/// `u = 0.5 - θ/2π`, `v = 0.5 - φ/π`, so θ = 0 faces the middle of the
/// equirectangular image and the picture is not mirrored from inside.
pub fn build_sphere(radius: f32, lat_segments: usize, lon_segments: usize) -> SphereMesh {
    let lat_segments = lat_segments.max(2);
    let lon_segments = lon_segments.max(3);
    let mut vertices = Vec::with_capacity((lat_segments + 1) * (lon_segments + 1));
    let mut indices = Vec::with_capacity(lat_segments * lon_segments * 6);

    for i in 0..=lat_segments {
        let v = i as f32 / lat_segments as f32;
        let phi = FRAC_PI_2 - v * PI;
        let (sin_p, cos_p) = phi.sin_cos();

        for j in 0..=lon_segments {
            let u = 1.0 - j as f32 / lon_segments as f32;
            // u = 0.5 - θ/2π  →  θ = (0.5 - u)·2π
            let theta = (0.5 - u) * TAU;
            let (sin_t, cos_t) = theta.sin_cos();

            vertices.push(SphereVertex {
                position: [radius * cos_p * sin_t, radius * sin_p, radius * cos_p * cos_t],
                uv: [u, v],
            });
        }
    }

    let row = lon_segments as u32 + 1;
    for i in 0..lat_segments as u32 {
        for j in 0..lon_segments as u32 {
            let a = i * row + j;
            let b = a + row;
            indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }

    SphereMesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_segments() {
        let m = build_sphere(200.0, 32, 64);
        assert_eq!(m.vertices.len(), 33 * 65);
        assert_eq!(m.indices.len(), 32 * 64 * 6);
        let max = *m.indices.iter().max().unwrap() as usize;
        assert!(max < m.vertices.len());
    }

    #[test]
    fn vertices_lie_on_sphere() {
        for v in build_sphere(5.0, 8, 16).vertices {
            let [x, y, z] = v.position;
            assert!(((x * x + y * y + z * z).sqrt() - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn image_center_faces_forward() {
        let m = build_sphere(1.0, 2, 4);
        // row 1 is the equator, column 2 is u = 0.5
        let v = m.vertices[5 + 2];
        assert_eq!(v.uv, [0.5, 0.5]);
        assert!((v.position[2] - 1.0).abs() < 1e-6);
    }
}
