use serde::{Deserialize, Serialize};

/// Zeroth-order real spherical harmonic constant.
pub const SH_C0: f32 = 0.282_094_8;

/// Degree assumed when a splat file carries no `f_rest_*` coefficients.
pub const DEFAULT_SH_DEGREE: u32 = 3;

/// Higher-order coefficients for degree 3: 15 per color channel.
pub const MAX_REST_COEFFS: usize = 45;

pub fn f_dc_names() -> Vec<String> {
    (0..3).map(|i| format!("f_dc_{i}")).collect()
}

pub fn f_rest_names() -> Vec<String> {
    (0..MAX_REST_COEFFS).map(|i| format!("f_rest_{i}")).collect()
}

pub fn scale_names() -> Vec<String> {
    (0..3).map(|i| format!("scale_{i}")).collect()
}

/// `rot_0..rot_3`, stored as (w, x, y, z).
pub fn rot_names() -> Vec<String> {
    (0..4).map(|i| format!("rot_{i}")).collect()
}

/// Every vertex property a splat load asks for: position, opacity, DC
/// color, scale, rotation and the higher-order coefficients.
pub fn splat_property_names() -> Vec<String> {
    let mut names: Vec<String> = ["x", "y", "z", "opacity"].iter().map(|s| s.to_string()).collect();
    names.extend(f_dc_names());
    names.extend(scale_names());
    names.extend(rot_names());
    names.extend(f_rest_names());
    names
}

/// `floor(sqrt(rest / 3 + 1)) - 1`, or `None` when no coefficients exist.
pub fn sh_degree_from_rest_count(rest_count: usize) -> Option<u32> {
    if rest_count == 0 {
        return None;
    }
    let per_channel = rest_count / 3;
    let root = ((per_channel + 1) as f64).sqrt().floor() as u32;
    Some(root - 1)
}

/// Optional post-processing of raw splat attributes. Everything is off by
/// default so the raw file values pass through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplatActivation {
    /// `exp` of the stored log scales.
    pub exp_scale: bool,
    /// `sigmoid` of the stored logit opacity.
    pub sigmoid_opacity: bool,
    pub normalize_rotation: bool,
    /// Emit the 6-float upper triangle of each 3D covariance.
    pub covariance: bool,
    /// Emit `0.5 + SH_C0 * f_dc` as base RGB.
    pub base_color: bool,
}

// The tanh form stays finite for any logit.
fn sigmoid(x: f32) -> f32 {
    0.5 * (1.0 + (0.5 * x).tanh())
}

pub fn activate_opacity(logits: &[f32]) -> Vec<f32> {
    logits.iter().copied().map(sigmoid).collect()
}

pub fn activate_scale(log_scales: &[f32]) -> Vec<f32> {
    log_scales.iter().map(|s| s.exp()).collect()
}

/// Unit (w, x, y, z) quaternion. A zero quaternion is returned unchanged.
fn unit_quat(q: [f32; 4]) -> [f32; 4] {
    let len = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    if len > 0.0 { q.map(|c| c / len) } else { q }
}

fn wxyz_at(chunk: &[f32]) -> [f32; 4] {
    [chunk[0], chunk[1], chunk[2], chunk[3]]
}

/// Normalizes interleaved (w, x, y, z) quaternions.
pub fn normalize_rotations(wxyz: &[f32]) -> Vec<f32> {
    wxyz.chunks_exact(4).flat_map(|q| unit_quat(wxyz_at(q))).collect()
}

/// Row-major rotation matrix of a unit quaternion.
fn rotation_matrix([w, x, y, z]: [f32; 4]) -> [[f32; 3]; 3] {
    [
        [1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z), 2.0 * (x * z + w * y)],
        [2.0 * (x * y + w * z), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x)],
        [2.0 * (x * z - w * y), 2.0 * (y * z + w * x), 1.0 - 2.0 * (x * x + y * y)],
    ]
}

/// `R S Sᵀ Rᵀ` as `[m11, m12, m13, m22, m23, m33]`.
pub fn covariance_from_quat_scale(wxyz: [f32; 4], scale: [f32; 3]) -> [f32; 6] {
    let r = rotation_matrix(unit_quat(wxyz));
    let var = scale.map(|s| s * s);
    let m = |i: usize, j: usize| (0..3).map(|k| r[i][k] * r[j][k] * var[k]).sum::<f32>();
    [m(0, 0), m(0, 1), m(0, 2), m(1, 1), m(1, 2), m(2, 2)]
}

/// Covariances for interleaved log scales (3N) and rotations (4N).
pub fn covariances(log_scales: &[f32], wxyz: &[f32]) -> Vec<f32> {
    log_scales
        .chunks_exact(3)
        .zip(wxyz.chunks_exact(4))
        .flat_map(|(s, q)| covariance_from_quat_scale(wxyz_at(q), [s[0].exp(), s[1].exp(), s[2].exp()]))
        .collect()
}

pub fn dc_to_rgb(f_dc: &[f32]) -> Vec<f32> {
    f_dc.iter().map(|&f| (0.5 + SH_C0 * f).clamp(0.0, 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn property_set_has_58_names() {
        let names = splat_property_names();
        assert_eq!(names.len(), 58);
        assert_eq!(&names[..4], &["x", "y", "z", "opacity"]);
        assert_eq!(names.last().map(String::as_str), Some("f_rest_44"));
    }

    #[test]
    fn sh_degree_from_coefficient_count() {
        assert_eq!(sh_degree_from_rest_count(45), Some(3));
        assert_eq!(sh_degree_from_rest_count(24), Some(2));
        assert_eq!(sh_degree_from_rest_count(9), Some(1));
        assert_eq!(sh_degree_from_rest_count(0), None);
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        let a = activate_opacity(&[0.0, 100.0, -100.0]);
        assert_relative_eq!(a[0], 0.5);
        assert_relative_eq!(a[1], 1.0);
        assert_relative_eq!(a[2], 0.0, epsilon = 1e-30);
    }

    #[test]
    fn identity_rotation_gives_diagonal_covariance() {
        let cov = covariances(&[0.0, 2.0f32.ln(), 3.0f32.ln()], &[2.0, 0.0, 0.0, 0.0]);
        let expected = [1.0, 0.0, 0.0, 4.0, 0.0, 9.0];
        for (c, e) in cov.iter().zip(expected) {
            assert_relative_eq!(*c, e, epsilon = 1e-5);
        }
    }

    #[test]
    fn quarter_turn_about_z_swaps_x_and_y_variance() {
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let cov = covariance_from_quat_scale([h, 0.0, 0.0, h], [1.0, 2.0, 1.0]);
        assert_relative_eq!(cov[0], 4.0, epsilon = 1e-5);
        assert_relative_eq!(cov[3], 1.0, epsilon = 1e-5);
        assert_relative_eq!(cov[1], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_dc_is_mid_gray() {
        assert_eq!(dc_to_rgb(&[0.0, 100.0, -100.0]), vec![0.5, 1.0, 0.0]);
        let q = normalize_rotations(&[0.0, 0.0, 3.0, 4.0]);
        assert_relative_eq!(q[2], 0.6, epsilon = 1e-6);
        assert_relative_eq!(q[3], 0.8, epsilon = 1e-6);
    }
}
