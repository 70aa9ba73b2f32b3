use crate::error::PlyError;

#[cfg(feature = "sort_rayon")]
use rayon::prelude::*;

/// Column-major 4x4 matrix.
pub type Mat4 = [f32; 16];

/// Indices emitted per primitive: two triangles over a four-vertex quad.
pub const INDICES_PER_PRIMITIVE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortNode {
    pub depth: f32,
    pub index: u32,
}

/// Inverse of a rigid camera-to-world matrix: transposed rotation and
/// translation `-Rᵀt`.
pub fn invert_rigid(m: &Mat4) -> Mat4 {
    let mut v = [0.0f32; 16];
    v[0] = m[0];
    v[1] = m[4];
    v[2] = m[8];
    v[4] = m[1];
    v[5] = m[5];
    v[6] = m[9];
    v[8] = m[2];
    v[9] = m[6];
    v[10] = m[10];

    let (tx, ty, tz) = (m[12], m[13], m[14]);
    v[12] = -(v[0] * tx + v[4] * ty + v[8] * tz);
    v[13] = -(v[1] * tx + v[5] * ty + v[9] * tz);
    v[14] = -(v[2] * tx + v[6] * ty + v[10] * tz);
    v[15] = 1.0;
    v
}

/// Third row of `view * model`; dotting it with `(x, y, z, 1)` gives the
/// view-space z of a model-space point.
pub fn view_z_row(view: &Mat4, model: &Mat4) -> [f32; 4] {
    let mut row = [0.0f32; 4];
    for (c, r) in row.iter_mut().enumerate() {
        let m = &model[c * 4..c * 4 + 4];
        *r = view[2] * m[0] + view[6] * m[1] + view[10] * m[2] + view[14] * m[3];
    }
    row
}

fn check_sizes(centers: &[f32], out_len: usize) -> Result<usize, PlyError> {
    if centers.len() % 3 != 0 {
        return Err(PlyError::input(format!(
            "{} center floats is not a multiple of 3",
            centers.len()
        )));
    }
    let count = centers.len() / 3;
    if count
        .checked_mul(4)
        .is_none_or(|v| u32::try_from(v).is_err())
    {
        return Err(PlyError::input(format!("{count} primitives overflow 32-bit indices")));
    }
    if out_len != count * INDICES_PER_PRIMITIVE {
        return Err(PlyError::input(format!(
            "index buffer holds {out_len} values, {count} primitives need {}",
            count * INDICES_PER_PRIMITIVE
        )));
    }
    Ok(count)
}

/// Back-to-front ordering of splat quads. The node vector is kept between
/// calls so per-frame sorting doesn't reallocate.
#[derive(Debug, Default)]
pub struct DepthSorter {
    nodes: Vec<SortNode>,
}

impl DepthSorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth-ranked order of the last successful sort, farthest first.
    pub fn nodes(&self) -> &[SortNode] {
        &self.nodes
    }

    /// Writes `[b, b+1, b+2, b, b+2, b+3]` with `b = 4 * index` for every
    /// center, farthest from the camera first.
    ///
    /// `out` must hold exactly 6 values per center. On a size error nothing
    /// is written.
    pub fn sort_into(&mut self, centers: &[f32], model: &Mat4, camera: &Mat4, out: &mut [u32]) -> Result<(), PlyError> {
        let count = check_sizes(centers, out.len())?;

        let z = view_z_row(&invert_rigid(camera), model);
        let depth = |i: usize, c: &[f32]| SortNode {
            depth: -(z[0] * c[0] + z[1] * c[1] + z[2] * c[2] + z[3]),
            index: i as u32,
        };

        self.nodes.clear();
        self.nodes.reserve(count);

        #[cfg(feature = "sort_rayon")]
        {
            centers
                .par_chunks_exact(3)
                .enumerate()
                .map(|(i, c)| depth(i, c))
                .collect_into_vec(&mut self.nodes);
            self.nodes.par_sort_unstable_by(|a, b| b.depth.total_cmp(&a.depth));
        }
        #[cfg(not(feature = "sort_rayon"))]
        {
            self.nodes
                .extend(centers.chunks_exact(3).enumerate().map(|(i, c)| depth(i, c)));
            self.nodes.sort_unstable_by(|a, b| b.depth.total_cmp(&a.depth));
        }

        for (node, quad) in self.nodes.iter().zip(out.chunks_exact_mut(INDICES_PER_PRIMITIVE)) {
            let b = node.index * 4;
            quad.copy_from_slice(&[b, b + 1, b + 2, b, b + 2, b + 3]);
        }
        Ok(())
    }
}

/// One-shot [`DepthSorter::sort_into`] into a fresh buffer.
pub fn sort_primitives(centers: &[f32], model: &Mat4, camera: &Mat4) -> Result<Vec<u32>, PlyError> {
    let mut out = vec![0u32; centers.len() / 3 * INDICES_PER_PRIMITIVE];
    DepthSorter::new().sort_into(centers, model, camera, &mut out)?;
    Ok(out)
}
