use crate::error::PlyError;

/// Below this accumulated length a vertex normal is left as is.
const NORMAL_EPSILON: f32 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn center(&self) -> [f32; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// `[min.x, min.y, min.z, max.x, max.y, max.z]`
    pub fn to_array(&self) -> [f32; 6] {
        let [a, b, c] = self.min;
        let [d, e, f] = self.max;
        [a, b, c, d, e, f]
    }
}

/// Component-wise min/max over flat `xyz` triples. `None` until there is at
/// least one full sample.
pub fn compute_bounds(positions: &[f32]) -> Option<Aabb> {
    let mut points = positions.chunks_exact(3);
    let first = points.next()?;
    let mut min = [first[0], first[1], first[2]];
    let mut max = min;

    for p in points {
        for k in 0..3 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    Some(Aabb { min, max })
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Smooth per-vertex normals from triangle faces.
///
/// Each face adds its unnormalized `(v1 - v0) x (v2 - v0)` to its three
/// corners, so larger faces weigh more. Accumulators are normalized at the
/// end unless they are (near) zero.
pub fn synthesize_normals(positions: &[f32], faces: &[u32]) -> Result<Vec<f32>, PlyError> {
    let vertex_count = positions.len() / 3;
    let mut normals = vec![0.0f32; vertex_count * 3];

    let vertex = |i: u32| -> Result<[f32; 3], PlyError> {
        let i = i as usize;
        if i >= vertex_count {
            return Err(PlyError::bounds(format!(
                "face index {i} out of range for {vertex_count} vertices"
            )));
        }
        Ok([positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]])
    };

    for tri in faces.chunks_exact(3) {
        let v0 = vertex(tri[0])?;
        let v1 = vertex(tri[1])?;
        let v2 = vertex(tri[2])?;
        let n = cross(sub(v1, v0), sub(v2, v0));

        for &i in tri {
            let acc = &mut normals[i as usize * 3..i as usize * 3 + 3];
            acc[0] += n[0];
            acc[1] += n[1];
            acc[2] += n[2];
        }
    }

    for n in normals.chunks_exact_mut(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > NORMAL_EPSILON {
            n[0] /= len;
            n[1] /= len;
            n[2] /= len;
        }
    }
    Ok(normals)
}
