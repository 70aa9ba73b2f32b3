use std::collections::HashMap;

use crate::error::PlyError;
use crate::ply_header::ScalarType;
use crate::ply_property::{PlyScalar, PropertyBuffer};

fn interleave<T: PlyScalar>(columns: &[&PropertyBuffer]) -> PropertyBuffer {
    let cols: Vec<&[T]> = columns.iter().filter_map(|c| c.as_slice::<T>()).collect();
    let count = cols.first().map_or(0, |c| c.len());
    let mut out = Vec::with_capacity(count * cols.len());
    for i in 0..count {
        for c in &cols {
            out.push(c[i]);
        }
    }
    T::into_buffer(out)
}

/// Interleaves single-channel columns into one buffer, channels in the order
/// of `names`: `[c0[0], c1[0], .., c0[1], c1[1], ..]`.
///
/// Every column must exist and share one type and one length; anything else
/// is a schema error rather than a partially filled buffer.
pub fn combine_channels<S: AsRef<str>>(
    properties: &HashMap<String, PropertyBuffer>,
    names: &[S],
) -> Result<PropertyBuffer, PlyError> {
    let columns = names
        .iter()
        .map(|n| {
            let n = n.as_ref();
            properties
                .get(n)
                .ok_or_else(|| PlyError::schema(format!("channel \"{n}\" is missing")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let first = columns
        .first()
        .ok_or_else(|| PlyError::schema("no channels to combine"))?;
    let ty = first.scalar_type();
    let count = first.len();

    for (n, c) in names.iter().zip(&columns) {
        if c.scalar_type() != ty {
            return Err(PlyError::schema(format!(
                "channel \"{}\" is {}, expected {}",
                n.as_ref(),
                c.scalar_type().as_str(),
                ty.as_str()
            )));
        }
        if c.len() != count {
            return Err(PlyError::schema(format!(
                "channel \"{}\" has {} values, expected {count}",
                n.as_ref(),
                c.len()
            )));
        }
    }

    Ok(match ty {
        ScalarType::Int8 => interleave::<i8>(&columns),
        ScalarType::UInt8 => interleave::<u8>(&columns),
        ScalarType::Int16 => interleave::<i16>(&columns),
        ScalarType::UInt16 => interleave::<u16>(&columns),
        ScalarType::Int32 => interleave::<i32>(&columns),
        ScalarType::UInt32 => interleave::<u32>(&columns),
        ScalarType::Float32 => interleave::<f32>(&columns),
        ScalarType::Float64 => interleave::<f64>(&columns),
    })
}

fn expand_rgba(channels: usize, src: &[f32], out: &mut Vec<f32>) {
    for px in src.chunks_exact(channels) {
        let rgba = match *px {
            [v] => [v, v, v, 1.0],
            [r, g] => [r, g, 0.0, 1.0],
            [r, g, b] => [r, g, b, 1.0],
            [r, g, b, a] => [r, g, b, a],
            _ => unreachable!("channel count checked by caller"),
        };
        out.extend_from_slice(&rgba);
    }
}

/// Expands 1–4 channel vertex colors to RGBA `f32` in `[0, 1]`.
///
/// The channel count is inferred from the buffer size and `vertex_count`.
/// `uint8` and `uint16` are scaled by their maximum, `float32` is clamped.
pub fn normalize_colors(colors: &PropertyBuffer, vertex_count: usize) -> Result<Vec<f32>, PlyError> {
    let ty = colors.scalar_type();
    if !matches!(ty, ScalarType::UInt8 | ScalarType::UInt16 | ScalarType::Float32) {
        return Err(PlyError::unsupported(format!("{} colors", ty.as_str())));
    }
    if vertex_count == 0 && colors.is_empty() {
        return Ok(Vec::new());
    }
    let width = ty.size_bytes();
    if vertex_count == 0 || colors.byte_len() % (width * vertex_count) != 0 {
        return Err(PlyError::unsupported(format!(
            "{} color bytes don't divide into {vertex_count} vertices",
            colors.byte_len()
        )));
    }
    let channels = colors.byte_len() / (width * vertex_count);
    if !(1..=4).contains(&channels) {
        return Err(PlyError::unsupported(format!("{channels} color channels")));
    }

    let unit: Vec<f32> = match colors {
        PropertyBuffer::UInt8(v) => v.iter().map(|&c| c as f32 / 255.0).collect(),
        PropertyBuffer::UInt16(v) => v.iter().map(|&c| c as f32 / 65535.0).collect(),
        PropertyBuffer::Float32(v) => v.iter().map(|&c| c.clamp(0.0, 1.0)).collect(),
        _ => {
            return Err(PlyError::unsupported(format!(
                "{} color with {channels} channels",
                ty.as_str()
            )));
        }
    };

    let mut out = Vec::with_capacity(vertex_count * 4);
    expand_rgba(channels, &unit, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;

    fn props(entries: Vec<(&str, PropertyBuffer)>) -> HashMap<String, PropertyBuffer> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn interleaves_in_requested_order() {
        let p = props(vec![
            ("x", PropertyBuffer::Float32(vec![1.0, 2.0])),
            ("y", PropertyBuffer::Float32(vec![10.0, 20.0])),
            ("z", PropertyBuffer::Float32(vec![100.0, 200.0])),
        ]);
        let xyz = combine_channels(&p, &["x", "y", "z"]).unwrap();
        assert_eq!(xyz, PropertyBuffer::Float32(vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0]));
        let zx = combine_channels(&p, &["z", "x"]).unwrap();
        assert_eq!(zx, PropertyBuffer::Float32(vec![100.0, 1.0, 200.0, 2.0]));
    }

    #[test]
    fn mismatched_counts_never_produce_data() {
        let p = props(vec![
            ("r", PropertyBuffer::UInt8(vec![1, 2, 3])),
            ("g", PropertyBuffer::UInt8(vec![1, 2])),
        ]);
        let err = combine_channels(&p, &["r", "g"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn mismatched_types_and_missing_names_are_rejected() {
        let p = props(vec![
            ("r", PropertyBuffer::UInt8(vec![1])),
            ("g", PropertyBuffer::UInt16(vec![1])),
        ]);
        assert_eq!(combine_channels(&p, &["r", "g"]).unwrap_err().kind(), ErrorKind::Schema);
        assert_eq!(combine_channels(&p, &["r", "b"]).unwrap_err().kind(), ErrorKind::Schema);
        assert_eq!(combine_channels::<&str>(&p, &[]).unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn gray_uint8_expands_to_opaque_rgb() {
        let rgba = normalize_colors(&PropertyBuffer::UInt8(vec![128]), 1).unwrap();
        let v = 128.0 / 255.0;
        assert_eq!(rgba.len(), 4);
        assert_relative_eq!(rgba[0], v, epsilon = 1e-6);
        assert_relative_eq!(rgba[1], v, epsilon = 1e-6);
        assert_relative_eq!(rgba[2], v, epsilon = 1e-6);
        assert_relative_eq!(rgba[3], 1.0);
    }

    #[test]
    fn channel_count_follows_buffer_size() {
        let two = normalize_colors(&PropertyBuffer::UInt16(vec![65535, 0]), 1).unwrap();
        assert_eq!(two, vec![1.0, 0.0, 0.0, 1.0]);

        let three = normalize_colors(&PropertyBuffer::Float32(vec![0.5, 2.0, -1.0, 0.1, 0.2, 0.3]), 2).unwrap();
        assert_eq!(three, vec![0.5, 1.0, 0.0, 1.0, 0.1, 0.2, 0.3, 1.0]);

        let four = normalize_colors(&PropertyBuffer::UInt8(vec![255, 0, 255, 0]), 1).unwrap();
        assert_eq!(four, vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn unsupported_types_and_channel_counts_fail() {
        let five = PropertyBuffer::UInt8(vec![0; 5]);
        assert_eq!(normalize_colors(&five, 1).unwrap_err().kind(), ErrorKind::UnsupportedType);
        let ragged = PropertyBuffer::UInt8(vec![0; 5]);
        assert_eq!(normalize_colors(&ragged, 2).unwrap_err().kind(), ErrorKind::UnsupportedType);
        let ints = PropertyBuffer::Int32(vec![0; 3]);
        assert_eq!(normalize_colors(&ints, 1).unwrap_err().kind(), ErrorKind::UnsupportedType);
        assert_eq!(normalize_colors(&ints, 0).unwrap_err().kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn no_vertices_means_no_colors() {
        assert!(normalize_colors(&PropertyBuffer::UInt8(Vec::new()), 0).unwrap().is_empty());
        let stray = PropertyBuffer::UInt8(vec![1]);
        assert_eq!(normalize_colors(&stray, 0).unwrap_err().kind(), ErrorKind::UnsupportedType);
    }
}
