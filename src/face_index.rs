use crate::error::PlyError;
use crate::ply_property::{IndexWidth, PlyScalar, PropertyBuffer};

fn widen<T>(src: &[T]) -> Result<Vec<u32>, PlyError>
where
    T: PlyScalar + TryInto<u32> + std::fmt::Display,
{
    src.iter()
        .map(|&i| {
            i.try_into()
                .map_err(|_| PlyError::bounds(format!("face index {i} is not a valid vertex index")))
        })
        .collect()
}

/// Widens triangle indices of any integer encoding to `u32`, preserving
/// order. Negative indices are rejected.
pub fn widen_face_indices(indices: &PropertyBuffer) -> Result<Vec<u32>, PlyError> {
    match indices {
        PropertyBuffer::Int8(v) => widen(v),
        PropertyBuffer::UInt8(v) => widen(v),
        PropertyBuffer::Int16(v) => widen(v),
        PropertyBuffer::UInt16(v) => widen(v),
        PropertyBuffer::Int32(v) => widen(v),
        PropertyBuffer::UInt32(v) => Ok(v.clone()),
        other => Err(PlyError::unsupported(format!(
            "{} face indices",
            other.scalar_type().as_str()
        ))),
    }
}

fn read_index(bytes: &[u8], at: usize, width: IndexWidth) -> u32 {
    match width {
        IndexWidth::U16 => u16::from_le_bytes([bytes[at], bytes[at + 1]]) as u32,
        IndexWidth::U32 => u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]),
    }
}

/// Expands a stream of `[u8 run length][run length × index]` records into
/// `[len, i0, i1, .., len, i0, ..]`.
///
/// The stream is walked twice: once to validate every record against the
/// buffer and size the output, once to emit. A record that runs past the end
/// fails the whole decode.
pub fn decode_strip_records(bytes: &[u8], width: IndexWidth) -> Result<Vec<u32>, PlyError> {
    let w = width.size_bytes();

    let mut total = 0usize;
    let mut records = 0usize;
    let mut pos = 0usize;
    while pos < bytes.len() {
        let run = bytes[pos] as usize;
        let end = pos + 1 + run * w;
        if end > bytes.len() {
            return Err(PlyError::bounds(format!(
                "strip record {records} needs {} bytes at offset {pos}, {} left",
                1 + run * w,
                bytes.len() - pos
            )));
        }
        total += 1 + run;
        records += 1;
        pos = end;
    }

    let mut out = Vec::with_capacity(total);
    let mut pos = 0usize;
    while pos < bytes.len() {
        let run = bytes[pos] as usize;
        out.push(run as u32);
        pos += 1;
        for _ in 0..run {
            out.push(read_index(bytes, pos, width));
            pos += w;
        }
    }
    debug_assert_eq!(out.len(), total);
    Ok(out)
}

/// Iterates the records of a decoded strip sequence.
pub fn strip_runs(decoded: &[u32]) -> StripRuns<'_> {
    StripRuns { rest: decoded }
}

pub struct StripRuns<'a> {
    rest: &'a [u32],
}

impl<'a> Iterator for StripRuns<'a> {
    type Item = &'a [u32];

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, tail) = self.rest.split_first()?;
        let len = (len as usize).min(tail.len());
        let (run, rest) = tail.split_at(len);
        self.rest = rest;
        Some(run)
    }
}
