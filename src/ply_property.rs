use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PlyError;
use crate::ply_header::{ElementDescriptor, PlyEncoding, PlyHeader, PropertyKind, ScalarType};

/// Typed storage for one property column (or one interleaved group of them).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyBuffer {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! each_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            PropertyBuffer::Int8($v) => $body,
            PropertyBuffer::UInt8($v) => $body,
            PropertyBuffer::Int16($v) => $body,
            PropertyBuffer::UInt16($v) => $body,
            PropertyBuffer::Int32($v) => $body,
            PropertyBuffer::UInt32($v) => $body,
            PropertyBuffer::Float32($v) => $body,
            PropertyBuffer::Float64($v) => $body,
        }
    };
}

impl PropertyBuffer {
    pub fn with_capacity(ty: ScalarType, capacity: usize) -> Self {
        match ty {
            ScalarType::Int8 => PropertyBuffer::Int8(Vec::with_capacity(capacity)),
            ScalarType::UInt8 => PropertyBuffer::UInt8(Vec::with_capacity(capacity)),
            ScalarType::Int16 => PropertyBuffer::Int16(Vec::with_capacity(capacity)),
            ScalarType::UInt16 => PropertyBuffer::UInt16(Vec::with_capacity(capacity)),
            ScalarType::Int32 => PropertyBuffer::Int32(Vec::with_capacity(capacity)),
            ScalarType::UInt32 => PropertyBuffer::UInt32(Vec::with_capacity(capacity)),
            ScalarType::Float32 => PropertyBuffer::Float32(Vec::with_capacity(capacity)),
            ScalarType::Float64 => PropertyBuffer::Float64(Vec::with_capacity(capacity)),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            PropertyBuffer::Int8(_) => ScalarType::Int8,
            PropertyBuffer::UInt8(_) => ScalarType::UInt8,
            PropertyBuffer::Int16(_) => ScalarType::Int16,
            PropertyBuffer::UInt16(_) => ScalarType::UInt16,
            PropertyBuffer::Int32(_) => ScalarType::Int32,
            PropertyBuffer::UInt32(_) => ScalarType::UInt32,
            PropertyBuffer::Float32(_) => ScalarType::Float32,
            PropertyBuffer::Float64(_) => ScalarType::Float64,
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        each_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.scalar_type().size_bytes()
    }

    // Sources hand out values already in range for `ty`, and every PLY
    // scalar is exact in f64, so the casts never truncate.
    fn push(&mut self, v: f64) {
        match self {
            PropertyBuffer::Int8(b) => b.push(v as i8),
            PropertyBuffer::UInt8(b) => b.push(v as u8),
            PropertyBuffer::Int16(b) => b.push(v as i16),
            PropertyBuffer::UInt16(b) => b.push(v as u16),
            PropertyBuffer::Int32(b) => b.push(v as i32),
            PropertyBuffer::UInt32(b) => b.push(v as u32),
            PropertyBuffer::Float32(b) => b.push(v as f32),
            PropertyBuffer::Float64(b) => b.push(v),
        }
    }

    /// Numeric conversion of every value to `f32`.
    pub fn to_f32(&self) -> Vec<f32> {
        each_buffer!(self, v => v.iter().map(|&x| x as f32).collect())
    }

    pub fn as_slice<T: PlyScalar>(&self) -> Option<&[T]> {
        T::slice(self)
    }
}

/// Rust scalar types that have a PLY storage variant.
pub trait PlyScalar: Copy + Send + Sync + 'static {
    const TYPE: ScalarType;

    fn slice(buf: &PropertyBuffer) -> Option<&[Self]>;

    fn into_buffer(values: Vec<Self>) -> PropertyBuffer;
}

macro_rules! impl_ply_scalar {
    ($t:ty, $variant:ident) => {
        impl PlyScalar for $t {
            const TYPE: ScalarType = ScalarType::$variant;

            fn slice(buf: &PropertyBuffer) -> Option<&[Self]> {
                match buf {
                    PropertyBuffer::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn into_buffer(values: Vec<Self>) -> PropertyBuffer {
                PropertyBuffer::$variant(values)
            }
        }
    };
}

impl_ply_scalar!(i8, Int8);
impl_ply_scalar!(u8, UInt8);
impl_ply_scalar!(i16, Int16);
impl_ply_scalar!(u16, UInt16);
impl_ply_scalar!(i32, Int32);
impl_ply_scalar!(u32, UInt32);
impl_ply_scalar!(f32, Float32);
impl_ply_scalar!(f64, Float64);

/// How a requested list property is laid out per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListLayout {
    /// Every record must carry exactly this many items.
    Fixed(usize),
    /// Records are kept as a length-prefixed stream.
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub element: String,
    /// Accepted property names, first match wins.
    pub properties: Vec<String>,
    pub layout: ListLayout,
}

impl ListRequest {
    pub fn fixed(element: &str, properties: &[&str], len: usize) -> Self {
        ListRequest {
            element: element.to_string(),
            properties: properties.iter().map(|s| s.to_string()).collect(),
            layout: ListLayout::Fixed(len),
        }
    }

    pub fn variable(element: &str, properties: &[&str]) -> Self {
        ListRequest {
            element: element.to_string(),
            properties: properties.iter().map(|s| s.to_string()).collect(),
            layout: ListLayout::Variable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U16,
    U32,
}

impl IndexWidth {
    pub fn size_bytes(&self) -> usize {
        match self {
            IndexWidth::U16 => 2,
            IndexWidth::U32 => 4,
        }
    }

    fn for_item(ty: ScalarType) -> Option<Self> {
        match ty {
            ScalarType::Int16 | ScalarType::UInt16 => Some(IndexWidth::U16),
            ScalarType::Int32 | ScalarType::UInt32 => Some(IndexWidth::U32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListData {
    /// `items.len() == records * len`.
    Fixed {
        len: usize,
        records: usize,
        items: PropertyBuffer,
    },
    /// `[u8 run length][run length × little-endian index]` per record.
    Records {
        width: IndexWidth,
        records: usize,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Default)]
pub struct Extracted {
    /// Requested scalar properties of the primary element, by name.
    pub properties: HashMap<String, PropertyBuffer>,
    /// Requested list properties, keyed by the request's element name.
    pub lists: HashMap<String, ListData>,
}

trait ScalarSource {
    fn read(&mut self, ty: ScalarType) -> Result<f64, PlyError>;

    fn skip(&mut self, ty: ScalarType) -> Result<(), PlyError> {
        self.read(ty).map(|_| ())
    }
}

struct BinarySource<'a> {
    bytes: &'a [u8],
    pos: usize,
    little: bool,
}

macro_rules! read_endian {
    ($b:expr, $t:ty, $n:literal, $little:expr) => {{
        let mut arr = [0u8; $n];
        arr.copy_from_slice($b);
        if $little { <$t>::from_le_bytes(arr) } else { <$t>::from_be_bytes(arr) }
    }};
}

impl<'a> BinarySource<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], PlyError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| PlyError::bounds("out of bounds while reading binary data"))?;
        let b = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(b)
    }
}

impl ScalarSource for BinarySource<'_> {
    fn read(&mut self, ty: ScalarType) -> Result<f64, PlyError> {
        let little = self.little;
        let b = self.take(ty.size_bytes())?;
        let v = match ty {
            ScalarType::Int8 => b[0] as i8 as f64,
            ScalarType::UInt8 => b[0] as f64,
            ScalarType::Int16 => read_endian!(b, i16, 2, little) as f64,
            ScalarType::UInt16 => read_endian!(b, u16, 2, little) as f64,
            ScalarType::Int32 => read_endian!(b, i32, 4, little) as f64,
            ScalarType::UInt32 => read_endian!(b, u32, 4, little) as f64,
            ScalarType::Float32 => read_endian!(b, f32, 4, little) as f64,
            ScalarType::Float64 => read_endian!(b, f64, 8, little),
        };
        Ok(v)
    }

    fn skip(&mut self, ty: ScalarType) -> Result<(), PlyError> {
        self.take(ty.size_bytes()).map(|_| ())
    }
}

struct AsciiSource<'a> {
    tokens: std::str::SplitAsciiWhitespace<'a>,
}

impl ScalarSource for AsciiSource<'_> {
    fn read(&mut self, ty: ScalarType) -> Result<f64, PlyError> {
        let tok = self
            .tokens
            .next()
            .ok_or_else(|| PlyError::bounds("ascii body ended before all elements were read"))?;
        let v: f64 = tok
            .parse()
            .map_err(|_| PlyError::input(format!("failed to parse \"{tok}\" as {}", ty.as_str())))?;
        if let Some((lo, hi)) = ty.integer_range() {
            if v.fract() != 0.0 {
                return Err(PlyError::input(format!("\"{tok}\" is not an integer")));
            }
            if v < lo || v > hi {
                return Err(PlyError::input(format!("{tok} is out of range for {}", ty.as_str())));
            }
        }
        Ok(v)
    }
}

enum Action {
    Skip,
    Scalar(usize),
    List(usize),
}

struct ListSlot<'r> {
    request: &'r ListRequest,
    count_ty: ScalarType,
    item_ty: ScalarType,
    data: ListData,
}

fn read_list_len(src: &mut dyn ScalarSource, ty: ScalarType) -> Result<usize, PlyError> {
    let n = src.read(ty)?;
    if n < 0.0 {
        return Err(PlyError::input("negative list length"));
    }
    Ok(n as usize)
}

impl<'r> ListSlot<'r> {
    fn new(
        request: &'r ListRequest,
        element: &ElementDescriptor,
        count_ty: ScalarType,
        item_ty: ScalarType,
        capacity: usize,
    ) -> Result<Self, PlyError> {
        let data = match request.layout {
            ListLayout::Fixed(len) => ListData::Fixed {
                len,
                records: 0,
                items: PropertyBuffer::with_capacity(item_ty, capacity.saturating_mul(len)),
            },
            ListLayout::Variable => {
                if count_ty.size_bytes() != 1 {
                    return Err(PlyError::unsupported(format!(
                        "{}: run length must be a single byte, got {}",
                        element.name,
                        count_ty.as_str()
                    )));
                }
                let width = IndexWidth::for_item(item_ty).ok_or_else(|| {
                    PlyError::unsupported(format!(
                        "{}: strip indices must be 16 or 32 bit integers, got {}",
                        element.name,
                        item_ty.as_str()
                    ))
                })?;
                ListData::Records {
                    width,
                    records: 0,
                    bytes: Vec::with_capacity(capacity),
                }
            }
        };
        Ok(ListSlot {
            request,
            count_ty,
            item_ty,
            data,
        })
    }

    fn read_record(&mut self, src: &mut dyn ScalarSource) -> Result<(), PlyError> {
        let n = read_list_len(src, self.count_ty)?;
        match &mut self.data {
            ListData::Fixed { len, records, items } => {
                if n != *len {
                    return Err(PlyError::schema(format!(
                        "{}: record {} has {n} items, expected {len}",
                        self.request.element, records
                    )));
                }
                for _ in 0..n {
                    items.push(src.read(self.item_ty)?);
                }
                *records += 1;
            }
            ListData::Records { width, records, bytes } => {
                let run = u8::try_from(n).map_err(|_| {
                    PlyError::bounds(format!(
                        "{}: record {records} has {n} items, a run holds at most 255",
                        self.request.element
                    ))
                })?;
                bytes.push(run);
                for _ in 0..n {
                    let v = src.read(self.item_ty)? as i64;
                    let out_of_range = || {
                        PlyError::bounds(format!(
                            "{}: strip index {v} in record {records} is not a valid vertex index",
                            self.request.element
                        ))
                    };
                    match width {
                        IndexWidth::U16 => {
                            let i = u16::try_from(v).map_err(|_| out_of_range())?;
                            bytes.extend_from_slice(&i.to_le_bytes());
                        }
                        IndexWidth::U32 => {
                            let i = u32::try_from(v).map_err(|_| out_of_range())?;
                            bytes.extend_from_slice(&i.to_le_bytes());
                        }
                    }
                }
                *records += 1;
            }
        }
        Ok(())
    }
}

/// Walks the whole body and binds one buffer per requested property.
///
/// Requested names that the file doesn't carry are simply absent from the
/// result.
pub fn extract(
    bytes: &[u8],
    header: &PlyHeader,
    element: &str,
    scalars: &[String],
    lists: &[ListRequest],
) -> Result<Extracted, PlyError> {
    let body = bytes
        .get(header.data_offset..)
        .ok_or_else(|| PlyError::bounds("header runs past the end of the buffer"))?;

    let mut binary;
    let mut ascii;
    let src: &mut dyn ScalarSource = match header.encoding {
        PlyEncoding::Ascii => {
            let text = core::str::from_utf8(body).map_err(|_| PlyError::input("ascii body is not valid utf-8"))?;
            ascii = AsciiSource {
                tokens: text.split_ascii_whitespace(),
            };
            &mut ascii
        }
        PlyEncoding::BinaryLittleEndian | PlyEncoding::BinaryBigEndian => {
            binary = BinarySource {
                bytes: body,
                pos: 0,
                little: header.encoding == PlyEncoding::BinaryLittleEndian,
            };
            &mut binary
        }
    };

    let mut scalar_slots: Vec<(String, PropertyBuffer)> = Vec::new();
    let mut list_slots: Vec<ListSlot> = Vec::new();

    for el in &header.elements {
        // Rows without properties take no body bytes.
        if el.properties.is_empty() {
            continue;
        }
        // A header can claim more rows than the body could possibly hold.
        let capacity = el.count.min(body.len());

        let mut actions = Vec::with_capacity(el.properties.len());
        for p in &el.properties {
            let action = match p.kind {
                PropertyKind::Scalar(ty) if el.name == element && scalars.iter().any(|n| *n == p.name) => {
                    scalar_slots.push((p.name.clone(), PropertyBuffer::with_capacity(ty, capacity)));
                    Action::Scalar(scalar_slots.len() - 1)
                }
                PropertyKind::List { count_ty, item_ty } => {
                    let request = lists.iter().find(|r| {
                        r.element == el.name
                            && r.properties.iter().any(|n| *n == p.name)
                            && !list_slots.iter().any(|s| s.request.element == r.element)
                    });
                    match request {
                        Some(request) => {
                            list_slots.push(ListSlot::new(request, el, count_ty, item_ty, capacity)?);
                            Action::List(list_slots.len() - 1)
                        }
                        None => Action::Skip,
                    }
                }
                PropertyKind::Scalar(_) => Action::Skip,
            };
            actions.push(action);
        }

        for _ in 0..el.count {
            for (p, action) in el.properties.iter().zip(&actions) {
                match (action, p.kind) {
                    (Action::Scalar(slot), PropertyKind::Scalar(ty)) => {
                        let v = src.read(ty)?;
                        scalar_slots[*slot].1.push(v);
                    }
                    (Action::List(slot), _) => list_slots[*slot].read_record(src)?,
                    (_, PropertyKind::Scalar(ty)) => src.skip(ty)?,
                    (_, PropertyKind::List { count_ty, item_ty }) => {
                        let n = read_list_len(src, count_ty)?;
                        for _ in 0..n {
                            src.skip(item_ty)?;
                        }
                    }
                }
            }
        }
    }

    let mut out = Extracted::default();
    for (name, buf) in scalar_slots {
        log::debug!("bound {element}.{name}: {} x {}", buf.len(), buf.scalar_type().as_str());
        out.properties.insert(name, buf);
    }
    for name in scalars {
        if !out.properties.contains_key(name) {
            log::debug!("requested property {element}.{name} not present");
        }
    }
    for slot in list_slots {
        out.lists.insert(slot.request.element.clone(), slot.data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ply_header::parse_header;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ascii_body_binds_requested_and_skips_the_rest() {
        let text = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty uchar red\n\
property float y\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n\
1.5 10 -2\n3 20 4\n3 0 1 1\n";
        let bytes = text.as_bytes();
        let header = parse_header(bytes).unwrap();
        let faces = ListRequest::fixed("face", &["vertex_indices"], 3);
        let out = extract(bytes, &header, "vertex", &names(&["x", "y", "nx"]), &[faces]).unwrap();

        assert_eq!(out.properties["x"], PropertyBuffer::Float32(vec![1.5, 3.0]));
        assert_eq!(out.properties["y"], PropertyBuffer::Float32(vec![-2.0, 4.0]));
        assert!(!out.properties.contains_key("red"));
        assert!(!out.properties.contains_key("nx"));
        assert_eq!(
            out.lists["face"],
            ListData::Fixed {
                len: 3,
                records: 1,
                items: PropertyBuffer::Int32(vec![0, 1, 1]),
            }
        );
    }

    #[test]
    fn big_endian_scalars_decode() {
        let mut bytes = b"ply\nformat binary_big_endian 1.0\nelement vertex 1\nproperty short a\nproperty float b\nend_header\n".to_vec();
        bytes.extend_from_slice(&(-3i16).to_be_bytes());
        bytes.extend_from_slice(&0.25f32.to_be_bytes());
        let header = parse_header(&bytes).unwrap();
        let out = extract(&bytes, &header, "vertex", &names(&["a", "b"]), &[]).unwrap();
        assert_eq!(out.properties["a"], PropertyBuffer::Int16(vec![-3]));
        assert_eq!(out.properties["b"], PropertyBuffer::Float32(vec![0.25]));
    }

    #[test]
    fn truncated_binary_body_is_bounds_error() {
        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 2\nproperty float x\nend_header\n".to_vec();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        let header = parse_header(&bytes).unwrap();
        let err = extract(&bytes, &header, "vertex", &names(&["x"]), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn non_triangle_face_is_schema_error() {
        let text = "ply\nformat ascii 1.0\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n4 0 1 2 3\n";
        let header = parse_header(text.as_bytes()).unwrap();
        let faces = ListRequest::fixed("face", &["vertex_indices"], 3);
        let err = extract(text.as_bytes(), &header, "vertex", &[], &[faces]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn variable_records_are_rewritten_little_endian() {
        let mut bytes = b"ply\nformat binary_big_endian 1.0\nelement tristrips 1\nproperty list uchar ushort vertex_indices\nend_header\n".to_vec();
        bytes.push(2);
        bytes.extend_from_slice(&7u16.to_be_bytes());
        bytes.extend_from_slice(&258u16.to_be_bytes());
        let header = parse_header(&bytes).unwrap();
        let strips = ListRequest::variable("tristrips", &["vertex_indices"]);
        let out = extract(&bytes, &header, "vertex", &[], &[strips]).unwrap();
        assert_eq!(
            out.lists["tristrips"],
            ListData::Records {
                width: IndexWidth::U16,
                records: 1,
                bytes: vec![2, 7, 0, 2, 1],
            }
        );
    }

    fn ascii_strips(record: &str) -> Result<Extracted, PlyError> {
        let text = format!(
            "ply\nformat ascii 1.0\nelement tristrips 1\nproperty list uchar int vertex_indices\nend_header\n{record}\n"
        );
        let header = parse_header(text.as_bytes()).unwrap();
        let strips = ListRequest::variable("tristrips", &["vertex_indices"]);
        extract(text.as_bytes(), &header, "vertex", &[], &[strips])
    }

    #[test]
    fn longest_ascii_run_fits_and_longer_is_rejected() {
        let full = format!("255{}", " 1".repeat(255));
        match &ascii_strips(&full).unwrap().lists["tristrips"] {
            ListData::Records { records, bytes, .. } => {
                assert_eq!(*records, 1);
                assert_eq!(bytes[0], 255);
                assert_eq!(bytes.len(), 1 + 255 * 4);
            }
            other => panic!("unexpected list data {other:?}"),
        }

        let over = format!("256{}", " 0".repeat(256));
        assert!(ascii_strips(&over).is_err());
    }

    #[test]
    fn negative_strip_index_is_bounds_error() {
        let err = ascii_strips("3 0 -1 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn ascii_integers_outside_their_type_fail() {
        for value in ["300", "-5"] {
            let text = format!(
                "ply\nformat ascii 1.0\nelement vertex 1\nproperty uchar red\nend_header\n{value}\n"
            );
            let header = parse_header(text.as_bytes()).unwrap();
            let err = extract(text.as_bytes(), &header, "vertex", &names(&["red"]), &[]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Input);
        }
    }

    #[test]
    fn propertyless_elements_are_not_walked() {
        let text = "ply\nformat binary_little_endian 1.0\nelement pad 1000000000000\nend_header\n";
        let header = parse_header(text.as_bytes()).unwrap();
        let out = extract(text.as_bytes(), &header, "vertex", &names(&["x"]), &[]).unwrap();
        assert!(out.properties.is_empty());
    }

    #[test]
    fn float_strip_indices_are_unsupported() {
        let text = "ply\nformat ascii 1.0\nelement tristrips 1\nproperty list uchar float vertex_indices\nend_header\n1 0\n";
        let header = parse_header(text.as_bytes()).unwrap();
        let strips = ListRequest::variable("tristrips", &["vertex_indices"]);
        let err = extract(text.as_bytes(), &header, "vertex", &[], &[strips]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn typed_slice_access() {
        let buf = u16::into_buffer(vec![1, 2, 3]);
        assert_eq!(buf.scalar_type(), ScalarType::UInt16);
        assert_eq!(buf.byte_len(), 6);
        assert_eq!(buf.as_slice::<u16>(), Some(&[1u16, 2, 3][..]));
        assert_eq!(buf.as_slice::<f32>(), None);
        assert_eq!(buf.to_f32(), vec![1.0, 2.0, 3.0]);
    }
}
