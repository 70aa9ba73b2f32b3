use crate::error::PlyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlyEncoding::Ascii => "ascii",
            PlyEncoding::BinaryLittleEndian => "binary_little_endian",
            PlyEncoding::BinaryBigEndian => "binary_big_endian",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "char" | "int8" => Some(Self::Int8),
            "uchar" | "uint8" => Some(Self::UInt8),
            "short" | "int16" => Some(Self::Int16),
            "ushort" | "uint16" => Some(Self::UInt16),
            "int" | "int32" => Some(Self::Int32),
            "uint" | "uint32" => Some(Self::UInt32),
            "float" | "float32" => Some(Self::Float32),
            "double" | "float64" => Some(Self::Float64),
            _ => None,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }

    /// Inclusive value range of an integer type, `None` for floats.
    pub fn integer_range(&self) -> Option<(f64, f64)> {
        let r = match self {
            ScalarType::Int8 => (i8::MIN as f64, i8::MAX as f64),
            ScalarType::UInt8 => (0.0, u8::MAX as f64),
            ScalarType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            ScalarType::UInt16 => (0.0, u16::MAX as f64),
            ScalarType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            ScalarType::UInt32 => (0.0, u32::MAX as f64),
            ScalarType::Float32 | ScalarType::Float64 => return None,
        };
        Some(r)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Int8 => "int8",
            ScalarType::UInt8 => "uint8",
            ScalarType::Int16 => "int16",
            ScalarType::UInt16 => "uint16",
            ScalarType::Int32 => "int32",
            ScalarType::UInt32 => "uint32",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List {
        count_ty: ScalarType,
        item_ty: ScalarType,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertyDescriptor>,
}

impl ElementDescriptor {
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct PlyHeader {
    pub encoding: PlyEncoding,
    pub elements: Vec<ElementDescriptor>,
    /// Byte offset of the first body byte.
    pub data_offset: usize,
}

impl PlyHeader {
    pub fn element(&self, name: &str) -> Option<&ElementDescriptor> {
        self.elements.iter().find(|e| e.name == name)
    }
}

#[derive(Clone, Copy, Debug)]
enum Newline {
    Lf,
    CrLf,
}

/// Offset of the first body byte and the header's line ending.
fn find_header_end(bytes: &[u8]) -> Result<(usize, Newline), PlyError> {
    const MARKER: &[u8] = b"end_header";
    let mut from = 0;
    while let Some(hit) = bytes[from..].windows(MARKER.len()).position(|w| w == MARKER) {
        let after = &bytes[from + hit + MARKER.len()..];
        match after {
            [b'\n', ..] => return Ok((bytes.len() - after.len() + 1, Newline::Lf)),
            [b'\r', b'\n', ..] => return Ok((bytes.len() - after.len() + 2, Newline::CrLf)),
            _ => from += hit + 1,
        }
    }
    Err(PlyError::input("no end_header line"))
}

fn parse_scalar_type(s: &str) -> Result<ScalarType, PlyError> {
    ScalarType::parse(s).ok_or_else(|| PlyError::schema(format!("unknown property type \"{s}\"")))
}

pub fn parse_header(bytes: &[u8]) -> Result<PlyHeader, PlyError> {
    if bytes.is_empty() {
        return Err(PlyError::input("buffer is empty"));
    }
    let (header_end, newline) = find_header_end(bytes)?;
    let header_text = core::str::from_utf8(&bytes[..header_end])
        .map_err(|_| PlyError::input("header is not valid utf-8"))?;

    let mut lines: Vec<&str> = match newline {
        Newline::Lf => header_text.split('\n').collect(),
        Newline::CrLf => header_text.split("\r\n").collect(),
    };
    lines = lines
        .into_iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    if lines.first() != Some(&"ply") {
        return Err(PlyError::schema("first line must be \"ply\""));
    }

    let mut encoding: Option<PlyEncoding> = None;
    let mut elements: Vec<ElementDescriptor> = Vec::new();

    for line in lines.iter().skip(1) {
        if *line == "end_header" {
            break;
        }
        let mut it = line.split_whitespace();
        let tag = it.next().unwrap_or("");

        match tag {
            "comment" | "obj_info" => {}
            "format" => {
                let f = match it.next().unwrap_or("") {
                    "ascii" => PlyEncoding::Ascii,
                    "binary_little_endian" => PlyEncoding::BinaryLittleEndian,
                    "binary_big_endian" => PlyEncoding::BinaryBigEndian,
                    other => return Err(PlyError::schema(format!("unsupported format \"{other}\""))),
                };
                encoding = Some(f);
            }
            "element" => {
                let name = it.next().ok_or_else(|| PlyError::schema("bad element"))?;
                let count: usize = it
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| PlyError::schema(format!("bad element count for \"{name}\"")))?;
                elements.push(ElementDescriptor {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                let cur = elements
                    .last_mut()
                    .ok_or_else(|| PlyError::schema("property before element"))?;
                let t1 = it.next().ok_or_else(|| PlyError::schema("bad property"))?;
                let (kind, name) = if t1 == "list" {
                    let count_t = it.next().ok_or_else(|| PlyError::schema("bad list property"))?;
                    let item_t = it.next().ok_or_else(|| PlyError::schema("bad list property"))?;
                    let name = it.next().ok_or_else(|| PlyError::schema("bad list property"))?;
                    let count_ty = parse_scalar_type(count_t)?;
                    if !count_ty.is_integer() {
                        return Err(PlyError::schema(format!("list \"{name}\" has a non-integer count type")));
                    }
                    let item_ty = parse_scalar_type(item_t)?;
                    (PropertyKind::List { count_ty, item_ty }, name)
                } else {
                    let ty = parse_scalar_type(t1)?;
                    let name = it.next().ok_or_else(|| PlyError::schema("bad scalar property"))?;
                    (PropertyKind::Scalar(ty), name)
                };
                cur.properties.push(PropertyDescriptor {
                    name: name.to_string(),
                    kind,
                });
            }
            other => return Err(PlyError::schema(format!("unknown header directive \"{other}\""))),
        }
    }

    let encoding = encoding.ok_or_else(|| PlyError::schema("missing format"))?;

    Ok(PlyHeader {
        encoding,
        elements,
        data_offset: header_end,
    })
}

/// Returns the first property of `element` whose name contains `marker`, if
/// any. A hit marks the file as a splat file.
pub fn detect_splat<'h>(header: &'h PlyHeader, element: &str, marker: &str) -> Option<&'h str> {
    header
        .element(element)?
        .properties
        .iter()
        .find(|p| p.name.contains(marker))
        .map(|p| p.name.as_str())
}
