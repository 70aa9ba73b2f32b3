use std::borrow::Cow;

use thiserror::Error;

/// Coarse failure category, stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Schema,
    Bounds,
    UnsupportedType,
    State,
}

#[derive(Debug, Clone, Error)]
pub enum PlyError {
    /// Null, empty or otherwise unreadable input buffer.
    #[error("PLY input: {0}")]
    Input(Cow<'static, str>),
    /// Header structure or requested schema doesn't line up.
    #[error("PLY schema: {0}")]
    Schema(Cow<'static, str>),
    /// A read ran past the end of the buffer it was decoding.
    #[error("PLY bounds: {0}")]
    Bounds(Cow<'static, str>),
    #[error("PLY unsupported type: {0}")]
    UnsupportedType(Cow<'static, str>),
    /// Asset handle used after release.
    #[error("asset state: {0}")]
    State(Cow<'static, str>),
}

impl PlyError {
    pub(crate) fn input(s: impl Into<Cow<'static, str>>) -> Self {
        PlyError::Input(s.into())
    }

    pub(crate) fn schema(s: impl Into<Cow<'static, str>>) -> Self {
        PlyError::Schema(s.into())
    }

    pub(crate) fn bounds(s: impl Into<Cow<'static, str>>) -> Self {
        PlyError::Bounds(s.into())
    }

    pub(crate) fn unsupported(s: impl Into<Cow<'static, str>>) -> Self {
        PlyError::UnsupportedType(s.into())
    }

    pub(crate) fn state(s: impl Into<Cow<'static, str>>) -> Self {
        PlyError::State(s.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PlyError::Input(_) => ErrorKind::Input,
            PlyError::Schema(_) => ErrorKind::Schema,
            PlyError::Bounds(_) => ErrorKind::Bounds,
            PlyError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            PlyError::State(_) => ErrorKind::State,
        }
    }
}
