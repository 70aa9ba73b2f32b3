pub mod asset_core;
pub mod asset_store;
pub mod channels;
pub mod config;
pub mod depth_sort_core;
pub mod error;
pub mod face_index;
pub mod geometry;
pub mod ply_header;
pub mod ply_property;
pub mod splat;

#[cfg(target_arch = "wasm32")]
mod asset_wasm;
#[cfg(target_arch = "wasm32")]
mod depth_sort_wasm;

pub use asset_core::{Asset, AssetBuffers, AssetFormat, AssetSink, load_asset};
pub use asset_store::{AssetHandle, AssetStore};
pub use config::IngestConfig;
pub use depth_sort_core::{DepthSorter, Mat4, SortNode, sort_primitives};
pub use error::{ErrorKind, PlyError};
pub use geometry::Aabb;
pub use ply_header::{PlyEncoding, PlyHeader, ScalarType, parse_header};
pub use ply_property::{ListRequest, PropertyBuffer};
pub use splat::SplatActivation;

#[cfg(target_arch = "wasm32")]
pub use asset_wasm::PlyAssetBuffers;
#[cfg(target_arch = "wasm32")]
pub use depth_sort_wasm::PlyDepthSorter;
