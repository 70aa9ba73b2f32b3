use serde::{Deserialize, Serialize};

use crate::ply_property::ListRequest;
use crate::splat::{DEFAULT_SH_DEGREE, SplatActivation, splat_property_names};

/// What a load asks the file for, and what it derives afterwards.
///
/// The property sets are plain data, so a plain mesh and a splat file go
/// through the same pipeline with a different request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Element holding the per-point properties.
    pub point_element: String,
    /// A point property whose name contains this marks a splat file.
    pub splat_marker: String,
    pub splat_properties: Vec<String>,
    pub standard_properties: Vec<String>,
    pub faces: ListRequest,
    pub strips: ListRequest,
    /// SH degree reported for splat files without `f_rest_*` properties.
    pub default_sh_degree: u32,
    /// Derive smooth normals from faces when the file has none.
    pub synthesize_normals: bool,
    pub splat_activation: SplatActivation,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let standard = [
            "x", "y", "z", "nx", "ny", "nz", "red", "green", "blue", "alpha", "r", "g", "b", "a", "u", "v",
        ];
        IngestConfig {
            point_element: "vertex".to_string(),
            splat_marker: "f_dc_".to_string(),
            splat_properties: splat_property_names(),
            standard_properties: standard.iter().map(|s| s.to_string()).collect(),
            faces: ListRequest::fixed("face", &["vertex_indices", "vertex_index"], 3),
            strips: ListRequest::variable("tristrips", &["vertex_indices"]),
            default_sh_degree: DEFAULT_SH_DEGREE,
            synthesize_normals: true,
            splat_activation: SplatActivation::default(),
        }
    }
}
