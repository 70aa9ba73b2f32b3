use std::collections::HashMap;

use crate::channels::{combine_channels, normalize_colors};
use crate::config::IngestConfig;
use crate::error::PlyError;
use crate::face_index::{decode_strip_records, widen_face_indices};
use crate::geometry::{Aabb, compute_bounds, synthesize_normals};
use crate::ply_header::{PlyEncoding, detect_splat, parse_header};
use crate::ply_property::{ListData, ListRequest, PropertyBuffer, extract};
use crate::splat::{self, SplatActivation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Standard,
    Splat,
}

impl AssetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetFormat::Standard => "standard",
            AssetFormat::Splat => "splat",
        }
    }
}

/// A decoded point/mesh asset. Read-only once built.
#[derive(Debug, Clone)]
pub struct Asset {
    format: AssetFormat,
    encoding: PlyEncoding,
    point_count: usize,
    sh_degree: u32,
    bounds: Option<Aabb>,
    properties: HashMap<String, PropertyBuffer>,
    positions: Option<Vec<f32>>,
    normals: Option<Vec<f32>>,
    colors: Option<Vec<f32>>,
    texcoords: Option<Vec<f32>>,
    faces: Option<Vec<u32>>,
    strips: Option<Vec<u32>>,
    activation: SplatActivation,
}

/// Receiver for [`Asset::fill_into`]. Every slot defaults to ignoring its
/// data, so a sink only implements what it stores. Slots the asset has no
/// data for are never called.
pub trait AssetSink {
    fn set_format(&mut self, _format: AssetFormat) {}
    fn set_point_count(&mut self, _count: usize) {}
    fn set_positions(&mut self, _xyz: &[f32]) {}
    fn set_bounds(&mut self, _bounds: Aabb) {}
    fn set_normals(&mut self, _xyz: &[f32]) {}
    fn set_colors(&mut self, _rgba: &[f32]) {}
    fn set_texcoords(&mut self, _uv: &[f32]) {}
    fn set_faces(&mut self, _indices: &[u32]) {}
    /// `[len, i0, .., len, i0, ..]`, see [`crate::face_index::strip_runs`].
    fn set_strips(&mut self, _records: &[u32]) {}
    fn set_sh_degree(&mut self, _degree: u32) {}
    fn set_opacity(&mut self, _opacity: &[f32]) {}
    fn set_scale(&mut self, _xyz: &[f32]) {}
    fn set_rotation(&mut self, _wxyz: &[f32]) {}
    fn set_f_dc(&mut self, _rgb: &[f32]) {}
    fn set_f_rest(&mut self, _coeffs: &[f32]) {}
    fn set_covariance(&mut self, _cov: &[f32]) {}
    fn set_base_color(&mut self, _rgb: &[f32]) {}
}

/// Plain owned copy of everything an asset can emit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetBuffers {
    pub format: Option<AssetFormat>,
    pub point_count: usize,
    pub positions: Option<Vec<f32>>,
    pub bounds: Option<Aabb>,
    pub normals: Option<Vec<f32>>,
    pub colors: Option<Vec<f32>>,
    pub texcoords: Option<Vec<f32>>,
    pub faces: Option<Vec<u32>>,
    pub strips: Option<Vec<u32>>,
    pub sh_degree: Option<u32>,
    pub opacity: Option<Vec<f32>>,
    pub scale: Option<Vec<f32>>,
    pub rotation: Option<Vec<f32>>,
    pub f_dc: Option<Vec<f32>>,
    pub f_rest: Option<Vec<f32>>,
    pub covariance: Option<Vec<f32>>,
    pub base_color: Option<Vec<f32>>,
}

impl AssetSink for AssetBuffers {
    fn set_format(&mut self, format: AssetFormat) {
        self.format = Some(format);
    }
    fn set_point_count(&mut self, count: usize) {
        self.point_count = count;
    }
    fn set_positions(&mut self, xyz: &[f32]) {
        self.positions = Some(xyz.to_vec());
    }
    fn set_bounds(&mut self, bounds: Aabb) {
        self.bounds = Some(bounds);
    }
    fn set_normals(&mut self, xyz: &[f32]) {
        self.normals = Some(xyz.to_vec());
    }
    fn set_colors(&mut self, rgba: &[f32]) {
        self.colors = Some(rgba.to_vec());
    }
    fn set_texcoords(&mut self, uv: &[f32]) {
        self.texcoords = Some(uv.to_vec());
    }
    fn set_faces(&mut self, indices: &[u32]) {
        self.faces = Some(indices.to_vec());
    }
    fn set_strips(&mut self, records: &[u32]) {
        self.strips = Some(records.to_vec());
    }
    fn set_sh_degree(&mut self, degree: u32) {
        self.sh_degree = Some(degree);
    }
    fn set_opacity(&mut self, opacity: &[f32]) {
        self.opacity = Some(opacity.to_vec());
    }
    fn set_scale(&mut self, xyz: &[f32]) {
        self.scale = Some(xyz.to_vec());
    }
    fn set_rotation(&mut self, wxyz: &[f32]) {
        self.rotation = Some(wxyz.to_vec());
    }
    fn set_f_dc(&mut self, rgb: &[f32]) {
        self.f_dc = Some(rgb.to_vec());
    }
    fn set_f_rest(&mut self, coeffs: &[f32]) {
        self.f_rest = Some(coeffs.to_vec());
    }
    fn set_covariance(&mut self, cov: &[f32]) {
        self.covariance = Some(cov.to_vec());
    }
    fn set_base_color(&mut self, rgb: &[f32]) {
        self.base_color = Some(rgb.to_vec());
    }
}

// An optional group that can't be combined is dropped, not fatal.
fn optional_group<S: AsRef<str>>(
    properties: &HashMap<String, PropertyBuffer>,
    names: &[S],
    what: &str,
) -> Option<PropertyBuffer> {
    if !names.iter().any(|n| properties.contains_key(n.as_ref())) {
        return None;
    }
    match combine_channels(properties, names) {
        Ok(buf) => Some(buf),
        Err(e) => {
            log::warn!("skipping {what}: {e}");
            None
        }
    }
}

fn present_prefix<'n>(properties: &HashMap<String, PropertyBuffer>, names: &[&'n str]) -> Vec<&'n str> {
    names
        .iter()
        .take_while(|n| properties.contains_key(**n))
        .copied()
        .collect()
}

fn take_list(lists: &mut HashMap<String, ListData>, request: &ListRequest) -> Option<ListData> {
    lists.remove(&request.element)
}

/// Decodes a PLY buffer into an [`Asset`].
///
/// Any header, bounds or type failure aborts the whole load. Properties the
/// file doesn't have are left out, and whatever depends on them is skipped.
pub fn load_asset(bytes: &[u8], config: &IngestConfig) -> Result<Asset, PlyError> {
    if bytes.is_empty() {
        return Err(PlyError::input("buffer is empty"));
    }
    let header = parse_header(bytes)?;

    let format = match detect_splat(&header, &config.point_element, &config.splat_marker) {
        Some(hit) => {
            log::debug!("splat property detected: {hit}");
            AssetFormat::Splat
        }
        None => AssetFormat::Standard,
    };
    let point_count = header
        .element(&config.point_element)
        .map_or(0, |e| e.count);

    log::info!(
        "PLY {}: {} bytes, {} elements, {} {} points",
        header.encoding.as_str(),
        bytes.len(),
        header.elements.len(),
        point_count,
        format.as_str()
    );

    let (names, lists) = match format {
        AssetFormat::Splat => (&config.splat_properties, Vec::new()),
        AssetFormat::Standard => (
            &config.standard_properties,
            vec![config.faces.clone(), config.strips.clone()],
        ),
    };
    let mut extracted = extract(bytes, &header, &config.point_element, names, &lists)?;
    let properties = std::mem::take(&mut extracted.properties);

    let positions = optional_group(&properties, &["x", "y", "z"], "positions").map(|b| b.to_f32());
    if positions.is_none() {
        log::warn!("no positions in {}", config.point_element);
    }
    let bounds = positions.as_deref().and_then(compute_bounds);

    let faces = match take_list(&mut extracted.lists, &config.faces) {
        Some(ListData::Fixed { items, records, .. }) => {
            log::debug!("faces: {records} x {}", items.scalar_type().as_str());
            Some(widen_face_indices(&items)?)
        }
        _ => None,
    };

    let strips = match take_list(&mut extracted.lists, &config.strips) {
        Some(ListData::Records { width, records, bytes }) => {
            log::debug!("strips: {records} records");
            Some(decode_strip_records(&bytes, width)?)
        }
        _ => None,
    };

    let mut normals = optional_group(&properties, &["nx", "ny", "nz"], "normals").map(|b| b.to_f32());
    if normals.is_none() && config.synthesize_normals {
        if let (Some(p), Some(f)) = (&positions, &faces) {
            log::debug!("synthesizing normals from {} faces", f.len() / 3);
            normals = Some(synthesize_normals(p, f)?);
        }
    }

    let color_names = {
        let long = present_prefix(&properties, &["red", "green", "blue", "alpha"]);
        if long.is_empty() {
            present_prefix(&properties, &["r", "g", "b", "a"])
        } else {
            long
        }
    };
    let colors = match optional_group(&properties, &color_names, "colors") {
        Some(buf) => Some(normalize_colors(&buf, point_count)?),
        None => None,
    };

    let texcoords = optional_group(&properties, &["u", "v"], "texcoords").map(|b| b.to_f32());

    let sh_degree = match format {
        AssetFormat::Splat => {
            let rest = splat::f_rest_names()
                .iter()
                .filter(|n| properties.contains_key(n.as_str()))
                .count();
            let degree = splat::sh_degree_from_rest_count(rest).unwrap_or(config.default_sh_degree);
            log::info!("SH degree {degree} ({rest} f_rest properties)");
            degree
        }
        AssetFormat::Standard => config.default_sh_degree,
    };

    Ok(Asset {
        format,
        encoding: header.encoding,
        point_count,
        sh_degree,
        bounds,
        properties,
        positions,
        normals,
        colors,
        texcoords,
        faces,
        strips,
        activation: config.splat_activation,
    })
}

impl Asset {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PlyError> {
        load_asset(bytes, &IngestConfig::default())
    }

    pub fn format(&self) -> AssetFormat {
        self.format
    }

    pub fn is_splat(&self) -> bool {
        self.format == AssetFormat::Splat
    }

    pub fn encoding(&self) -> PlyEncoding {
        self.encoding
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn sh_degree(&self) -> u32 {
        self.sh_degree
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn property(&self, name: &str) -> Option<&PropertyBuffer> {
        self.properties.get(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn combined<S: AsRef<str>>(&self, names: &[S]) -> Result<PropertyBuffer, PlyError> {
        combine_channels(&self.properties, names)
    }

    pub fn positions(&self) -> Option<&[f32]> {
        self.positions.as_deref()
    }

    pub fn normals(&self) -> Option<&[f32]> {
        self.normals.as_deref()
    }

    pub fn colors(&self) -> Option<&[f32]> {
        self.colors.as_deref()
    }

    pub fn texcoords(&self) -> Option<&[f32]> {
        self.texcoords.as_deref()
    }

    pub fn faces(&self) -> Option<&[u32]> {
        self.faces.as_deref()
    }

    pub fn strips(&self) -> Option<&[u32]> {
        self.strips.as_deref()
    }

    fn group_f32<S: AsRef<str>>(&self, names: &[S], what: &str) -> Option<Vec<f32>> {
        optional_group(&self.properties, names, what).map(|b| b.to_f32())
    }

    /// Copies every buffer the asset holds into `sink`.
    pub fn fill_into<S: AssetSink + ?Sized>(&self, sink: &mut S) {
        sink.set_format(self.format);
        sink.set_point_count(self.point_count);
        if let Some(p) = &self.positions {
            sink.set_positions(p);
        }
        if let Some(b) = self.bounds {
            sink.set_bounds(b);
        }
        if let Some(n) = &self.normals {
            sink.set_normals(n);
        }
        if let Some(c) = &self.colors {
            sink.set_colors(c);
        }
        if let Some(t) = &self.texcoords {
            sink.set_texcoords(t);
        }
        if let Some(f) = &self.faces {
            sink.set_faces(f);
        }
        if let Some(s) = &self.strips {
            sink.set_strips(s);
        }

        if self.format != AssetFormat::Splat {
            return;
        }
        self.fill_splat(sink);
    }

    fn fill_splat<S: AssetSink + ?Sized>(&self, sink: &mut S) {
        let act = self.activation;
        sink.set_sh_degree(self.sh_degree);

        if let Some(opacity) = self.properties.get("opacity").map(|b| b.to_f32()) {
            if act.sigmoid_opacity {
                sink.set_opacity(&splat::activate_opacity(&opacity));
            } else {
                sink.set_opacity(&opacity);
            }
        }

        let scale = self.group_f32(&splat::scale_names(), "scale");
        let rotation = self.group_f32(&splat::rot_names(), "rotation");
        if let Some(s) = &scale {
            if act.exp_scale {
                sink.set_scale(&splat::activate_scale(s));
            } else {
                sink.set_scale(s);
            }
        }
        if let Some(r) = &rotation {
            if act.normalize_rotation {
                sink.set_rotation(&splat::normalize_rotations(r));
            } else {
                sink.set_rotation(r);
            }
        }
        if act.covariance {
            if let (Some(s), Some(r)) = (&scale, &rotation) {
                sink.set_covariance(&splat::covariances(s, r));
            }
        }

        if let Some(dc) = self.group_f32(&splat::f_dc_names(), "f_dc") {
            if act.base_color {
                sink.set_base_color(&splat::dc_to_rgb(&dc));
            }
            sink.set_f_dc(&dc);
        }

        // Lower-degree files carry fewer coefficients; take the present ones
        // in index order.
        let rest: Vec<String> = splat::f_rest_names()
            .into_iter()
            .filter(|n| self.properties.contains_key(n))
            .collect();
        if let Some(r) = self.group_f32(&rest, "f_rest") {
            sink.set_f_rest(&r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn assets_can_be_shared_across_threads() {
        assert_send_sync::<Asset>();
        assert_send_sync::<std::sync::Arc<Asset>>();
    }

    const ROTATED_SPLAT: &str = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\n\
property float z\nproperty float f_dc_0\nproperty float f_dc_1\nproperty float f_dc_2\nproperty float opacity\n\
property float scale_0\nproperty float scale_1\nproperty float scale_2\nproperty float rot_0\nproperty float rot_1\n\
property float rot_2\nproperty float rot_3\nend_header\n0 0 0 0 0 0 0 0 0 0 0 0 3 4\n";

    #[test]
    fn rotation_and_base_color_toggles_act_alone() {
        let cfg = IngestConfig {
            splat_activation: SplatActivation {
                normalize_rotation: true,
                base_color: true,
                ..SplatActivation::default()
            },
            ..IngestConfig::default()
        };
        let asset = load_asset(ROTATED_SPLAT.as_bytes(), &cfg).unwrap();
        let mut out = AssetBuffers::default();
        asset.fill_into(&mut out);

        let rot = out.rotation.unwrap();
        assert_relative_eq!(rot[2], 0.6, epsilon = 1e-6);
        assert_relative_eq!(rot[3], 0.8, epsilon = 1e-6);
        assert_eq!(out.base_color, Some(vec![0.5, 0.5, 0.5]));
        assert_eq!(out.scale, Some(vec![0.0, 0.0, 0.0]));
        assert!(out.covariance.is_none());

        let raw = Asset::from_bytes(ROTATED_SPLAT.as_bytes()).unwrap();
        let mut out = AssetBuffers::default();
        raw.fill_into(&mut out);
        assert_eq!(out.rotation, Some(vec![0.0, 0.0, 3.0, 4.0]));
        assert!(out.base_color.is_none());
    }

    #[test]
    fn ascii_mesh_with_faces_gets_normals() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
property float z\nelement face 1\nproperty list uchar uint vertex_indices\nend_header\n\
0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        let asset = Asset::from_bytes(text.as_bytes()).unwrap();
        assert_eq!(asset.format(), AssetFormat::Standard);
        assert_eq!(asset.encoding(), PlyEncoding::Ascii);
        assert_eq!(asset.faces(), Some(&[0u32, 1, 2][..]));
        assert_eq!(asset.normals(), Some(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0][..]));
        assert_eq!(asset.bounds().unwrap().to_array(), [0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn normal_synthesis_can_be_disabled() {
        let text = "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\n\
property float z\nelement face 1\nproperty list uchar uint vertex_indices\nend_header\n\
0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        let cfg = IngestConfig {
            synthesize_normals: false,
            ..IngestConfig::default()
        };
        let asset = load_asset(text.as_bytes(), &cfg).unwrap();
        assert!(asset.normals().is_none());
    }

    #[test]
    fn missing_positions_skip_bounds_without_failing() {
        let text = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float nx\nend_header\n1\n2\n";
        let asset = Asset::from_bytes(text.as_bytes()).unwrap();
        assert!(asset.positions().is_none());
        assert!(asset.bounds().is_none());
        assert!(asset.normals().is_none());
        assert_eq!(asset.point_count(), 2);

        let mut out = AssetBuffers::default();
        asset.fill_into(&mut out);
        assert_eq!(out.format, Some(AssetFormat::Standard));
        assert!(out.positions.is_none());
        assert!(out.sh_degree.is_none());
    }

    #[test]
    fn color_groups_prefer_long_names() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\n\
property float z\nproperty uchar red\nproperty uchar green\nproperty uchar r\nend_header\n\
0 0 0 255 0 9\n";
        let asset = Asset::from_bytes(text.as_bytes()).unwrap();
        assert_eq!(asset.colors(), Some(&[1.0, 0.0, 0.0, 1.0][..]));
    }

    #[test]
    fn empty_buffer_is_input_error() {
        assert_eq!(Asset::from_bytes(&[]).unwrap_err().kind(), ErrorKind::Input);
    }
}
