use std::cell::RefCell;

use wasm_bindgen::prelude::*;

use crate::asset_core::{AssetBuffers, AssetFormat, load_asset};
use crate::asset_store::{AssetHandle, AssetStore};
use crate::config::IngestConfig;
use crate::error::PlyError;
use crate::splat::SplatActivation;

thread_local! {
    static STORE: RefCell<AssetStore> = RefCell::new(AssetStore::default());
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

pub(crate) fn to_js(e: PlyError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct PlyAssetBuffers {
    inner: AssetBuffers,
}

fn view_f32(v: &Option<Vec<f32>>) -> Option<js_sys::Float32Array> {
    v.as_ref().map(|v| unsafe { js_sys::Float32Array::view(v) })
}

fn view_u32(v: &Option<Vec<u32>>) -> Option<js_sys::Uint32Array> {
    v.as_ref().map(|v| unsafe { js_sys::Uint32Array::view(v) })
}

#[wasm_bindgen]
impl PlyAssetBuffers {
    #[wasm_bindgen(getter, js_name = pointCount)]
    pub fn point_count(&self) -> u32 {
        self.inner.point_count as u32
    }

    #[wasm_bindgen(getter, js_name = isSplat)]
    pub fn is_splat(&self) -> bool {
        self.inner.format == Some(AssetFormat::Splat)
    }

    #[wasm_bindgen(getter, js_name = shDegree)]
    pub fn sh_degree(&self) -> Option<u32> {
        self.inner.sh_degree
    }

    /// `[min.x, min.y, min.z, max.x, max.y, max.z]`
    #[wasm_bindgen(getter)]
    pub fn bounds(&self) -> Option<Vec<f32>> {
        self.inner.bounds.map(|b| b.to_array().to_vec())
    }

    #[wasm_bindgen(getter)]
    pub fn positions(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.positions)
    }

    #[wasm_bindgen(getter)]
    pub fn normals(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.normals)
    }

    #[wasm_bindgen(getter)]
    pub fn colors(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.colors)
    }

    #[wasm_bindgen(getter)]
    pub fn texcoords(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.texcoords)
    }

    #[wasm_bindgen(getter)]
    pub fn faces(&self) -> Option<js_sys::Uint32Array> {
        view_u32(&self.inner.faces)
    }

    #[wasm_bindgen(getter)]
    pub fn strips(&self) -> Option<js_sys::Uint32Array> {
        view_u32(&self.inner.strips)
    }

    #[wasm_bindgen(getter)]
    pub fn opacity(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.opacity)
    }

    #[wasm_bindgen(getter)]
    pub fn scale(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.scale)
    }

    #[wasm_bindgen(getter)]
    pub fn rotation(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.rotation)
    }

    #[wasm_bindgen(getter, js_name = fDc)]
    pub fn f_dc(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.f_dc)
    }

    #[wasm_bindgen(getter, js_name = fRest)]
    pub fn f_rest(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.f_rest)
    }

    #[wasm_bindgen(getter)]
    pub fn covariance(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.covariance)
    }

    #[wasm_bindgen(getter, js_name = baseColor)]
    pub fn base_color(&self) -> Option<js_sys::Float32Array> {
        view_f32(&self.inner.base_color)
    }
}

/// Loads a PLY buffer and returns its handle.
#[wasm_bindgen(js_name = loadAsset)]
pub fn load(bytes: &[u8]) -> Result<u64, JsValue> {
    STORE.with(|s| s.borrow_mut().load(bytes).map(AssetHandle::to_bits).map_err(to_js))
}

/// Like `loadAsset`, with every splat activation toggle set explicitly.
#[wasm_bindgen(js_name = loadAssetWithOpts)]
pub fn load_with_opts(
    bytes: &[u8],
    exp_scale: bool,
    sigmoid_opacity: bool,
    normalize_rotation: bool,
    covariance: bool,
    base_color: bool,
) -> Result<u64, JsValue> {
    let config = IngestConfig {
        splat_activation: SplatActivation {
            exp_scale,
            sigmoid_opacity,
            normalize_rotation,
            covariance,
            base_color,
        },
        ..IngestConfig::default()
    };
    let asset = load_asset(bytes, &config).map_err(to_js)?;
    Ok(STORE.with(|s| s.borrow_mut().insert(asset).to_bits()))
}

#[wasm_bindgen(js_name = fillAsset)]
pub fn fill(handle: u64) -> Result<PlyAssetBuffers, JsValue> {
    let mut inner = AssetBuffers::default();
    STORE.with(|s| s.borrow().fill_into(AssetHandle::from_bits(handle), &mut inner).map_err(to_js))?;
    Ok(PlyAssetBuffers { inner })
}

#[wasm_bindgen(js_name = destroyAsset)]
pub fn destroy(handle: u64) -> Result<(), JsValue> {
    STORE.with(|s| s.borrow_mut().destroy(AssetHandle::from_bits(handle)).map_err(to_js))
}
