use wasm_bindgen::prelude::*;

use crate::asset_wasm::to_js;
use crate::depth_sort_core::{DepthSorter, Mat4};
use crate::error::PlyError;

fn mat4(m: &[f32], what: &str) -> Result<Mat4, JsValue> {
    m.try_into()
        .map_err(|_| to_js(PlyError::input(format!("{what} matrix needs 16 floats, got {}", m.len()))))
}

/// Sorter that keeps its scratch buffer between frames.
#[wasm_bindgen]
pub struct PlyDepthSorter {
    inner: DepthSorter,
}

#[wasm_bindgen]
impl PlyDepthSorter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PlyDepthSorter {
        PlyDepthSorter {
            inner: DepthSorter::new(),
        }
    }

    pub fn sort(&mut self, centers: &[f32], model: &[f32], camera: &[f32], out: &mut [u32]) -> Result<(), JsValue> {
        let model = mat4(model, "model")?;
        let camera = mat4(camera, "camera")?;
        self.inner.sort_into(centers, &model, &camera, out).map_err(to_js)
    }
}

impl Default for PlyDepthSorter {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen(js_name = sortPrimitives)]
pub fn sort_primitives(centers: &[f32], model: &[f32], camera: &[f32], out: &mut [u32]) -> Result<(), JsValue> {
    PlyDepthSorter::new().sort(centers, model, camera, out)
}
