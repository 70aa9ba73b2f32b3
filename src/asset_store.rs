use std::sync::Arc;

use crate::asset_core::{Asset, AssetSink, load_asset};
use crate::config::IngestConfig;
use crate::error::PlyError;

/// Opaque reference to a stored asset. A handle whose asset was destroyed
/// never resolves again, even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    index: u32,
    generation: u32,
}

impl AssetHandle {
    /// Packs the handle as `generation << 32 | index`.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_bits(bits: u64) -> Self {
        AssetHandle {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    asset: Option<Arc<Asset>>,
}

/// Owns loaded assets and hands out generation-checked handles.
///
/// Readers get an `Arc<Asset>`, so an asset stays valid for whoever is
/// still filling from it when it is destroyed.
#[derive(Debug, Default)]
pub struct AssetStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    config: IngestConfig,
}

impl AssetStore {
    pub fn new(config: IngestConfig) -> Self {
        AssetStore {
            slots: Vec::new(),
            free: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Number of live assets.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes `bytes` with the store's config. Nothing is stored on failure.
    pub fn load(&mut self, bytes: &[u8]) -> Result<AssetHandle, PlyError> {
        let asset = load_asset(bytes, &self.config)?;
        Ok(self.insert(asset))
    }

    pub fn insert(&mut self, asset: Asset) -> AssetHandle {
        let asset = Some(Arc::new(asset));
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.asset = asset;
            return AssetHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, asset });
        AssetHandle { index, generation: 0 }
    }

    pub fn get(&self, handle: AssetHandle) -> Result<Arc<Asset>, PlyError> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.asset.clone())
            .ok_or_else(|| PlyError::state(format!("no asset for handle {:#x}", handle.to_bits())))
    }

    pub fn fill_into<S: AssetSink + ?Sized>(&self, handle: AssetHandle, sink: &mut S) -> Result<(), PlyError> {
        self.get(handle)?.fill_into(sink);
        Ok(())
    }

    /// Releases the asset. Destroying the same handle twice is a state error.
    pub fn destroy(&mut self, handle: AssetHandle) -> Result<(), PlyError> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.asset.is_some())
            .ok_or_else(|| PlyError::state(format!("handle {:#x} is not live", handle.to_bits())))?;
        slot.asset = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        log::debug!("destroyed asset {:#x}", handle.to_bits());
        Ok(())
    }
}
