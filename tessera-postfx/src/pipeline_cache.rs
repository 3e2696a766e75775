//! On-disk persistence for compiled pipelines.
//!
//! ## Usage
//!
//! Load a cache before creating the [`PostProcessLibrary`](crate::PostProcessLibrary)
//! and write it back once the passes you need have been built.

use std::{io, path::PathBuf};

use tracing::debug;

const CACHE_SUBDIR: &str = "tessera-postfx";

fn cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(CACHE_SUBDIR))
}

/// Creates a pipeline cache seeded from disk when the adapter supports one.
pub fn initialize_cache(
    device: &wgpu::Device,
    adapter_info: &wgpu::AdapterInfo,
) -> Option<wgpu::PipelineCache> {
    if !device.features().contains(wgpu::Features::PIPELINE_CACHE) {
        return None;
    }
    let cache_path = cache_dir()?.join(wgpu::util::pipeline_cache_key(adapter_info)?);
    let cache_data = std::fs::read(&cache_path).ok();
    debug!(
        path = %cache_path.display(),
        warm = cache_data.is_some(),
        "opening pipeline cache"
    );
    // SAFETY: the data was written by `save_cache` for an adapter with the same
    // cache key, and `fallback` lets wgpu discard it if it is stale.
    unsafe {
        Some(
            device.create_pipeline_cache(&wgpu::PipelineCacheDescriptor {
                label: Some("postfx_pipeline_cache"),
                data: cache_data.as_deref(),
                fallback: true,
            }),
        )
    }
}

/// Writes the cache contents next to other user caches.
pub fn save_cache(cache: &wgpu::PipelineCache, adapter_info: &wgpu::AdapterInfo) -> io::Result<()> {
    let cache_dir =
        cache_dir().ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "cache dir not found"))?;
    let cache_filename = wgpu::util::pipeline_cache_key(adapter_info)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "pipeline cache not supported"))?;

    if let Some(data) = cache.get_data() {
        std::fs::create_dir_all(&cache_dir)?;
        let cache_path = cache_dir.join(&cache_filename);
        debug!(path = %cache_path.display(), bytes = data.len(), "saving pipeline cache");
        std::fs::write(&cache_path, &data)?;
    }

    Ok(())
}
