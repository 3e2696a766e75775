/// Describes the render target a pass draws into.
///
/// Pipelines are specialized per target state, so a pass built for one
/// format must only be used with render passes targeting that format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetState {
    /// Color attachment format.
    pub format: wgpu::TextureFormat,
    /// MSAA sample count of the color attachment.
    pub sample_count: u32,
}

impl RenderTargetState {
    /// Single-sampled target with the given format.
    pub const fn new(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            sample_count: 1,
        }
    }

    /// Returns a copy with a different sample count.
    pub const fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Target state matching a configured surface.
    pub fn from_config(config: &wgpu::SurfaceConfiguration) -> Self {
        Self::new(config.format)
    }
}

impl From<wgpu::TextureFormat> for RenderTargetState {
    fn from(format: wgpu::TextureFormat) -> Self {
        Self::new(format)
    }
}
