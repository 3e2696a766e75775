/// Handle to a texture sampled by a post-process pass.
///
/// Cloning is cheap; the view is reference counted by wgpu.
#[derive(Debug, Clone)]
pub struct SourceTexture {
    view: wgpu::TextureView,
    size: Option<(u32, u32)>,
}

impl SourceTexture {
    /// Wraps a bare view. Effects that need texel dimensions will refuse to
    /// run until a size is attached with [`SourceTexture::with_size`].
    pub fn new(view: wgpu::TextureView) -> Self {
        Self { view, size: None }
    }

    /// Creates a default view of `texture` and records its size.
    pub fn from_texture(texture: &wgpu::Texture) -> Self {
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            size: Some((texture.width(), texture.height())),
        }
    }

    /// Attaches the texel dimensions of the underlying texture.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// The view bound at the texture slot of the pass.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Width and height in texels, if known.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }
}

impl From<&wgpu::Texture> for SourceTexture {
    fn from(texture: &wgpu::Texture) -> Self {
        Self::from_texture(texture)
    }
}
