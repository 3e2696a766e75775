use thiserror::Error;

/// Errors produced while configuring or running post-process passes.
#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("call set_source_texture before processing `{effect}`")]
    MissingSource { effect: &'static str },

    #[error("call set_source_texture2 before processing `{effect}`")]
    MissingSecondSource { effect: &'static str },

    #[error(
        "`{effect}` samples neighbouring texels and needs the source size; \
         build the source with SourceTexture::from_texture or with_size"
    )]
    MissingSourceSize { effect: &'static str },

    #[error("unknown post-process effect `{0}`")]
    UnknownEffect(String),

    #[error("invalid parameter for `{effect}`: {message}")]
    InvalidParameter {
        effect: &'static str,
        message: String,
    },

    #[error("invalid pass chain: {0}")]
    InvalidChain(String),

    #[error("no suitable GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("texture format {0:?} is not supported for this operation")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("texture readback failed: {0}")]
    Readback(String),

    #[error("invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}
