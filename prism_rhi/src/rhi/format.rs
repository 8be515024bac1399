/// Pixel and vertex attribute formats shared by textures, views and input layouts

/// Texture, render target and vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum PixelFormat {
    Unknown,

    // Color formats
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R10G10B10A2_UNORM,
    R11G11B10_FLOAT,
    R16G16B16A16_FLOAT,
    R32_UINT,
    R32_FLOAT,
    R32G32_FLOAT,
    R32G32B32_FLOAT,
    R32G32B32A32_FLOAT,

    // Depth formats
    D16_UNORM,
    D24_UNORM_S8_UINT,
    D32_FLOAT,
    D32_FLOAT_S8_UINT,
}

impl PixelFormat {
    /// Returns true for depth (and depth/stencil) formats
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::D16_UNORM
                | PixelFormat::D24_UNORM_S8_UINT
                | PixelFormat::D32_FLOAT
                | PixelFormat::D32_FLOAT_S8_UINT
        )
    }

    /// Returns true for formats carrying a stencil component
    pub fn has_stencil(self) -> bool {
        matches!(self, PixelFormat::D24_UNORM_S8_UINT | PixelFormat::D32_FLOAT_S8_UINT)
    }

    /// Returns true for sRGB-encoded color formats
    pub fn is_srgb(self) -> bool {
        matches!(self, PixelFormat::R8G8B8A8_SRGB | PixelFormat::B8G8R8A8_SRGB)
    }

    /// Size of one texel (or one vertex attribute) in bytes, 0 for `Unknown`
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Unknown => 0,
            PixelFormat::R8_UNORM => 1,
            PixelFormat::R8G8_UNORM | PixelFormat::D16_UNORM => 2,
            PixelFormat::R8G8B8A8_UNORM
            | PixelFormat::R8G8B8A8_SRGB
            | PixelFormat::B8G8R8A8_UNORM
            | PixelFormat::B8G8R8A8_SRGB
            | PixelFormat::R10G10B10A2_UNORM
            | PixelFormat::R11G11B10_FLOAT
            | PixelFormat::R32_UINT
            | PixelFormat::R32_FLOAT
            | PixelFormat::D24_UNORM_S8_UINT
            | PixelFormat::D32_FLOAT => 4,
            PixelFormat::R16G16B16A16_FLOAT
            | PixelFormat::R32G32_FLOAT
            | PixelFormat::D32_FLOAT_S8_UINT => 8,
            PixelFormat::R32G32B32_FLOAT => 12,
            PixelFormat::R32G32B32A32_FLOAT => 16,
        }
    }
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes
    pub fn size(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}
