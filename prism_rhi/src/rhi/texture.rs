/// Texture resource, texture descriptor and descriptor factories

use std::any::Any;
use std::sync::Mutex;
use crate::error::{Error, Result};
use crate::rhi::{PixelFormat, ResourceState, TextureUsage, check_texture_state};

/// Upload rows of a texture must start on this boundary (bytes)
pub const TEXTURE_ROW_PITCH_ALIGNMENT: u32 = 256;

/// Upload data of a texture subresource must start on this boundary (bytes)
pub const TEXTURE_PLACEMENT_ALIGNMENT: u64 = 512;

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    Texture1D,
    Texture2D,
    Texture3D,
    /// Six 2-D faces (array_size is a multiple of 6)
    TextureCube,
}

/// Descriptor for creating a texture
///
/// Built with one of the factories (`texture_2d`, `render_target`, ...)
/// and adjusted with the builder methods.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    /// Depth in texels (3-D textures only, 1 otherwise)
    pub depth: u32,
    /// Number of array layers (6 per cube)
    pub array_size: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub format: PixelFormat,
    pub usage: TextureUsage,
    pub name: String,
}

impl TextureDesc {
    fn base(dimension: TextureDimension, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            dimension,
            width,
            height,
            depth: 1,
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format,
            usage: TextureUsage::SHADER_RESOURCE,
            name: String::new(),
        }
    }

    /// 1-D sampled texture
    pub fn texture_1d(width: u32, format: PixelFormat) -> Self {
        Self::base(TextureDimension::Texture1D, width, 1, format)
    }

    /// 2-D sampled texture (usage `SHADER_RESOURCE` only)
    pub fn texture_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::base(TextureDimension::Texture2D, width, height, format)
    }

    /// 3-D sampled texture
    pub fn texture_3d(width: u32, height: u32, depth: u32, format: PixelFormat) -> Self {
        Self {
            depth,
            ..Self::base(TextureDimension::Texture3D, width, height, format)
        }
    }

    /// Cube map (6 layers)
    pub fn texture_cube(size: u32, format: PixelFormat) -> Self {
        Self {
            array_size: 6,
            ..Self::base(TextureDimension::TextureCube, size, size, format)
        }
    }

    /// 2-D texture array
    pub fn texture_2d_array(width: u32, height: u32, layers: u32, format: PixelFormat) -> Self {
        Self {
            array_size: layers,
            ..Self::base(TextureDimension::Texture2D, width, height, format)
        }
    }

    /// 2-D color target that can also be sampled
    pub fn render_target(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            usage: TextureUsage::SHADER_RESOURCE | TextureUsage::RENDER_TARGET,
            ..Self::base(TextureDimension::Texture2D, width, height, format)
        }
    }

    /// 2-D depth target
    pub fn depth_stencil(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            usage: TextureUsage::DEPTH_STENCIL,
            ..Self::base(TextureDimension::Texture2D, width, height, format)
        }
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Maximum number of mips for the extent
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        32 - largest.leading_zeros()
    }

    /// Extent of a mip level (width, height, depth), never below 1
    pub fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        (
            (self.width >> mip).max(1),
            (self.height >> mip).max(1),
            (self.depth >> mip).max(1),
        )
    }

    /// Row pitch of upload data for a mip level
    pub fn upload_row_pitch(&self, mip: u32) -> u32 {
        let (width, _, _) = self.mip_extent(mip);
        let tight = width * self.format.bytes_per_pixel();
        tight.div_ceil(TEXTURE_ROW_PITCH_ALIGNMENT) * TEXTURE_ROW_PITCH_ALIGNMENT
    }

    /// Size of the upload data of one subresource of a mip level
    pub fn upload_size(&self, mip: u32) -> u64 {
        let (_, height, depth) = self.mip_extent(mip);
        self.upload_row_pitch(mip) as u64 * height as u64 * depth as u64
    }

    /// Check the descriptor before it reaches a backend
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(Error::InvalidResource(format!("texture '{}': {}", self.name, reason)))
        };

        if self.width == 0 || self.height == 0 || self.depth == 0 || self.array_size == 0 {
            return fail("extent and array size must be non-zero".to_string());
        }
        if self.format == PixelFormat::Unknown {
            return fail("format is Unknown".to_string());
        }
        match self.dimension {
            TextureDimension::Texture1D if self.height != 1 || self.depth != 1 => {
                return fail("1-D textures have height and depth 1".to_string());
            }
            TextureDimension::Texture2D if self.depth != 1 => {
                return fail("2-D textures have depth 1".to_string());
            }
            TextureDimension::Texture3D if self.array_size != 1 => {
                return fail("3-D textures cannot be arrays".to_string());
            }
            TextureDimension::TextureCube
                if self.width != self.height || self.array_size % 6 != 0 =>
            {
                return fail("cube maps are square with a multiple of 6 layers".to_string());
            }
            _ => {}
        }
        if self.mip_levels == 0 || self.mip_levels > self.max_mip_levels() {
            return fail(format!(
                "mip_levels {} outside 1..={}",
                self.mip_levels,
                self.max_mip_levels()
            ));
        }
        if !matches!(self.sample_count, 1 | 2 | 4 | 8) {
            return fail(format!("unsupported sample count {}", self.sample_count));
        }
        if self.sample_count > 1
            && (self.dimension != TextureDimension::Texture2D || self.mip_levels != 1)
        {
            return fail("multisampled textures are single-mip 2-D textures".to_string());
        }

        let wants_depth = self.usage.contains(TextureUsage::DEPTH_STENCIL);
        if self.format.is_depth() != wants_depth {
            return fail(format!(
                "format {:?} and DEPTH_STENCIL usage must go together",
                self.format
            ));
        }
        if wants_depth && self.usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::UNORDERED_ACCESS) {
            return fail("depth textures cannot be color or storage targets".to_string());
        }
        if self.usage.is_empty() {
            return fail("usage is empty".to_string());
        }

        Ok(())
    }
}

/// Backend part of a texture (image + memory)
pub trait TextureBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// GPU texture
///
/// Shared through `Arc<Texture>`; views only hold weak references.
pub struct Texture {
    desc: TextureDesc,
    state: Mutex<ResourceState>,
    is_back_buffer: bool,
    backend: Box<dyn TextureBackend>,
}

impl Texture {
    pub(crate) fn new(desc: TextureDesc, backend: Box<dyn TextureBackend>) -> Self {
        Self {
            desc,
            state: Mutex::new(ResourceState::Common),
            is_back_buffer: false,
            backend,
        }
    }

    /// Wrap a swapchain image (starts in `Present`)
    pub(crate) fn back_buffer(desc: TextureDesc, backend: Box<dyn TextureBackend>) -> Self {
        Self {
            desc,
            state: Mutex::new(ResourceState::Present),
            is_back_buffer: true,
            backend,
        }
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn format(&self) -> PixelFormat {
        self.desc.format
    }

    pub fn usage(&self) -> TextureUsage {
        self.desc.usage
    }

    pub fn is_back_buffer(&self) -> bool {
        self.is_back_buffer
    }

    /// State recorded by the last transition
    pub fn state(&self) -> ResourceState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Check that this texture may enter `state`
    pub fn check_state(&self, state: ResourceState) -> Result<()> {
        check_texture_state(&self.desc.name, self.desc.usage, self.is_back_buffer, state)
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        match self.state.lock() {
            Ok(mut current) => *current = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    pub fn backend(&self) -> &dyn TextureBackend {
        self.backend.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("desc", &self.desc)
            .field("state", &self.state())
            .field("is_back_buffer", &self.is_back_buffer)
            .finish()
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
