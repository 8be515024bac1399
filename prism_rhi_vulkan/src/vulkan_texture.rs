/// Texture - VkImage with its allocation
///
/// Swapchain images are wrapped without ownership: the swapchain destroys
/// them, the wrapper only carries the handle and the format.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use prism_rhi::prism::rhi::{PixelFormat, TextureBackend, TextureDesc, TextureDimension, ViewKind};
use prism_rhi::prism::{Error, Result};
use prism_rhi::engine_error;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vulkan_context::{map_vk_error, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{aspect_mask, image_type, image_usage, image_view_type, pixel_format_to_vk, sample_count};

/// Vulkan texture implementation
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    allocation: Option<Allocation>,
    /// False for swapchain images
    owned: bool,
    format: PixelFormat,
    vk_format: vk::Format,
    dimension: TextureDimension,
    mip_levels: u32,
    array_layers: u32,
    /// Set by the first barrier; until then the image content is undefined
    initialized: AtomicBool,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let vk_format = pixel_format_to_vk(desc.format);
        let flags = if desc.dimension == TextureDimension::TextureCube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let (sharing_mode, families) = ctx.sharing();
        let create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type(desc.dimension))
            .format(vk_format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: desc.depth,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_size)
            .samples(sample_count(desc.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage(desc.usage, desc.format))
            .sharing_mode(sharing_mode)
            .queue_family_indices(&families)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = ctx
                .device
                .create_image(&create_info, None)
                .map_err(|e| map_vk_error("vkCreateImage", e))?;
            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = ctx.allocator().allocate(&AllocationCreateDesc {
                name: if desc.name.is_empty() { "texture" } else { desc.name.as_str() },
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    engine_error!(LOG_SOURCE, "Out of GPU memory for texture '{}' ({}x{}): {:?}",
                        desc.name, desc.width, desc.height, e);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.allocator().free(allocation).ok();
                ctx.device.destroy_image(image, None);
                return Err(map_vk_error("vkBindImageMemory", e));
            }

            Ok(Self {
                ctx,
                image,
                allocation: Some(allocation),
                owned: true,
                format: desc.format,
                vk_format,
                dimension: desc.dimension,
                mip_levels: desc.mip_levels,
                array_layers: desc.array_size,
                initialized: AtomicBool::new(false),
            })
        }
    }

    /// Non-owning wrapper around a swapchain image
    pub(crate) fn swapchain_image(ctx: Arc<GpuContext>, image: vk::Image, format: PixelFormat) -> Self {
        Self {
            ctx,
            image,
            allocation: None,
            owned: false,
            format,
            vk_format: pixel_format_to_vk(format),
            dimension: TextureDimension::Texture2D,
            mip_levels: 1,
            array_layers: 1,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub(crate) fn vk_format(&self) -> vk::Format {
        self.vk_format
    }

    pub(crate) fn is_depth(&self) -> bool {
        self.format.is_depth()
    }

    /// Every mip and layer of the image
    pub(crate) fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_mask(self.format),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }

    /// Mark the image as transitioned; returns whether it already was
    pub(crate) fn mark_initialized(&self) -> bool {
        self.initialized.swap(true, Ordering::AcqRel)
    }

    /// Create the image view a descriptor of `kind` refers to
    ///
    /// Attachment views cover mip 0 of layer 0; sampled views cover the whole
    /// image; storage views cover mip 0 of every layer.
    pub(crate) fn create_view(&self, kind: ViewKind) -> Result<vk::ImageView> {
        let full = self.full_range();
        let (view_type, range) = match kind {
            ViewKind::RenderTarget | ViewKind::DepthStencil => (
                vk::ImageViewType::TYPE_2D,
                vk::ImageSubresourceRange { level_count: 1, layer_count: 1, ..full },
            ),
            ViewKind::ShaderResource => {
                // Depth/stencil images are sampled through the depth aspect
                let aspect = if self.is_depth() { vk::ImageAspectFlags::DEPTH } else { full.aspect_mask };
                (
                    image_view_type(self.dimension, self.array_layers),
                    vk::ImageSubresourceRange { aspect_mask: aspect, ..full },
                )
            }
            ViewKind::UnorderedAccess => (
                image_view_type(self.dimension, self.array_layers),
                vk::ImageSubresourceRange { level_count: 1, ..full },
            ),
            ViewKind::ConstantBuffer | ViewKind::Sampler => {
                return Err(Error::InvalidResource(format!("{:?} view of a texture", kind)));
            }
        };

        let create_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(self.vk_format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(range);
        unsafe { self.ctx.device.create_image_view(&create_info, None) }
            .map_err(|e| map_vk_error("vkCreateImageView", e))
    }
}

impl TextureBackend for VulkanTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator().free(allocation).ok();
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
