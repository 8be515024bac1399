/*!
# Prism RHI - Vulkan Backend

Vulkan 1.3 implementation of the prism_rhi backend traits.

Built on `ash` for the Vulkan bindings and `gpu-allocator` for memory.
Fences are timeline semaphores, render passes use dynamic rendering, and
resource bindings are written with push descriptors.

```no_run
use prism_rhi::prism::rhi::BackendRegistry;

let mut registry = BackendRegistry::new();
prism_rhi_vulkan::register(&mut registry);
```
*/

mod debug;
mod vulkan_adapter;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_command_queue;
mod vulkan_context;
mod vulkan_descriptor_heap;
mod vulkan_device;
mod vulkan_fence;
mod vulkan_format;
mod vulkan_instance;
mod vulkan_pipeline;
mod vulkan_render_pass;
mod vulkan_resource_layout;
mod vulkan_sampler;
mod vulkan_swapchain;
mod vulkan_texture;

use prism_rhi::prism::rhi::BackendRegistry;

pub use vulkan_adapter::VulkanAdapter;
pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_command_list::{VulkanCommandAllocator, VulkanCommandList};
pub use vulkan_command_queue::VulkanCommandQueue;
pub use vulkan_descriptor_heap::VulkanDescriptorHeap;
pub use vulkan_device::VulkanDevice;
pub use vulkan_fence::VulkanFence;
pub use vulkan_instance::{VulkanBackendFactory, VulkanInstance};
pub use vulkan_pipeline::VulkanPipeline;
pub use vulkan_render_pass::VulkanRenderPass;
pub use vulkan_resource_layout::VulkanResourceLayout;
pub use vulkan_sampler::VulkanSampler;
pub use vulkan_swapchain::VulkanSwapchain;
pub use vulkan_texture::VulkanTexture;

// Re-export debug utilities
pub use debug::{get_validation_stats, log_validation_summary, reset_validation_stats, ValidationStats};

/// Register the Vulkan backend factory
pub fn register(registry: &mut BackendRegistry) {
    registry.register(Box::new(VulkanBackendFactory));
}
