/*!
# Prism RHI - DirectX 12 Backend

DirectX 12 implementation of the prism_rhi backend traits, built on the
`windows` crate (DXGI + D3D12).

Fences are `ID3D12Fence` objects waited on through a Win32 event, resource
layouts are root signatures with one descriptor table per element, and
descriptor heaps are real `ID3D12DescriptorHeap` objects addressed by slot.

The crate only has content on Windows targets. Register it next to the
Vulkan backend and select it with `GraphicsApi::DirectX12`:

```ignore
let mut registry = BackendRegistry::new();
prism_rhi_directx12::register(&mut registry);
```
*/

#![cfg(windows)]

mod dx12_adapter;
mod dx12_buffer;
mod dx12_command_list;
mod dx12_command_queue;
mod dx12_context;
mod dx12_debug;
mod dx12_descriptor_heap;
mod dx12_device;
mod dx12_fence;
mod dx12_format;
mod dx12_instance;
mod dx12_pipeline;
mod dx12_render_pass;
mod dx12_resource_layout;
mod dx12_sampler;
mod dx12_swapchain;
mod dx12_texture;

use prism_rhi::prism::rhi::BackendRegistry;

pub use dx12_adapter::Dx12Adapter;
pub use dx12_buffer::Dx12Buffer;
pub use dx12_command_list::{Dx12CommandAllocator, Dx12CommandList};
pub use dx12_command_queue::Dx12CommandQueue;
pub use dx12_debug::{debug_message_counts, reset_debug_message_counts, DebugMessageCounts};
pub use dx12_descriptor_heap::Dx12DescriptorHeap;
pub use dx12_device::Dx12Device;
pub use dx12_fence::Dx12Fence;
pub use dx12_instance::{Dx12BackendFactory, Dx12Instance};
pub use dx12_pipeline::Dx12Pipeline;
pub use dx12_render_pass::Dx12RenderPass;
pub use dx12_resource_layout::Dx12ResourceLayout;
pub use dx12_sampler::Dx12Sampler;
pub use dx12_swapchain::Dx12Swapchain;
pub use dx12_texture::Dx12Texture;

/// Register the DirectX 12 backend factory
pub fn register(registry: &mut BackendRegistry) {
    registry.register(Box::new(Dx12BackendFactory));
}
