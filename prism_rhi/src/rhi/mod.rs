/// Rendering hardware interface
///
/// API-agnostic objects wrapping one backend implementation each. Backend
/// crates implement the `*Backend` traits; everything else (validation,
/// state tracking, frame pacing) lives here.

pub mod format;
pub mod resource;
pub mod texture;
pub mod buffer;
pub mod fence;
pub mod descriptor_heap;
pub mod resource_view;
pub mod sampler;
pub mod render_pass;
pub mod resource_layout;
pub mod pipeline_state;
pub mod frame_buffer;
pub mod command_list;
pub mod command_queue;
pub mod swapchain;
pub mod device;
pub mod adapter;
pub mod instance;

#[cfg(test)]
pub(crate) mod mock_backend;

pub use format::*;
pub use resource::*;
pub use texture::*;
pub use buffer::*;
pub use fence::*;
pub use descriptor_heap::*;
pub use resource_view::*;
pub use sampler::*;
pub use render_pass::*;
pub use resource_layout::*;
pub use pipeline_state::*;
pub use frame_buffer::*;
pub use command_list::*;
pub use command_queue::*;
pub use swapchain::*;
pub use device::*;
pub use adapter::*;
pub use instance::*;
