/// Conversion tables between prism RHI enums and Vulkan enums
///
/// Pure functions only; everything here is unit tested without a device.

use ash::vk;
use prism_rhi::prism::rhi::{
    AdapterType, AddressMode, BlendFactor, BlendOp, BorderColor, BoundResource, CompareOp,
    CullMode, DescriptorKind, FillMode, Filter, FrontFace, IndexFormat, LoadOp, PixelFormat,
    PrimitiveTopology, ResourceLayoutElement, BufferUsage, MemoryHeap, ResourceState, ShaderVisibility, StoreOp,
    TextureDimension, TextureUsage, VertexInputRate,
};

// ===== PIXEL FORMATS =====

pub(crate) fn pixel_format_to_vk(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::Unknown => vk::Format::UNDEFINED,
        PixelFormat::R8_UNORM => vk::Format::R8_UNORM,
        PixelFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        PixelFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::R10G10B10A2_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        PixelFormat::R11G11B10_FLOAT => vk::Format::B10G11R11_UFLOAT_PACK32,
        PixelFormat::R16G16B16A16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::R32_UINT => vk::Format::R32_UINT,
        PixelFormat::R32_FLOAT => vk::Format::R32_SFLOAT,
        PixelFormat::R32G32_FLOAT => vk::Format::R32G32_SFLOAT,
        PixelFormat::R32G32B32_FLOAT => vk::Format::R32G32B32_SFLOAT,
        PixelFormat::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::D16_UNORM => vk::Format::D16_UNORM,
        PixelFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        PixelFormat::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Inverse of `pixel_format_to_vk`; formats the RHI does not know map to `Unknown`
pub(crate) fn vk_format_to_pixel_format(format: vk::Format) -> PixelFormat {
    match format {
        vk::Format::R8_UNORM => PixelFormat::R8_UNORM,
        vk::Format::R8G8_UNORM => PixelFormat::R8G8_UNORM,
        vk::Format::R8G8B8A8_UNORM => PixelFormat::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => PixelFormat::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => PixelFormat::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => PixelFormat::B8G8R8A8_SRGB,
        vk::Format::A2B10G10R10_UNORM_PACK32 => PixelFormat::R10G10B10A2_UNORM,
        vk::Format::B10G11R11_UFLOAT_PACK32 => PixelFormat::R11G11B10_FLOAT,
        vk::Format::R16G16B16A16_SFLOAT => PixelFormat::R16G16B16A16_FLOAT,
        vk::Format::R32_UINT => PixelFormat::R32_UINT,
        vk::Format::R32_SFLOAT => PixelFormat::R32_FLOAT,
        vk::Format::R32G32_SFLOAT => PixelFormat::R32G32_FLOAT,
        vk::Format::R32G32B32_SFLOAT => PixelFormat::R32G32B32_FLOAT,
        vk::Format::R32G32B32A32_SFLOAT => PixelFormat::R32G32B32A32_FLOAT,
        vk::Format::D16_UNORM => PixelFormat::D16_UNORM,
        vk::Format::D24_UNORM_S8_UINT => PixelFormat::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT => PixelFormat::D32_FLOAT,
        vk::Format::D32_SFLOAT_S8_UINT => PixelFormat::D32_FLOAT_S8_UINT,
        _ => PixelFormat::Unknown,
    }
}

pub(crate) fn aspect_mask(format: PixelFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub(crate) fn index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

pub(crate) fn sample_count(samples: u32) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

// ===== BUFFERS =====

pub(crate) fn buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::CONSTANT) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.intersects(BufferUsage::SHADER_RESOURCE | BufferUsage::UNORDERED_ACCESS) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

pub(crate) fn memory_location(heap: MemoryHeap) -> gpu_allocator::MemoryLocation {
    match heap {
        MemoryHeap::Default => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryHeap::Upload => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryHeap::Readback => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

// ===== TEXTURES =====

pub(crate) fn image_type(dimension: TextureDimension) -> vk::ImageType {
    match dimension {
        TextureDimension::Texture1D => vk::ImageType::TYPE_1D,
        TextureDimension::Texture2D | TextureDimension::TextureCube => vk::ImageType::TYPE_2D,
        TextureDimension::Texture3D => vk::ImageType::TYPE_3D,
    }
}

/// View type covering every layer of a texture
pub(crate) fn image_view_type(dimension: TextureDimension, array_size: u32) -> vk::ImageViewType {
    match dimension {
        TextureDimension::Texture1D if array_size > 1 => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureDimension::Texture1D => vk::ImageViewType::TYPE_1D,
        TextureDimension::Texture2D if array_size > 1 => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureDimension::Texture2D => vk::ImageViewType::TYPE_2D,
        TextureDimension::Texture3D => vk::ImageViewType::TYPE_3D,
        TextureDimension::TextureCube if array_size > 6 => vk::ImageViewType::CUBE_ARRAY,
        TextureDimension::TextureCube => vk::ImageViewType::CUBE,
    }
}

pub(crate) fn image_usage(usage: TextureUsage, format: PixelFormat) -> vk::ImageUsageFlags {
    // Every texture can be a copy source or destination
    let mut flags = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::RENDER_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) && format.is_depth() {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::UNORDERED_ACCESS) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    flags
}

// ===== RESOURCE STATES =====

/// Layout, pipeline stages and access mask a resource state stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateAccess {
    pub layout: vk::ImageLayout,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

pub(crate) fn state_access(state: ResourceState, depth_format: bool) -> StateAccess {
    let shader_stages = vk::PipelineStageFlags2::VERTEX_SHADER
        | vk::PipelineStageFlags2::FRAGMENT_SHADER
        | vk::PipelineStageFlags2::COMPUTE_SHADER;
    let (layout, stages, access) = match state {
        ResourceState::Common => (
            vk::ImageLayout::GENERAL,
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
        ),
        ResourceState::VertexAndConstantBuffer => (
            vk::ImageLayout::UNDEFINED,
            vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT | shader_stages,
            vk::AccessFlags2::VERTEX_ATTRIBUTE_READ | vk::AccessFlags2::UNIFORM_READ,
        ),
        ResourceState::IndexBuffer => (
            vk::ImageLayout::UNDEFINED,
            vk::PipelineStageFlags2::INDEX_INPUT,
            vk::AccessFlags2::INDEX_READ,
        ),
        ResourceState::RenderTarget => (
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        ResourceState::UnorderedAccess => (
            vk::ImageLayout::GENERAL,
            shader_stages,
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
        ),
        ResourceState::DepthStencilWrite => (
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        ResourceState::DepthStencilRead => (
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::SHADER_SAMPLED_READ,
        ),
        ResourceState::GeneralRead => (
            if depth_format {
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            } else {
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            },
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_READ,
        ),
        ResourceState::CopySource => (
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_READ,
        ),
        ResourceState::CopyDestination => (
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        ),
        ResourceState::Present => (
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            vk::AccessFlags2::NONE,
        ),
    };
    StateAccess { layout, stages, access }
}

// ===== SAMPLERS =====

pub(crate) fn filter(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn mipmap_mode(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub(crate) fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub(crate) fn border_color(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub(crate) fn compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

// ===== RENDER PASSES =====

pub(crate) fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub(crate) fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

// ===== PIPELINES =====

pub(crate) fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub(crate) fn input_rate(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub(crate) fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn front_face(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub(crate) fn polygon_mode(mode: FillMode) -> vk::PolygonMode {
    match mode {
        FillMode::Solid => vk::PolygonMode::FILL,
        FillMode::Wireframe => vk::PolygonMode::LINE,
    }
}

pub(crate) fn blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

pub(crate) fn blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

/// RGBA write mask bits (R = 1, G = 2, B = 4, A = 8)
pub(crate) fn color_write_mask(mask: u8) -> vk::ColorComponentFlags {
    vk::ColorComponentFlags::from_raw(u32::from(mask & 0xF))
}

// ===== RESOURCE LAYOUTS =====

pub(crate) fn descriptor_type(element: &ResourceLayoutElement) -> vk::DescriptorType {
    match (element.kind, element.resource) {
        (DescriptorKind::ConstantBuffer, _) => vk::DescriptorType::UNIFORM_BUFFER,
        (DescriptorKind::ShaderResource, BoundResource::Texture) => vk::DescriptorType::SAMPLED_IMAGE,
        (DescriptorKind::ShaderResource, _) => vk::DescriptorType::STORAGE_BUFFER,
        (DescriptorKind::UnorderedAccess, BoundResource::Texture) => vk::DescriptorType::STORAGE_IMAGE,
        (DescriptorKind::UnorderedAccess, _) => vk::DescriptorType::STORAGE_BUFFER,
        (DescriptorKind::Sampler, _) => vk::DescriptorType::SAMPLER,
    }
}

pub(crate) fn shader_stages(visibility: ShaderVisibility) -> vk::ShaderStageFlags {
    match visibility {
        ShaderVisibility::All => vk::ShaderStageFlags::ALL,
        ShaderVisibility::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderVisibility::Pixel => vk::ShaderStageFlags::FRAGMENT,
        ShaderVisibility::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

// ===== ADAPTERS =====

pub(crate) fn adapter_type(device_type: vk::PhysicalDeviceType) -> AdapterType {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterType::Virtual,
        vk::PhysicalDeviceType::CPU => AdapterType::Software,
        _ => AdapterType::Other,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
