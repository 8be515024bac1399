/// Conversion tables between prism RHI enums and D3D12/DXGI enums
///
/// Pure functions only; everything here is unit tested without a device.

use prism_rhi::prism::rhi::{
    AddressMode, BlendFactor, BlendOp, BorderColor, BufferUsage, CommandListType, CompareOp,
    CullMode, DescriptorHeapType, DescriptorKind, FillMode, Filter, IndexFormat, MemoryHeap,
    PixelFormat, PrimitiveTopology, ResourceState, ShaderVisibility, TextureDimension,
    TextureUsage, VertexInputRate,
};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

// ===== PIXEL FORMATS =====

pub(crate) fn pixel_format_to_dxgi(format: PixelFormat) -> DXGI_FORMAT {
    match format {
        PixelFormat::Unknown => DXGI_FORMAT_UNKNOWN,
        PixelFormat::R8_UNORM => DXGI_FORMAT_R8_UNORM,
        PixelFormat::R8G8_UNORM => DXGI_FORMAT_R8G8_UNORM,
        PixelFormat::R8G8B8A8_UNORM => DXGI_FORMAT_R8G8B8A8_UNORM,
        PixelFormat::R8G8B8A8_SRGB => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
        PixelFormat::B8G8R8A8_UNORM => DXGI_FORMAT_B8G8R8A8_UNORM,
        PixelFormat::B8G8R8A8_SRGB => DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
        PixelFormat::R10G10B10A2_UNORM => DXGI_FORMAT_R10G10B10A2_UNORM,
        PixelFormat::R11G11B10_FLOAT => DXGI_FORMAT_R11G11B10_FLOAT,
        PixelFormat::R16G16B16A16_FLOAT => DXGI_FORMAT_R16G16B16A16_FLOAT,
        PixelFormat::R32_UINT => DXGI_FORMAT_R32_UINT,
        PixelFormat::R32_FLOAT => DXGI_FORMAT_R32_FLOAT,
        PixelFormat::R32G32_FLOAT => DXGI_FORMAT_R32G32_FLOAT,
        PixelFormat::R32G32B32_FLOAT => DXGI_FORMAT_R32G32B32_FLOAT,
        PixelFormat::R32G32B32A32_FLOAT => DXGI_FORMAT_R32G32B32A32_FLOAT,
        PixelFormat::D16_UNORM => DXGI_FORMAT_D16_UNORM,
        PixelFormat::D24_UNORM_S8_UINT => DXGI_FORMAT_D24_UNORM_S8_UINT,
        PixelFormat::D32_FLOAT => DXGI_FORMAT_D32_FLOAT,
        PixelFormat::D32_FLOAT_S8_UINT => DXGI_FORMAT_D32_FLOAT_S8X24_UINT,
    }
}

/// Inverse of `pixel_format_to_dxgi`; formats the RHI does not know map to `Unknown`
pub(crate) fn dxgi_to_pixel_format(format: DXGI_FORMAT) -> PixelFormat {
    match format {
        DXGI_FORMAT_R8_UNORM => PixelFormat::R8_UNORM,
        DXGI_FORMAT_R8G8_UNORM => PixelFormat::R8G8_UNORM,
        DXGI_FORMAT_R8G8B8A8_UNORM => PixelFormat::R8G8B8A8_UNORM,
        DXGI_FORMAT_R8G8B8A8_UNORM_SRGB => PixelFormat::R8G8B8A8_SRGB,
        DXGI_FORMAT_B8G8R8A8_UNORM => PixelFormat::B8G8R8A8_UNORM,
        DXGI_FORMAT_B8G8R8A8_UNORM_SRGB => PixelFormat::B8G8R8A8_SRGB,
        DXGI_FORMAT_R10G10B10A2_UNORM => PixelFormat::R10G10B10A2_UNORM,
        DXGI_FORMAT_R11G11B10_FLOAT => PixelFormat::R11G11B10_FLOAT,
        DXGI_FORMAT_R16G16B16A16_FLOAT => PixelFormat::R16G16B16A16_FLOAT,
        DXGI_FORMAT_R32_UINT => PixelFormat::R32_UINT,
        DXGI_FORMAT_R32_FLOAT => PixelFormat::R32_FLOAT,
        DXGI_FORMAT_R32G32_FLOAT => PixelFormat::R32G32_FLOAT,
        DXGI_FORMAT_R32G32B32_FLOAT => PixelFormat::R32G32B32_FLOAT,
        DXGI_FORMAT_R32G32B32A32_FLOAT => PixelFormat::R32G32B32A32_FLOAT,
        DXGI_FORMAT_D16_UNORM => PixelFormat::D16_UNORM,
        DXGI_FORMAT_D24_UNORM_S8_UINT => PixelFormat::D24_UNORM_S8_UINT,
        DXGI_FORMAT_D32_FLOAT => PixelFormat::D32_FLOAT,
        DXGI_FORMAT_D32_FLOAT_S8X24_UINT => PixelFormat::D32_FLOAT_S8_UINT,
        _ => PixelFormat::Unknown,
    }
}

/// Format the resource is created with
///
/// Depth textures that are also sampled need a typeless resource so both a
/// DSV and an SRV can be created on it.
pub(crate) fn resource_format(format: PixelFormat, usage: TextureUsage) -> DXGI_FORMAT {
    if !(format.is_depth() && usage.contains(TextureUsage::SHADER_RESOURCE)) {
        return pixel_format_to_dxgi(format);
    }
    match format {
        PixelFormat::D16_UNORM => DXGI_FORMAT_R16_TYPELESS,
        PixelFormat::D24_UNORM_S8_UINT => DXGI_FORMAT_R24G8_TYPELESS,
        PixelFormat::D32_FLOAT => DXGI_FORMAT_R32_TYPELESS,
        PixelFormat::D32_FLOAT_S8_UINT => DXGI_FORMAT_R32G8X24_TYPELESS,
        _ => pixel_format_to_dxgi(format),
    }
}

/// Format of a shader resource view (depth formats read their depth plane)
pub(crate) fn srv_format(format: PixelFormat) -> DXGI_FORMAT {
    match format {
        PixelFormat::D16_UNORM => DXGI_FORMAT_R16_UNORM,
        PixelFormat::D24_UNORM_S8_UINT => DXGI_FORMAT_R24_UNORM_X8_TYPELESS,
        PixelFormat::D32_FLOAT => DXGI_FORMAT_R32_FLOAT,
        PixelFormat::D32_FLOAT_S8_UINT => DXGI_FORMAT_R32_FLOAT_X8X24_TYPELESS,
        _ => pixel_format_to_dxgi(format),
    }
}

pub(crate) fn index_format(format: IndexFormat) -> DXGI_FORMAT {
    match format {
        IndexFormat::U16 => DXGI_FORMAT_R16_UINT,
        IndexFormat::U32 => DXGI_FORMAT_R32_UINT,
    }
}

// ===== RESOURCES =====

pub(crate) fn resource_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Common => D3D12_RESOURCE_STATE_COMMON,
        ResourceState::VertexAndConstantBuffer => D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER,
        ResourceState::IndexBuffer => D3D12_RESOURCE_STATE_INDEX_BUFFER,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
        ResourceState::UnorderedAccess => D3D12_RESOURCE_STATE_UNORDERED_ACCESS,
        ResourceState::DepthStencilWrite => D3D12_RESOURCE_STATE_DEPTH_WRITE,
        ResourceState::DepthStencilRead => D3D12_RESOURCE_STATE_DEPTH_READ,
        ResourceState::GeneralRead => D3D12_RESOURCE_STATE_GENERIC_READ,
        ResourceState::CopySource => D3D12_RESOURCE_STATE_COPY_SOURCE,
        ResourceState::CopyDestination => D3D12_RESOURCE_STATE_COPY_DEST,
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
    }
}

pub(crate) fn heap_type(heap: MemoryHeap) -> D3D12_HEAP_TYPE {
    match heap {
        MemoryHeap::Default => D3D12_HEAP_TYPE_DEFAULT,
        MemoryHeap::Upload => D3D12_HEAP_TYPE_UPLOAD,
        MemoryHeap::Readback => D3D12_HEAP_TYPE_READBACK,
    }
}

pub(crate) fn buffer_flags(usage: BufferUsage) -> D3D12_RESOURCE_FLAGS {
    if usage.contains(BufferUsage::UNORDERED_ACCESS) {
        D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS
    } else {
        D3D12_RESOURCE_FLAG_NONE
    }
}

pub(crate) fn texture_flags(usage: TextureUsage) -> D3D12_RESOURCE_FLAGS {
    let mut flags = D3D12_RESOURCE_FLAG_NONE;
    if usage.contains(TextureUsage::RENDER_TARGET) {
        flags |= D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL;
        if !usage.contains(TextureUsage::SHADER_RESOURCE) {
            flags |= D3D12_RESOURCE_FLAG_DENY_SHADER_RESOURCE;
        }
    }
    if usage.contains(TextureUsage::UNORDERED_ACCESS) {
        flags |= D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS;
    }
    flags
}

pub(crate) fn resource_dimension(dimension: TextureDimension) -> D3D12_RESOURCE_DIMENSION {
    match dimension {
        TextureDimension::Texture1D => D3D12_RESOURCE_DIMENSION_TEXTURE1D,
        TextureDimension::Texture2D | TextureDimension::TextureCube => D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        TextureDimension::Texture3D => D3D12_RESOURCE_DIMENSION_TEXTURE3D,
    }
}

pub(crate) fn command_list_type(list_type: CommandListType) -> D3D12_COMMAND_LIST_TYPE {
    match list_type {
        CommandListType::Graphics => D3D12_COMMAND_LIST_TYPE_DIRECT,
        CommandListType::Compute => D3D12_COMMAND_LIST_TYPE_COMPUTE,
        CommandListType::Copy => D3D12_COMMAND_LIST_TYPE_COPY,
    }
}

pub(crate) fn descriptor_heap_type(heap_type: DescriptorHeapType) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match heap_type {
        DescriptorHeapType::RenderTarget => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
        DescriptorHeapType::DepthStencil => D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        DescriptorHeapType::CbvSrvUav => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
        DescriptorHeapType::Sampler => D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
    }
}

// ===== SAMPLERS =====

const FILTER_REDUCTION_COMPARISON: i32 = 1 << 7;

fn filter_type(filter: Filter) -> i32 {
    match filter {
        Filter::Nearest => 0,
        Filter::Linear => 1,
    }
}

/// Encoded D3D12 filter: min in bits 4-5, mag in 2-3, mip in 0-1
pub(crate) fn filter(
    min: Filter,
    mag: Filter,
    mip: Filter,
    max_anisotropy: u32,
    comparison: bool,
) -> D3D12_FILTER {
    let reduction = if comparison { FILTER_REDUCTION_COMPARISON } else { 0 };
    if max_anisotropy > 1 {
        return D3D12_FILTER(D3D12_FILTER_ANISOTROPIC.0 | reduction);
    }
    D3D12_FILTER((filter_type(min) << 4) | (filter_type(mag) << 2) | filter_type(mip) | reduction)
}

pub(crate) fn address_mode(mode: AddressMode) -> D3D12_TEXTURE_ADDRESS_MODE {
    match mode {
        AddressMode::Wrap => D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressMode::Mirror => D3D12_TEXTURE_ADDRESS_MODE_MIRROR,
        AddressMode::Clamp => D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
        AddressMode::Border => D3D12_TEXTURE_ADDRESS_MODE_BORDER,
    }
}

pub(crate) fn comparison_func(op: CompareOp) -> D3D12_COMPARISON_FUNC {
    match op {
        CompareOp::Never => D3D12_COMPARISON_FUNC_NEVER,
        CompareOp::Less => D3D12_COMPARISON_FUNC_LESS,
        CompareOp::Equal => D3D12_COMPARISON_FUNC_EQUAL,
        CompareOp::LessOrEqual => D3D12_COMPARISON_FUNC_LESS_EQUAL,
        CompareOp::Greater => D3D12_COMPARISON_FUNC_GREATER,
        CompareOp::NotEqual => D3D12_COMPARISON_FUNC_NOT_EQUAL,
        CompareOp::GreaterOrEqual => D3D12_COMPARISON_FUNC_GREATER_EQUAL,
        CompareOp::Always => D3D12_COMPARISON_FUNC_ALWAYS,
    }
}

pub(crate) fn border_color(color: BorderColor) -> [f32; 4] {
    match color {
        BorderColor::TransparentBlack => [0.0, 0.0, 0.0, 0.0],
        BorderColor::OpaqueBlack => [0.0, 0.0, 0.0, 1.0],
        BorderColor::OpaqueWhite => [1.0, 1.0, 1.0, 1.0],
    }
}

pub(crate) fn static_border_color(color: BorderColor) -> D3D12_STATIC_BORDER_COLOR {
    match color {
        BorderColor::TransparentBlack => D3D12_STATIC_BORDER_COLOR_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => D3D12_STATIC_BORDER_COLOR_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => D3D12_STATIC_BORDER_COLOR_OPAQUE_WHITE,
    }
}

// ===== PIPELINE STATE =====

pub(crate) fn topology_type(topology: PrimitiveTopology) -> D3D12_PRIMITIVE_TOPOLOGY_TYPE {
    match topology {
        PrimitiveTopology::TriangleList | PrimitiveTopology::TriangleStrip => {
            D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE
        }
        PrimitiveTopology::LineList | PrimitiveTopology::LineStrip => D3D12_PRIMITIVE_TOPOLOGY_TYPE_LINE,
        PrimitiveTopology::PointList => D3D12_PRIMITIVE_TOPOLOGY_TYPE_POINT,
    }
}

pub(crate) fn primitive_topology(topology: PrimitiveTopology) -> D3D_PRIMITIVE_TOPOLOGY {
    match topology {
        PrimitiveTopology::TriangleList => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
        PrimitiveTopology::TriangleStrip => D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP,
        PrimitiveTopology::LineList => D3D_PRIMITIVE_TOPOLOGY_LINELIST,
        PrimitiveTopology::LineStrip => D3D_PRIMITIVE_TOPOLOGY_LINESTRIP,
        PrimitiveTopology::PointList => D3D_PRIMITIVE_TOPOLOGY_POINTLIST,
    }
}

pub(crate) fn input_classification(rate: VertexInputRate) -> D3D12_INPUT_CLASSIFICATION {
    match rate {
        VertexInputRate::Vertex => D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
        VertexInputRate::Instance => D3D12_INPUT_CLASSIFICATION_PER_INSTANCE_DATA,
    }
}

pub(crate) fn cull_mode(mode: CullMode) -> D3D12_CULL_MODE {
    match mode {
        CullMode::None => D3D12_CULL_MODE_NONE,
        CullMode::Front => D3D12_CULL_MODE_FRONT,
        CullMode::Back => D3D12_CULL_MODE_BACK,
    }
}

pub(crate) fn fill_mode(mode: FillMode) -> D3D12_FILL_MODE {
    match mode {
        FillMode::Solid => D3D12_FILL_MODE_SOLID,
        FillMode::Wireframe => D3D12_FILL_MODE_WIREFRAME,
    }
}

pub(crate) fn blend(factor: BlendFactor) -> D3D12_BLEND {
    match factor {
        BlendFactor::Zero => D3D12_BLEND_ZERO,
        BlendFactor::One => D3D12_BLEND_ONE,
        BlendFactor::SrcColor => D3D12_BLEND_SRC_COLOR,
        BlendFactor::OneMinusSrcColor => D3D12_BLEND_INV_SRC_COLOR,
        BlendFactor::DstColor => D3D12_BLEND_DEST_COLOR,
        BlendFactor::OneMinusDstColor => D3D12_BLEND_INV_DEST_COLOR,
        BlendFactor::SrcAlpha => D3D12_BLEND_SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => D3D12_BLEND_INV_SRC_ALPHA,
        BlendFactor::DstAlpha => D3D12_BLEND_DEST_ALPHA,
        BlendFactor::OneMinusDstAlpha => D3D12_BLEND_INV_DEST_ALPHA,
    }
}

pub(crate) fn blend_op(op: BlendOp) -> D3D12_BLEND_OP {
    match op {
        BlendOp::Add => D3D12_BLEND_OP_ADD,
        BlendOp::Subtract => D3D12_BLEND_OP_SUBTRACT,
        BlendOp::ReverseSubtract => D3D12_BLEND_OP_REV_SUBTRACT,
        BlendOp::Min => D3D12_BLEND_OP_MIN,
        BlendOp::Max => D3D12_BLEND_OP_MAX,
    }
}

// ===== RESOURCE LAYOUTS =====

pub(crate) fn descriptor_range_type(kind: DescriptorKind) -> D3D12_DESCRIPTOR_RANGE_TYPE {
    match kind {
        DescriptorKind::ConstantBuffer => D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
        DescriptorKind::ShaderResource => D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
        DescriptorKind::UnorderedAccess => D3D12_DESCRIPTOR_RANGE_TYPE_UAV,
        DescriptorKind::Sampler => D3D12_DESCRIPTOR_RANGE_TYPE_SAMPLER,
    }
}

pub(crate) fn shader_visibility(visibility: ShaderVisibility) -> D3D12_SHADER_VISIBILITY {
    match visibility {
        ShaderVisibility::All | ShaderVisibility::Compute => D3D12_SHADER_VISIBILITY_ALL,
        ShaderVisibility::Vertex => D3D12_SHADER_VISIBILITY_VERTEX,
        ShaderVisibility::Pixel => D3D12_SHADER_VISIBILITY_PIXEL,
    }
}

#[cfg(test)]
#[path = "dx12_format_tests.rs"]
mod tests;
