/// PipelineState - graphics and compute pipeline objects and their descriptors

use std::any::Any;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::rhi::{CompareOp, PixelFormat, RenderPass, ResourceLayout};
use crate::engine_error;

// ===== SHADERS =====

/// Pipeline stage a shader is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

/// Precompiled shader (SPIR-V for Vulkan, DXIL/DXBC for DirectX 12)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub stage: ShaderStage,
    pub code: Vec<u8>,
    pub entry_point: String,
}

impl ShaderBytecode {
    pub fn new(stage: ShaderStage, code: Vec<u8>, entry_point: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            entry_point: entry_point.into(),
        }
    }
}

// ===== VERTEX INPUT =====

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// One vertex buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferLayout {
    pub slot: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// One vertex attribute
///
/// `semantic`/`semantic_index` feed DirectX 12 input layouts, `location`
/// feeds Vulkan vertex attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: String,
    pub semantic_index: u32,
    pub location: u32,
    pub format: PixelFormat,
    pub buffer_slot: u32,
    pub offset: u32,
}

// ===== RASTERIZATION =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Polygon fill mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub fill_mode: FillMode,
    /// Constant depth bias (0 disables)
    pub depth_bias: i32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::Clockwise,
            fill_mode: FillMode::Solid,
            depth_bias: 0,
            slope_scaled_depth_bias: 0.0,
            depth_clip: true,
        }
    }
}

// ===== BLEND =====

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend state applied to every color attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    /// RGBA bits, 0xF writes every channel
    pub write_mask: u8,
}

impl BlendState {
    /// Blending disabled
    pub fn opaque() -> Self {
        Self {
            enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            write_mask: 0xF,
        }
    }

    /// Classic straight-alpha blending
    pub fn alpha_blend() -> Self {
        Self {
            enabled: true,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            ..Self::opaque()
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::opaque()
    }
}

// ===== DEPTH STENCIL =====

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
}

impl DepthStencilState {
    pub fn disabled() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_compare: CompareOp::Always,
        }
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
        }
    }
}

// ===== PIPELINE DESCRIPTORS =====

/// Descriptor for creating a graphics pipeline
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: ShaderBytecode,
    pub pixel_shader: Option<ShaderBytecode>,
    pub resource_layout: Arc<ResourceLayout>,
    pub render_pass: Arc<RenderPass>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub input_elements: Vec<InputElement>,
    pub topology: PrimitiveTopology,
    pub rasterizer: RasterizerState,
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
    pub name: String,
}

impl GraphicsPipelineDesc {
    /// Pipeline with default fixed-function state and no vertex input
    pub fn new(
        vertex_shader: ShaderBytecode,
        pixel_shader: Option<ShaderBytecode>,
        resource_layout: Arc<ResourceLayout>,
        render_pass: Arc<RenderPass>,
    ) -> Self {
        let depth_stencil = if render_pass.has_depth() {
            DepthStencilState::default()
        } else {
            DepthStencilState::disabled()
        };
        Self {
            vertex_shader,
            pixel_shader,
            resource_layout,
            render_pass,
            vertex_buffers: Vec::new(),
            input_elements: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerState::default(),
            blend: BlendState::default(),
            depth_stencil,
            name: String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            engine_error!("prism::PipelineState", "Graphics pipeline '{}': {}", self.name, reason);
            Err(Error::InvalidResource(format!("graphics pipeline '{}': {}", self.name, reason)))
        };

        check_shader(&self.vertex_shader, ShaderStage::Vertex).or_else(|e| fail(e))?;
        if let Some(pixel) = &self.pixel_shader {
            check_shader(pixel, ShaderStage::Pixel).or_else(|e| fail(e))?;
        }
        if (self.depth_stencil.depth_test || self.depth_stencil.depth_write) && !self.render_pass.has_depth() {
            return fail("depth testing needs a render pass with a depth attachment".to_string());
        }

        let mut slots = rustc_hash::FxHashSet::default();
        for layout in &self.vertex_buffers {
            if layout.stride == 0 || !slots.insert(layout.slot) {
                return fail(format!("vertex buffer slot {} is invalid or declared twice", layout.slot));
            }
        }
        let mut locations = rustc_hash::FxHashSet::default();
        for element in &self.input_elements {
            let Some(layout) = self.vertex_buffers.iter().find(|l| l.slot == element.buffer_slot) else {
                return fail(format!(
                    "input element '{}' uses undeclared vertex buffer slot {}",
                    element.semantic, element.buffer_slot
                ));
            };
            if element.offset + element.format.bytes_per_pixel() > layout.stride {
                return fail(format!("input element '{}' overflows its vertex stride", element.semantic));
            }
            if element.format == PixelFormat::Unknown || element.format.is_depth() {
                return fail(format!("input element '{}' has format {:?}", element.semantic, element.format));
            }
            if !locations.insert(element.location) {
                return fail(format!("input location {} declared twice", element.location));
            }
        }
        Ok(())
    }
}

/// Descriptor for creating a compute pipeline
#[derive(Debug, Clone)]
pub struct ComputePipelineDesc {
    pub compute_shader: ShaderBytecode,
    pub resource_layout: Arc<ResourceLayout>,
    pub name: String,
}

impl ComputePipelineDesc {
    pub fn validate(&self) -> Result<()> {
        check_shader(&self.compute_shader, ShaderStage::Compute).map_err(|reason| {
            engine_error!("prism::PipelineState", "Compute pipeline '{}': {}", self.name, reason);
            Error::InvalidResource(format!("compute pipeline '{}': {}", self.name, reason))
        })
    }
}

fn check_shader(shader: &ShaderBytecode, expected: ShaderStage) -> std::result::Result<(), String> {
    if shader.stage != expected {
        return Err(format!("{:?} shader bound to the {:?} slot", shader.stage, expected));
    }
    if shader.code.is_empty() {
        return Err(format!("{:?} shader has no bytecode", expected));
    }
    if shader.entry_point.is_empty() {
        return Err(format!("{:?} shader has no entry point", expected));
    }
    Ok(())
}

// ===== PIPELINE OBJECT =====

/// Pipeline bind point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Graphics,
    Compute,
}

/// Backend part of a pipeline
pub trait PipelineStateBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Compiled pipeline object
pub struct PipelineState {
    kind: PipelineKind,
    name: String,
    resource_layout: Arc<ResourceLayout>,
    render_pass: Option<Arc<RenderPass>>,
    backend: Box<dyn PipelineStateBackend>,
}

impl PipelineState {
    pub(crate) fn graphics(desc: &GraphicsPipelineDesc, backend: Box<dyn PipelineStateBackend>) -> Self {
        Self {
            kind: PipelineKind::Graphics,
            name: desc.name.clone(),
            resource_layout: Arc::clone(&desc.resource_layout),
            render_pass: Some(Arc::clone(&desc.render_pass)),
            backend,
        }
    }

    pub(crate) fn compute(desc: &ComputePipelineDesc, backend: Box<dyn PipelineStateBackend>) -> Self {
        Self {
            kind: PipelineKind::Compute,
            name: desc.name.clone(),
            resource_layout: Arc::clone(&desc.resource_layout),
            render_pass: None,
            backend,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_layout(&self) -> &Arc<ResourceLayout> {
        &self.resource_layout
    }

    /// Render pass the pipeline was built against (graphics only)
    pub fn render_pass(&self) -> Option<&Arc<RenderPass>> {
        self.render_pass.as_ref()
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
#[path = "pipeline_state_tests.rs"]
mod tests;
