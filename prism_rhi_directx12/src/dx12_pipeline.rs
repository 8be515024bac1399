/// Dx12Pipeline - graphics and compute pipeline state objects

use prism_rhi::prism::rhi::{
    BlendState, ComputePipelineDesc, DepthStencilState, FrontFace, GraphicsPipelineDesc, InputElement, PipelineKind,
    PipelineStateBackend, RasterizerState, VertexBufferLayout, VertexInputRate,
};
use prism_rhi::prism::{Error, Result};
use prism_rhi::{engine_bail, engine_debug, engine_error};
use std::any::Any;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::{D3D_PRIMITIVE_TOPOLOGY, D3D_PRIMITIVE_TOPOLOGY_UNDEFINED};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC;

use crate::dx12_context::{map_hr_error, set_debug_name, Dx12Context, LOG_SOURCE};
use crate::dx12_format::{
    blend, blend_op, comparison_func, cull_mode, fill_mode, input_classification, pixel_format_to_dxgi,
    primitive_topology, topology_type,
};
use crate::dx12_render_pass::Dx12RenderPass;
use crate::dx12_resource_layout::Dx12ResourceLayout;

/// Magic of the DXBC container, also used by DXIL from dxc
const DXBC_MAGIC: &[u8; 4] = b"DXBC";

pub(crate) fn check_bytecode(code: &[u8], pipeline: &str) -> Result<()> {
    if code.len() < DXBC_MAGIC.len() || &code[..DXBC_MAGIC.len()] != DXBC_MAGIC {
        engine_error!(LOG_SOURCE, "Pipeline '{}': shader is not a DXBC/DXIL container", pipeline);
        return Err(Error::InvalidResource(format!(
            "pipeline '{}': shader bytecode is not DXBC/DXIL",
            pipeline
        )));
    }
    Ok(())
}

fn shader_bytecode(code: &[u8]) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: code.as_ptr() as *const _,
        BytecodeLength: code.len(),
    }
}

pub(crate) fn rasterizer_desc(state: &RasterizerState) -> D3D12_RASTERIZER_DESC {
    D3D12_RASTERIZER_DESC {
        FillMode: fill_mode(state.fill_mode),
        CullMode: cull_mode(state.cull_mode),
        FrontCounterClockwise: (state.front_face == FrontFace::CounterClockwise).into(),
        DepthBias: state.depth_bias,
        DepthBiasClamp: 0.0,
        SlopeScaledDepthBias: state.slope_scaled_depth_bias,
        DepthClipEnable: state.depth_clip.into(),
        MultisampleEnable: false.into(),
        AntialiasedLineEnable: false.into(),
        ForcedSampleCount: 0,
        ConservativeRaster: D3D12_CONSERVATIVE_RASTERIZATION_MODE_OFF,
    }
}

/// The same blend state on every render target
pub(crate) fn blend_desc(state: &BlendState) -> D3D12_BLEND_DESC {
    let target = D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: state.enabled.into(),
        LogicOpEnable: false.into(),
        SrcBlend: blend(state.src_color),
        DestBlend: blend(state.dst_color),
        BlendOp: blend_op(state.color_op),
        SrcBlendAlpha: blend(state.src_alpha),
        DestBlendAlpha: blend(state.dst_alpha),
        BlendOpAlpha: blend_op(state.alpha_op),
        LogicOp: D3D12_LOGIC_OP_NOOP,
        RenderTargetWriteMask: state.write_mask & 0xF,
    };
    D3D12_BLEND_DESC {
        AlphaToCoverageEnable: false.into(),
        IndependentBlendEnable: false.into(),
        RenderTarget: [target; 8],
    }
}

/// Depth testing is forced off for passes without a depth attachment
pub(crate) fn depth_stencil_desc(state: &DepthStencilState, has_depth: bool) -> D3D12_DEPTH_STENCIL_DESC {
    let depth_test = has_depth && state.depth_test;
    D3D12_DEPTH_STENCIL_DESC {
        DepthEnable: depth_test.into(),
        DepthWriteMask: if depth_test && state.depth_write {
            D3D12_DEPTH_WRITE_MASK_ALL
        } else {
            D3D12_DEPTH_WRITE_MASK_ZERO
        },
        DepthFunc: comparison_func(state.depth_compare),
        StencilEnable: false.into(),
        ..Default::default()
    }
}

/// Semantic names as C strings; the input layout points into them
pub(crate) fn semantic_names(elements: &[InputElement]) -> Result<Vec<CString>> {
    elements
        .iter()
        .map(|element| {
            CString::new(element.semantic.as_str()).map_err(|_| {
                engine_error!(LOG_SOURCE, "Semantic '{}' contains a NUL byte", element.semantic);
                Error::InvalidResource(format!("semantic '{}' contains a NUL byte", element.semantic))
            })
        })
        .collect()
}

pub(crate) fn input_element_descs(
    elements: &[InputElement],
    buffers: &[VertexBufferLayout],
    names: &[CString],
) -> Vec<D3D12_INPUT_ELEMENT_DESC> {
    elements
        .iter()
        .zip(names)
        .map(|(element, name)| {
            let rate = buffers
                .iter()
                .find(|b| b.slot == element.buffer_slot)
                .map_or(VertexInputRate::Vertex, |b| b.input_rate);
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(name.as_ptr() as *const u8),
                SemanticIndex: element.semantic_index,
                Format: pixel_format_to_dxgi(element.format),
                InputSlot: element.buffer_slot,
                AlignedByteOffset: element.offset,
                InputSlotClass: input_classification(rate),
                InstanceDataStepRate: if rate == VertexInputRate::Instance { 1 } else { 0 },
            }
        })
        .collect()
}

fn root_signature(layout: &Dx12ResourceLayout) -> ManuallyDrop<Option<ID3D12RootSignature>> {
    // Borrowed for the duration of the create call, no reference taken
    unsafe { std::mem::transmute_copy(layout.root_signature()) }
}

/// DirectX 12 implementation of `PipelineStateBackend`
pub struct Dx12Pipeline {
    pso: ID3D12PipelineState,
    kind: PipelineKind,
    topology: D3D_PRIMITIVE_TOPOLOGY,
}

unsafe impl Send for Dx12Pipeline {}
unsafe impl Sync for Dx12Pipeline {}

impl Dx12Pipeline {
    pub(crate) fn new_graphics(ctx: &Dx12Context, desc: &GraphicsPipelineDesc) -> Result<Self> {
        let Some(layout) = desc.resource_layout.backend_as::<Dx12ResourceLayout>() else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}': layout was not created by the DirectX 12 backend", desc.name);
        };
        let Some(render_pass) = desc.render_pass.backend_as::<Dx12RenderPass>() else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}': render pass was not created by the DirectX 12 backend", desc.name);
        };

        check_bytecode(&desc.vertex_shader.code, &desc.name)?;
        let pixel_shader = match &desc.pixel_shader {
            Some(shader) => {
                check_bytecode(&shader.code, &desc.name)?;
                shader_bytecode(&shader.code)
            }
            None => D3D12_SHADER_BYTECODE::default(),
        };

        let names = semantic_names(&desc.input_elements)?;
        let input_elements = input_element_descs(&desc.input_elements, &desc.vertex_buffers, &names);
        let has_depth = desc.render_pass.has_depth();

        let pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: root_signature(layout),
            VS: shader_bytecode(&desc.vertex_shader.code),
            PS: pixel_shader,
            BlendState: blend_desc(&desc.blend),
            SampleMask: u32::MAX,
            RasterizerState: rasterizer_desc(&desc.rasterizer),
            DepthStencilState: depth_stencil_desc(&desc.depth_stencil, has_depth),
            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_elements.as_ptr(),
                NumElements: input_elements.len() as u32,
            },
            PrimitiveTopologyType: topology_type(desc.topology),
            NumRenderTargets: render_pass.render_target_count(),
            RTVFormats: render_pass.rtv_format_array(),
            DSVFormat: render_pass.dsv_format(),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: render_pass.sample_count(),
                Quality: 0,
            },
            ..Default::default()
        };

        let pso: ID3D12PipelineState = unsafe { ctx.device.CreateGraphicsPipelineState(&pso_desc) }
            .map_err(|e| map_hr_error("ID3D12Device::CreateGraphicsPipelineState", e))?;
        set_debug_name(&pso, &desc.name);

        engine_debug!(
            LOG_SOURCE,
            "Graphics pipeline '{}' created ({} input elements, {} render targets)",
            desc.name, input_elements.len(), render_pass.render_target_count()
        );

        Ok(Self {
            pso,
            kind: PipelineKind::Graphics,
            topology: primitive_topology(desc.topology),
        })
    }

    pub(crate) fn new_compute(ctx: &Dx12Context, desc: &ComputePipelineDesc) -> Result<Self> {
        let Some(layout) = desc.resource_layout.backend_as::<Dx12ResourceLayout>() else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}': layout was not created by the DirectX 12 backend", desc.name);
        };
        check_bytecode(&desc.compute_shader.code, &desc.name)?;

        let pso_desc = D3D12_COMPUTE_PIPELINE_STATE_DESC {
            pRootSignature: root_signature(layout),
            CS: shader_bytecode(&desc.compute_shader.code),
            ..Default::default()
        };
        let pso: ID3D12PipelineState = unsafe { ctx.device.CreateComputePipelineState(&pso_desc) }
            .map_err(|e| map_hr_error("ID3D12Device::CreateComputePipelineState", e))?;
        set_debug_name(&pso, &desc.name);

        engine_debug!(LOG_SOURCE, "Compute pipeline '{}' created", desc.name);

        Ok(Self {
            pso,
            kind: PipelineKind::Compute,
            topology: D3D_PRIMITIVE_TOPOLOGY_UNDEFINED,
        })
    }

    pub fn pso(&self) -> &ID3D12PipelineState {
        &self.pso
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Topology set on the command list together with a graphics pipeline
    pub(crate) fn topology(&self) -> D3D_PRIMITIVE_TOPOLOGY {
        self.topology
    }
}

impl PipelineStateBackend for Dx12Pipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "dx12_pipeline_tests.rs"]
mod tests;
