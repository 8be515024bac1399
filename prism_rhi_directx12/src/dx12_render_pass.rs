/// Dx12RenderPass - attachment formats and load ops
///
/// DirectX 12 has no render pass object: the formats feed pipeline state
/// creation and the load ops decide which clears `begin_render_pass` records.

use prism_rhi::prism::rhi::{LoadOp, RenderPassBackend, RenderPassDesc};
use std::any::Any;
use windows::Win32::Graphics::Direct3D12::{D3D12_CLEAR_FLAGS, D3D12_CLEAR_FLAG_DEPTH, D3D12_CLEAR_FLAG_STENCIL};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_FORMAT_UNKNOWN};

use crate::dx12_format::pixel_format_to_dxgi;

/// D3D12 pipelines describe at most eight render targets
const MAX_RENDER_TARGETS: usize = 8;

/// DirectX 12 implementation of `RenderPassBackend`
pub struct Dx12RenderPass {
    rtv_formats: Vec<DXGI_FORMAT>,
    dsv_format: DXGI_FORMAT,
    sample_count: u32,
    color_load_ops: Vec<LoadOp>,
    depth_load_op: Option<LoadOp>,
    /// Only set for formats with a stencil aspect
    stencil_load_op: Option<LoadOp>,
}

impl Dx12RenderPass {
    pub(crate) fn new(desc: &RenderPassDesc) -> Self {
        let depth = desc.depth_attachment.as_ref();
        Self {
            rtv_formats: desc.color_attachments.iter().map(|a| pixel_format_to_dxgi(a.format)).collect(),
            dsv_format: depth.map_or(DXGI_FORMAT_UNKNOWN, |a| pixel_format_to_dxgi(a.format)),
            sample_count: desc.sample_count(),
            color_load_ops: desc.color_attachments.iter().map(|a| a.load_op).collect(),
            depth_load_op: depth.map(|a| a.load_op),
            stencil_load_op: depth.filter(|a| a.format.has_stencil()).map(|a| a.stencil_load_op),
        }
    }

    pub fn render_target_count(&self) -> u32 {
        self.rtv_formats.len() as u32
    }

    /// Formats for `D3D12_GRAPHICS_PIPELINE_STATE_DESC::RTVFormats`
    pub fn rtv_format_array(&self) -> [DXGI_FORMAT; MAX_RENDER_TARGETS] {
        let mut formats = [DXGI_FORMAT_UNKNOWN; MAX_RENDER_TARGETS];
        for (dst, src) in formats.iter_mut().zip(&self.rtv_formats) {
            *dst = *src;
        }
        formats
    }

    pub fn dsv_format(&self) -> DXGI_FORMAT {
        self.dsv_format
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn clears_color(&self, index: usize) -> bool {
        self.color_load_ops.get(index) == Some(&LoadOp::Clear)
    }

    /// Aspects of the depth attachment cleared when the pass begins
    pub fn depth_clear_flags(&self) -> D3D12_CLEAR_FLAGS {
        let mut flags = D3D12_CLEAR_FLAGS(0);
        if self.depth_load_op == Some(LoadOp::Clear) {
            flags |= D3D12_CLEAR_FLAG_DEPTH;
        }
        if self.stencil_load_op == Some(LoadOp::Clear) {
            flags |= D3D12_CLEAR_FLAG_STENCIL;
        }
        flags
    }
}

impl RenderPassBackend for Dx12RenderPass {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "dx12_render_pass_tests.rs"]
mod tests;
