/// FrameBuffer - render target and depth textures bound to a render pass
///
/// Construction validates every attachment against the render pass and
/// fails fast with `FormatMismatch`: render targets must be single-layer
/// 2-D textures with `RENDER_TARGET` usage and a color format, the depth
/// target needs `DEPTH_STENCIL` usage and a depth format, and all
/// attachments share one extent.
///
/// Each render target gets a render target view plus a shader resource view
/// and an unordered access view when its usage allows them. `set_render_target`
/// and `set_depth_stencil` re-point these views in place, so swapping
/// targets (ping-pong passes) never issues descriptor slots.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::rhi::{
    RenderPass, ResourceView, Texture, TextureDimension, TextureUsage, ViewHeaps, ViewKind,
};
use crate::{engine_debug, engine_error};

/// Descriptor for creating a frame buffer
#[derive(Debug, Clone)]
pub struct FrameBufferDesc {
    pub render_pass: Arc<RenderPass>,
    pub render_targets: Vec<Arc<Texture>>,
    pub depth_stencil: Option<Arc<Texture>>,
    pub name: String,
}

/// Views of one color attachment
struct RenderTargetSlot {
    texture: Arc<Texture>,
    rtv: ResourceView,
    srv: Option<ResourceView>,
    uav: Option<ResourceView>,
}

/// Depth attachment and its view
struct DepthSlot {
    texture: Arc<Texture>,
    dsv: ResourceView,
}

/// Bound set of attachments for one render pass
pub struct FrameBuffer {
    name: String,
    render_pass: Arc<RenderPass>,
    render_targets: Vec<RenderTargetSlot>,
    depth_stencil: Option<DepthSlot>,
    width: u32,
    height: u32,
}

fn mismatch(frame_buffer: &str, reason: String) -> Error {
    engine_error!("prism::FrameBuffer", "Frame buffer '{}': {}", frame_buffer, reason);
    Error::FormatMismatch(format!("frame buffer '{}': {}", frame_buffer, reason))
}

fn check_render_target(
    frame_buffer: &str,
    render_pass: &RenderPass,
    index: usize,
    texture: &Texture,
) -> Result<()> {
    let desc = texture.desc();
    if desc.dimension != TextureDimension::Texture2D || desc.array_size != 1 {
        return Err(mismatch(frame_buffer, format!(
            "render target {} ('{}') is {:?} with {} layers, expected a single 2-D texture",
            index, texture.name(), desc.dimension, desc.array_size
        )));
    }
    if !desc.usage.contains(TextureUsage::RENDER_TARGET) {
        return Err(mismatch(frame_buffer, format!(
            "render target {} ('{}') lacks RENDER_TARGET usage (usage {:?})",
            index, texture.name(), desc.usage
        )));
    }
    let Some(attachment) = render_pass.desc().color_attachments.get(index) else {
        return Err(mismatch(frame_buffer, format!(
            "render pass has no color attachment {}",
            index
        )));
    };
    if desc.format != attachment.format || desc.sample_count != attachment.samples {
        return Err(mismatch(frame_buffer, format!(
            "render target {} ('{}') is {:?} x{}, render pass expects {:?} x{}",
            index, texture.name(), desc.format, desc.sample_count, attachment.format, attachment.samples
        )));
    }
    Ok(())
}

fn check_depth_stencil(frame_buffer: &str, render_pass: &RenderPass, texture: &Texture) -> Result<()> {
    let desc = texture.desc();
    if !desc.usage.contains(TextureUsage::DEPTH_STENCIL) || !desc.format.is_depth() {
        return Err(mismatch(frame_buffer, format!(
            "depth target '{}' lacks DEPTH_STENCIL usage or a depth format ({:?}, {:?})",
            texture.name(), desc.usage, desc.format
        )));
    }
    if desc.dimension != TextureDimension::Texture2D || desc.array_size != 1 {
        return Err(mismatch(frame_buffer, format!(
            "depth target '{}' is not a single 2-D texture",
            texture.name()
        )));
    }
    let Some(attachment) = &render_pass.desc().depth_attachment else {
        return Err(mismatch(frame_buffer, "render pass has no depth attachment".to_string()));
    };
    if desc.format != attachment.format || desc.sample_count != attachment.samples {
        return Err(mismatch(frame_buffer, format!(
            "depth target '{}' is {:?} x{}, render pass expects {:?} x{}",
            texture.name(), desc.format, desc.sample_count, attachment.format, attachment.samples
        )));
    }
    Ok(())
}

fn check_extent(frame_buffer: &str, texture: &Texture, width: u32, height: u32) -> Result<()> {
    if texture.width() != width || texture.height() != height {
        return Err(mismatch(frame_buffer, format!(
            "'{}' is {}x{}, other attachments are {}x{}",
            texture.name(), texture.width(), texture.height(), width, height
        )));
    }
    Ok(())
}

impl FrameBuffer {
    pub(crate) fn new(heaps: &ViewHeaps, desc: FrameBufferDesc) -> Result<Self> {
        let FrameBufferDesc { render_pass, render_targets, depth_stencil, name } = desc;

        if render_targets.len() != render_pass.color_attachment_count() {
            return Err(mismatch(&name, format!(
                "{} render targets for a render pass with {} color attachments",
                render_targets.len(),
                render_pass.color_attachment_count()
            )));
        }
        if depth_stencil.is_some() != render_pass.has_depth() {
            return Err(mismatch(&name, "depth target presence differs from the render pass".to_string()));
        }

        // Validate everything before issuing any descriptor slot
        for (index, texture) in render_targets.iter().enumerate() {
            check_render_target(&name, &render_pass, index, texture)?;
        }
        if let Some(depth) = &depth_stencil {
            check_depth_stencil(&name, &render_pass, depth)?;
        }
        let Some(first) = render_targets.first().or(depth_stencil.as_ref()) else {
            return Err(mismatch(&name, "no attachments".to_string()));
        };
        let (width, height) = (first.width(), first.height());
        for texture in render_targets.iter().chain(depth_stencil.iter()) {
            check_extent(&name, texture, width, height)?;
        }

        let mut slots = Vec::with_capacity(render_targets.len());
        for texture in render_targets {
            let rtv = heaps.texture_view(ViewKind::RenderTarget, &texture)?;
            let srv = if texture.usage().contains(TextureUsage::SHADER_RESOURCE) {
                Some(heaps.texture_view(ViewKind::ShaderResource, &texture)?)
            } else {
                None
            };
            let uav = if texture.usage().contains(TextureUsage::UNORDERED_ACCESS) {
                Some(heaps.texture_view(ViewKind::UnorderedAccess, &texture)?)
            } else {
                None
            };
            slots.push(RenderTargetSlot { texture, rtv, srv, uav });
        }
        let depth_stencil = match depth_stencil {
            Some(texture) => {
                let dsv = heaps.texture_view(ViewKind::DepthStencil, &texture)?;
                Some(DepthSlot { texture, dsv })
            }
            None => None,
        };

        engine_debug!("prism::FrameBuffer", "Created frame buffer '{}' ({}x{}, {} targets, depth: {})",
            name, width, height, slots.len(), depth_stencil.is_some());

        Ok(Self {
            name,
            render_pass,
            render_targets: slots,
            depth_stencil,
            width,
            height,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }

    pub fn render_target(&self, index: usize) -> Option<&Arc<Texture>> {
        self.render_targets.get(index).map(|slot| &slot.texture)
    }

    pub fn render_target_view(&self, index: usize) -> Option<&ResourceView> {
        self.render_targets.get(index).map(|slot| &slot.rtv)
    }

    pub fn shader_resource_view(&self, index: usize) -> Option<&ResourceView> {
        self.render_targets.get(index).and_then(|slot| slot.srv.as_ref())
    }

    pub fn unordered_access_view(&self, index: usize) -> Option<&ResourceView> {
        self.render_targets.get(index).and_then(|slot| slot.uav.as_ref())
    }

    pub fn depth_stencil(&self) -> Option<&Arc<Texture>> {
        self.depth_stencil.as_ref().map(|slot| &slot.texture)
    }

    pub fn depth_stencil_view(&self) -> Option<&ResourceView> {
        self.depth_stencil.as_ref().map(|slot| &slot.dsv)
    }

    /// View of `kind` for render target `index` (the depth view ignores `index`)
    pub fn view(&self, kind: ViewKind, index: usize) -> Option<&ResourceView> {
        match kind {
            ViewKind::RenderTarget => self.render_target_view(index),
            ViewKind::ShaderResource => self.shader_resource_view(index),
            ViewKind::UnorderedAccess => self.unordered_access_view(index),
            ViewKind::DepthStencil => self.depth_stencil_view(),
            ViewKind::ConstantBuffer | ViewKind::Sampler => None,
        }
    }

    /// Iterate over the color attachments
    pub fn render_targets(&self) -> impl Iterator<Item = &Arc<Texture>> {
        self.render_targets.iter().map(|slot| &slot.texture)
    }

    /// Point render target `index` and all its views at `texture`
    ///
    /// The new texture must fit the render pass like the original did,
    /// share the frame buffer extent and support every view the slot has.
    pub fn set_render_target(&mut self, texture: &Arc<Texture>, index: usize) -> Result<()> {
        check_render_target(&self.name, &self.render_pass, index, texture)?;
        check_extent(&self.name, texture, self.width, self.height)?;

        let Some(slot) = self.render_targets.get_mut(index) else {
            return Err(mismatch(&self.name, format!("no render target {}", index)));
        };
        let usage = texture.usage();
        if slot.srv.is_some() && !usage.contains(TextureUsage::SHADER_RESOURCE) {
            return Err(mismatch(&self.name, format!(
                "'{}' cannot replace render target {}: SHADER_RESOURCE usage missing",
                texture.name(), index
            )));
        }
        if slot.uav.is_some() && !usage.contains(TextureUsage::UNORDERED_ACCESS) {
            return Err(mismatch(&self.name, format!(
                "'{}' cannot replace render target {}: UNORDERED_ACCESS usage missing",
                texture.name(), index
            )));
        }

        slot.rtv.set_texture(texture)?;
        if let Some(srv) = &slot.srv {
            srv.set_texture(texture)?;
        }
        if let Some(uav) = &slot.uav {
            uav.set_texture(texture)?;
        }
        slot.texture = Arc::clone(texture);
        Ok(())
    }

    /// Point the depth attachment and its view at `texture`
    pub fn set_depth_stencil(&mut self, texture: &Arc<Texture>) -> Result<()> {
        check_depth_stencil(&self.name, &self.render_pass, texture)?;
        check_extent(&self.name, texture, self.width, self.height)?;

        let Some(slot) = self.depth_stencil.as_mut() else {
            return Err(mismatch(&self.name, "frame buffer has no depth attachment".to_string()));
        };
        slot.dsv.set_texture(texture)?;
        slot.texture = Arc::clone(texture);
        Ok(())
    }

    /// Views of every attachment, for backends building native framebuffers
    pub fn attachment_views(&self) -> impl Iterator<Item = &ResourceView> {
        self.render_targets
            .iter()
            .map(|slot| &slot.rtv)
            .chain(self.depth_stencil.iter().map(|slot| &slot.dsv))
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("render_targets", &self.render_targets.len())
            .field("depth", &self.depth_stencil.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "frame_buffer_tests.rs"]
mod tests;
