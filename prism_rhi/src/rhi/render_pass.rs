/// RenderPass - attachment formats and load/store behavior of a pass
///
/// Attachments keep their resource state across the pass: color attachments
/// must already be in `RenderTarget` and the depth attachment in
/// `DepthStencilWrite` when the pass begins, and they are left there.

use std::any::Any;
use crate::error::{Error, Result};
use crate::rhi::PixelFormat;

/// Maximum number of simultaneous color attachments
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// One attachment of a render pass
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDesc {
    pub format: PixelFormat,
    /// Number of samples (1 = no MSAA)
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Stencil aspect (depth attachments with stencil only)
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
}

impl AttachmentDesc {
    /// Single-sampled attachment with the given color/depth ops, stencil ignored
    pub fn new(format: PixelFormat, load_op: LoadOp, store_op: StoreOp) -> Self {
        Self {
            format,
            samples: 1,
            load_op,
            store_op,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
        }
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_stencil_ops(mut self, load_op: LoadOp, store_op: StoreOp) -> Self {
        self.stencil_load_op = load_op;
        self.stencil_store_op = store_op;
        self
    }
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
    pub name: String,
}

impl RenderPassDesc {
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(Error::InvalidResource(format!("render pass '{}': {}", self.name, reason)))
        };

        if self.color_attachments.is_empty() && self.depth_attachment.is_none() {
            return fail("no attachments".to_string());
        }
        if self.color_attachments.len() > MAX_COLOR_ATTACHMENTS {
            return fail(format!(
                "{} color attachments (max {})",
                self.color_attachments.len(),
                MAX_COLOR_ATTACHMENTS
            ));
        }

        let mut samples = None;
        for (i, attachment) in self.color_attachments.iter().enumerate() {
            if attachment.format == PixelFormat::Unknown || attachment.format.is_depth() {
                return fail(format!("color attachment {} has format {:?}", i, attachment.format));
            }
            if *samples.get_or_insert(attachment.samples) != attachment.samples {
                return fail("attachments disagree on sample count".to_string());
            }
        }
        if let Some(depth) = &self.depth_attachment {
            if !depth.format.is_depth() {
                return fail(format!("depth attachment has format {:?}", depth.format));
            }
            if *samples.get_or_insert(depth.samples) != depth.samples {
                return fail("attachments disagree on sample count".to_string());
            }
        }
        if let Some(count) = samples {
            if !matches!(count, 1 | 2 | 4 | 8) {
                return fail(format!("unsupported sample count {}", count));
            }
        }

        Ok(())
    }

    /// Sample count shared by all attachments
    pub fn sample_count(&self) -> u32 {
        self.color_attachments
            .first()
            .or(self.depth_attachment.as_ref())
            .map(|a| a.samples)
            .unwrap_or(1)
    }
}

/// Backend part of a render pass
pub trait RenderPassBackend: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Render pass object
pub struct RenderPass {
    desc: RenderPassDesc,
    backend: Box<dyn RenderPassBackend>,
}

impl RenderPass {
    pub(crate) fn new(desc: RenderPassDesc, backend: Box<dyn RenderPassBackend>) -> Self {
        Self { desc, backend }
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    pub fn color_attachment_count(&self) -> usize {
        self.desc.color_attachments.len()
    }

    pub fn has_depth(&self) -> bool {
        self.desc.depth_attachment.is_some()
    }

    /// Two passes are compatible when their attachment formats and sample
    /// counts agree (load/store ops may differ)
    pub fn is_compatible_with(&self, other: &RenderPass) -> bool {
        let same = |a: &AttachmentDesc, b: &AttachmentDesc| a.format == b.format && a.samples == b.samples;
        self.desc.color_attachments.len() == other.desc.color_attachments.len()
            && self
                .desc
                .color_attachments
                .iter()
                .zip(&other.desc.color_attachments)
                .all(|(a, b)| same(a, b))
            && match (&self.desc.depth_attachment, &other.desc.depth_attachment) {
                (Some(a), Some(b)) => same(a, b),
                (None, None) => true,
                _ => false,
            }
    }

    /// Downcast the backend part to its concrete type
    pub fn backend_as<T: 'static>(&self) -> Option<&T> {
        self.backend.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass").field("desc", &self.desc).finish()
    }
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
