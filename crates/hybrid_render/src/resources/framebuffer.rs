//! Render targets with named attachments

use super::TextureHandle;
use crate::backend::GpuFramebufferId;

/// Attachment point of a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Colour attachment `n`
    Colour(u8),
    /// Depth attachment
    Depth,
}

/// A render target.
///
/// Framebuffers belong to the resource manager; passes only hold handles, so
/// several passes may share one (ping-pong blur targets, water drawn into the
/// geometry pass's HDR target) without any ownership transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Backend object; `None` is the default framebuffer
    pub gpu: Option<GpuFramebufferId>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    attachments: Vec<(Attachment, TextureHandle)>,
}

impl FrameBuffer {
    pub(crate) fn new(
        gpu: Option<GpuFramebufferId>,
        width: u32,
        height: u32,
        attachments: Vec<(Attachment, TextureHandle)>,
    ) -> Self {
        Self {
            gpu,
            width,
            height,
            attachments,
        }
    }

    /// Texture behind an attachment point
    pub fn attachment(&self, attachment: Attachment) -> Option<TextureHandle> {
        self.attachments
            .iter()
            .find(|(point, _)| *point == attachment)
            .map(|(_, texture)| *texture)
    }

    /// All attachments
    pub fn attachments(&self) -> &[(Attachment, TextureHandle)] {
        &self.attachments
    }

    /// Whether this is the default framebuffer
    pub fn is_default(&self) -> bool {
        self.gpu.is_none()
    }
}
