//! Hand-off point between background loaders and the render thread
//!
//! Loader threads decode files into CPU-side payloads and send them through a
//! [`ResourceSender`]. They never see the backend; the thread that drives
//! the frame drains the [`ResourceInbox`] via
//! [`ResourceManager::drain_inbox`](super::ResourceManager::drain_inbox) and
//! performs the upload.

use std::sync::mpsc::{self, Receiver, Sender, TryIter};

use super::Geometry;
use crate::backend::TextureDesc;

/// CPU-side resource produced off the render thread
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedResource {
    /// Decoded RGBA8 image
    Texture {
        /// Texture name; completes a pending texture of the same name
        name: String,
        /// Size and format
        desc: TextureDesc,
        /// Texel data
        pixels: Vec<u8>,
    },
    /// Parsed mesh
    Geometry {
        /// Geometry name
        name: String,
        /// Vertex and index data
        geometry: Geometry,
    },
}

/// Cloneable sending half, safe to move into worker threads
#[derive(Debug, Clone)]
pub struct ResourceSender {
    sender: Sender<LoadedResource>,
}

impl ResourceSender {
    /// Queue a payload for upload. Returns `false` when the inbox is gone.
    pub fn send(&self, resource: LoadedResource) -> bool {
        match self.sender.send(resource) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Resource inbox closed, dropping loaded resource");
                false
            }
        }
    }
}

/// Receiving half, owned by the render thread
#[derive(Debug)]
pub struct ResourceInbox {
    sender: Sender<LoadedResource>,
    receiver: Receiver<LoadedResource>,
}

impl ResourceInbox {
    /// Create an empty inbox
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// A new sending half for a loader
    pub fn sender(&self) -> ResourceSender {
        ResourceSender {
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn try_iter(&self) -> TryIter<'_, LoadedResource> {
        self.receiver.try_iter()
    }
}

impl Default for ResourceInbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GraphicsBackend, RecordingBackend};
    use crate::resources::ResourceManager;

    #[test]
    fn test_worker_payloads_are_uploaded_on_drain() {
        let mut backend = RecordingBackend::new();
        let mut resources = ResourceManager::new(&mut backend, (16, 16));
        let pending = resources.reserve_texture("albedo", TextureDesc::rgba8(1, 1));
        let inbox = ResourceInbox::new();

        let sender = inbox.sender();
        let worker = std::thread::spawn(move || {
            sender.send(LoadedResource::Texture {
                name: "albedo".to_string(),
                desc: TextureDesc::rgba8(1, 1),
                pixels: vec![0, 255, 0, 255],
            });
            sender.send(LoadedResource::Geometry {
                name: "cube".to_string(),
                geometry: Geometry::cube(1.0),
            });
        });
        worker.join().unwrap();

        // Nothing reaches the backend until the render thread drains
        assert!(!resources.texture(pending).unwrap().is_loaded());

        assert_eq!(resources.drain_inbox(&mut backend, &inbox), 2);
        let gpu = resources.texture_gpu(pending);
        assert_eq!(backend.texel(gpu), Some([0.0, 1.0, 0.0, 1.0]));
        assert!(resources.find_geometry("cube").is_some());
        assert_eq!(backend.name(), "recording");
    }

    #[test]
    fn test_send_after_inbox_dropped() {
        let inbox = ResourceInbox::new();
        let sender = inbox.sender();
        drop(inbox);
        assert!(!sender.send(LoadedResource::Geometry {
            name: "x".to_string(),
            geometry: Geometry::plane(1.0),
        }));
    }
}
