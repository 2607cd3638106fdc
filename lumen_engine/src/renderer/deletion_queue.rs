/// Deferred teardown queue
///
/// Records GPU objects as they are created and releases them in strict reverse
/// order on `flush`, so an object is always released before anything it was
/// built from (pipeline before its layout, view before its image).

use crate::graphics_device::{GraphicsDevice, Resource};

/// Ordered list of pending releases
///
/// Used at two scopes: engine lifetime (flushed once at shutdown) and per frame
/// slot (flushed each time the slot is reused, after its fence has signaled).
#[derive(Debug, Default)]
pub struct DeletionQueue {
    resources: Vec<Resource>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource for release at the next flush
    pub fn push(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Pending resources in registration order
    pub fn pending(&self) -> &[Resource] {
        &self.resources
    }

    /// Release everything through `device`, most recent first, then empty the queue
    pub fn flush(&mut self, device: &mut dyn GraphicsDevice) {
        self.flush_with(|resource| device.destroy_resource(resource));
    }

    /// Hand every pending resource to `release`, most recent first, then empty the queue
    pub fn flush_with<F: FnMut(Resource)>(&mut self, mut release: F) {
        if self.resources.is_empty() {
            return;
        }
        crate::engine_trace!("lumen::DeletionQueue", "Releasing {} resources", self.resources.len());
        while let Some(resource) = self.resources.pop() {
            release(resource);
        }
    }
}

#[cfg(test)]
#[path = "deletion_queue_tests.rs"]
mod tests;
