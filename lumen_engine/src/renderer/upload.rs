/// Immediate submission channel
///
/// A dedicated command buffer + fence for blocking host->device transfers
/// (mesh and texture uploads). Never used from inside frame recording: the
/// frame's command buffer is not submitted until after the frame is recorded,
/// so waiting here would stall on work that cannot start.

use crate::error::{Error, Result};
use crate::graphics_device::{
    AllocatedBuffer, AllocatedImage, BufferCopy, BufferDesc, BufferUsage, CommandBufferHandle,
    CommandPoolHandle, FenceHandle, GraphicsDevice, ImageDesc, ImageLayout, ImageUsage,
    MemoryUsage, Resource, SubmitDesc, Extent2D, TextureFormat,
};
use crate::renderer::DeletionQueue;

/// Long-lived state of the immediate submission channel
pub struct UploadContext {
    pub upload_fence: FenceHandle,
    pub command_pool: CommandPoolHandle,
    pub command_buffer: CommandBufferHandle,
    timeout_ns: u64,
    /// A submit whose completion was never observed; the fence and buffer are still in use
    in_flight: bool,
    /// Transfer buffers the unfinished submit may still read, released once it is done
    retired: DeletionQueue,
}

impl UploadContext {
    /// Create the channel's pool, buffer and (unsignaled) fence, registering them in `main_queue`
    pub fn create(
        device: &mut dyn GraphicsDevice,
        main_queue: &mut DeletionQueue,
        timeout_ns: u64,
    ) -> Result<Self> {
        let command_pool = device.create_command_pool()?;
        main_queue.push(Resource::CommandPool(command_pool));
        let command_buffer = device.allocate_command_buffer(command_pool)?;
        let upload_fence = device.create_fence(false)?;
        main_queue.push(Resource::Fence(upload_fence));

        Ok(Self {
            upload_fence,
            command_pool,
            command_buffer,
            timeout_ns,
            in_flight: false,
            retired: DeletionQueue::new(),
        })
    }

    /// True while a timed-out submit has not been observed complete
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Resources waiting for the unfinished submit
    pub fn retired(&self) -> &[Resource] {
        self.retired.pending()
    }

    /// Record `record` into the dedicated buffer, submit it and block until the GPU is done
    ///
    /// The fence and command buffer are reset before returning, so the channel
    /// is immediately reusable. If the fence wait fails the device is drained;
    /// when even that cannot confirm completion the channel stays in flight and
    /// refuses submits until [`finish_pending`](Self::finish_pending) succeeds.
    pub fn immediate_submit<F>(&mut self, device: &dyn GraphicsDevice, record: F) -> Result<()>
    where
        F: FnOnce(&dyn GraphicsDevice, CommandBufferHandle),
    {
        if self.in_flight {
            crate::engine_bail!("lumen::Upload", "Previous upload has not completed");
        }

        let cmd = self.command_buffer;
        device.begin_command_buffer(cmd, true)?;
        record(device, cmd);
        device.end_command_buffer(cmd)?;

        device.submit(&SubmitDesc {
            command_buffers: &[cmd],
            wait_semaphores: &[],
            signal_semaphores: &[],
            fence: Some(self.upload_fence),
        })?;

        if let Err(e) = device.wait_for_fence(self.upload_fence, self.timeout_ns) {
            crate::engine_error!("lumen::Upload", "Upload fence wait failed: {}", e);
            let drained = device
                .wait_idle()
                .and_then(|_| device.wait_for_fence(self.upload_fence, 0));
            if drained.is_err() {
                crate::engine_warn!("lumen::Upload", "Upload still running on the GPU, channel held");
                self.in_flight = true;
                return Err(e);
            }
            self.reset(device)?;
            return Err(e);
        }
        self.reset(device)
    }

    /// Wait for an unfinished submit, then release what it was reading
    ///
    /// No-op when nothing is in flight.
    pub fn finish_pending(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        device.wait_idle()?;
        device.wait_for_fence(self.upload_fence, self.timeout_ns)?;
        self.reset(&*device)?;
        self.in_flight = false;
        self.retired.flush(device);
        crate::engine_debug!("lumen::Upload", "Pending upload completed, channel released");
        Ok(())
    }

    /// Release retired transfer buffers unconditionally (device already idle at shutdown)
    pub(crate) fn release_retired(&mut self, device: &mut dyn GraphicsDevice) {
        self.retired.flush(device);
    }

    fn reset(&self, device: &dyn GraphicsDevice) -> Result<()> {
        device.reset_fence(self.upload_fence)?;
        device.reset_command_buffer(self.command_buffer)
    }

    /// Destroy `resources` now if the copy reading them finished, otherwise hold them
    fn discard(&mut self, device: &mut dyn GraphicsDevice, resources: &[Resource]) {
        for resource in resources {
            if self.in_flight {
                self.retired.push(*resource);
            } else {
                device.destroy_resource(*resource);
            }
        }
    }
}

/// Create a host-visible staging buffer holding `bytes`
fn create_staging(device: &mut dyn GraphicsDevice, bytes: &[u8]) -> Result<AllocatedBuffer> {
    let staging = device.create_buffer(&BufferDesc {
        size: bytes.len() as u64,
        usage: BufferUsage::TRANSFER_SRC,
        memory: MemoryUsage::CpuToGpu,
    })?;
    if let Err(e) = device.write_buffer(&staging, 0, bytes) {
        device.destroy_resource(Resource::Buffer(staging));
        return Err(e);
    }
    Ok(staging)
}

/// Copy `bytes` into a new device-local buffer through a staging buffer
///
/// The staging buffer is released as soon as the copy has completed. The
/// returned buffer is owned by the caller.
pub fn upload_buffer(
    device: &mut dyn GraphicsDevice,
    upload: &mut UploadContext,
    usage: BufferUsage,
    bytes: &[u8],
) -> Result<AllocatedBuffer> {
    if bytes.is_empty() {
        return Err(Error::InvalidResource("cannot upload an empty buffer".to_string()));
    }
    upload.finish_pending(device)?;

    let staging = create_staging(device, bytes)?;
    let buffer = match device.create_buffer(&BufferDesc {
        size: bytes.len() as u64,
        usage: usage | BufferUsage::TRANSFER_DST,
        memory: MemoryUsage::GpuOnly,
    }) {
        Ok(buffer) => buffer,
        Err(e) => {
            device.destroy_resource(Resource::Buffer(staging));
            return Err(e);
        }
    };

    let size = bytes.len() as u64;
    let copied = upload.immediate_submit(&*device, |device, cmd| {
        device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        }]);
    });
    if let Err(e) = copied {
        upload.discard(device, &[Resource::Buffer(staging), Resource::Buffer(buffer)]);
        return Err(e);
    }
    device.destroy_resource(Resource::Buffer(staging));

    crate::engine_trace!("lumen::Upload", "Uploaded {} bytes to buffer {}", size, buffer.buffer.raw());
    Ok(buffer)
}

/// Copy tightly packed `pixels` into a new sampled image
///
/// The image ends in `ShaderReadOnly` layout.
pub fn upload_image(
    device: &mut dyn GraphicsDevice,
    upload: &mut UploadContext,
    extent: Extent2D,
    format: TextureFormat,
    pixels: &[u8],
) -> Result<AllocatedImage> {
    let expected = extent.width as usize * extent.height as usize * format.bytes_per_pixel() as usize;
    if extent.is_empty() || pixels.len() != expected {
        return Err(Error::InvalidResource(format!(
            "image {}x{} {:?} needs {} bytes, got {}",
            extent.width,
            extent.height,
            format,
            expected,
            pixels.len()
        )));
    }

    upload.finish_pending(device)?;

    let staging = create_staging(device, pixels)?;
    let image = match device.create_image(&ImageDesc {
        extent,
        format,
        usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
    }) {
        Ok(image) => image,
        Err(e) => {
            device.destroy_resource(Resource::Buffer(staging));
            return Err(e);
        }
    };

    let copied = upload.immediate_submit(&*device, |device, cmd| {
        device.cmd_transition_image_layout(cmd, &image, ImageLayout::Undefined, ImageLayout::TransferDst);
        device.cmd_copy_buffer_to_image(cmd, staging.buffer, &image);
        device.cmd_transition_image_layout(cmd, &image, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
    });
    if let Err(e) = copied {
        upload.discard(device, &[Resource::Buffer(staging), Resource::Image(image)]);
        return Err(e);
    }
    device.destroy_resource(Resource::Buffer(staging));
    Ok(image)
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
