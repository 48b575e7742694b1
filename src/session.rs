//! The compute session: a context linked to the graphics context, and a queue on its device.
//!
//! Resources can only be shared between the two sides if both run on one logical device, so the
//! compute context does not open a device of its own. It attaches to the one the graphics
//! context was created with, after checking that this is indeed the selected device.
use std::sync::Arc;

use crate::catalog::{Device, Platform};
use crate::error::{Error, Result};
use crate::graphics::GraphicsContext;
use crate::util::Fence;

/// A compute context with its command queue, bound to one device.
///
/// Fields drop in declaration order, which releases the queue before the context.
pub struct Session {
    queue: CommandQueue,
    context: ComputeContext,
    device: Device,
    platform: Platform,
}

/// The compute context, sharing the logical device of a graphics context.
pub struct ComputeContext {
    device: Arc<wgpu::Device>,
}

/// An in-order queue of compute work.
pub struct CommandQueue {
    queue: Arc<wgpu::Queue>,
    device: Arc<wgpu::Device>,
}

impl Session {
    /// Create a session on the selected device, linked to an initialized graphics context.
    ///
    /// Fails if the graphics context runs on a different device than the one selected, as memory
    /// objects could then not be shared between the two.
    pub fn create(
        platform: &Platform,
        device: &Device,
        graphics: &GraphicsContext,
    ) -> Result<Self> {
        if !device.is_on(platform) {
            return Err(Error::backend(
                "create_context",
                format!("`{}` is not a device of {}", device.name(), platform.name()),
            ));
        }

        // Adapters are compared by identity, two boards of one model are still two devices.
        if graphics.selected_device() != device {
            return Err(Error::backend(
                "create_context",
                format!(
                    "the graphics context runs on `{}`, not on this `{}`",
                    graphics.selected_device().name(),
                    device.name()
                ),
            ));
        }

        if !device.supports_compute() {
            return Err(Error::backend(
                "create_context",
                format!("`{}` can not run compute kernels", device.name()),
            ));
        }

        let (shared, queue) = graphics.shared_device();
        let context = ComputeContext {
            device: Arc::clone(&shared),
        };

        let queue = CommandQueue {
            queue,
            device: shared,
        };

        log::info!("Compute session on `{}` ({})", device.name(), platform.name());
        Ok(Session {
            queue,
            context,
            device: device.clone(),
            platform: platform.clone(),
        })
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn context(&self) -> &ComputeContext {
        &self.context
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Whether this session shares its logical device with the graphics context.
    pub fn is_linked_to(&self, graphics: &GraphicsContext) -> bool {
        let (device, _) = graphics.shared_device();
        Arc::ptr_eq(&self.context.device, &device)
    }

    /// Wait for outstanding work, then release the queue and the context.
    pub fn destroy(self) -> Result<()> {
        let Session {
            queue,
            context,
            device,
            platform: _,
        } = self;

        queue.finish()?;
        drop(queue);
        log::info!("Released compute queue on `{}`", device.name());
        drop(context);
        log::info!("Released compute context on `{}`", device.name());
        Ok(())
    }
}

impl ComputeContext {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn shared(&self) -> Arc<wgpu::Device> {
        Arc::clone(&self.device)
    }
}

impl CommandQueue {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn submit(&self, commands: wgpu::CommandBuffer) {
        self.queue.submit(Some(commands));
    }

    /// Block until all work submitted to the queue has completed.
    #[track_caller]
    pub fn finish(&self) -> Result<()> {
        if Fence::on_queue(&self.queue, &self.device) {
            Ok(())
        } else {
            Err(Error::backend("finish", "compute queue did not finish"))
        }
    }
}
