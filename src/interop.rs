//! Shared memory objects: graphics textures wrapped for compute, and parameter buffers.
//!
//! A wrapped texture is not a copy. It is a view on the very storage the graphics context
//! allocated, and it shares that texture's ownership flag. Compute may only touch it between an
//! acquire and the matching release, graphics only outside of it.
use core::cell::Cell;
use std::rc::Rc;

use slotmap::{DefaultKey, SlotMap};
use wgpu::util::DeviceExt as _;

use crate::error::{Error, Result};
use crate::graphics::{Api, GraphicsContext, TextureName};
use crate::program::KernelArg;
use crate::session::Session;
use crate::util;

/// How compute accesses a wrapped texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
}

/// Holds all memory objects shared with compute.
#[derive(Default)]
pub struct Resources {
    images: SlotMap<DefaultKey, MemObject>,
    buffers: SlotMap<DefaultKey, wgpu::Buffer>,
}

/// A handle on a wrapped texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemKey(DefaultKey);

/// A handle on a parameter buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferKey(DefaultKey);

pub(crate) struct MemObject {
    texture: TextureName,
    access: Access,
    view: wgpu::TextureView,
    /// Shared with the texture slot of the graphics context.
    owner: Rc<Cell<Api>>,
}

impl Resources {
    pub fn new() -> Self {
        Resources::default()
    }

    /// Wrap a graphics texture as a compute memory object.
    ///
    /// The texture must have storage allocated, be two-dimensional with a single layer, and
    /// permit the requested access.
    #[track_caller]
    pub fn wrap_texture(
        &mut self,
        session: &Session,
        graphics: &GraphicsContext,
        texture: TextureName,
        access: Access,
    ) -> Result<MemKey> {
        if !session.is_linked_to(graphics) {
            return Err(Error::share(
                texture.get(),
                "the session does not share the graphics device",
            ));
        }

        let slot = graphics.slot(texture)?;
        let Some(storage) = &slot.storage else {
            return Err(Error::share(texture.get(), "texture has no storage"));
        };

        let tex = &storage.texture;
        if tex.dimension() != wgpu::TextureDimension::D2 || tex.depth_or_array_layers() != 1 {
            return Err(Error::share(texture.get(), "not a single layer 2D texture"));
        }

        match access {
            Access::ReadOnly => {
                if !tex.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
                    return Err(Error::share(texture.get(), "texture can not be sampled"));
                }
            }
            Access::WriteOnly => {
                let features = session
                    .device()
                    .adapter()
                    .get_texture_format_features(tex.format());

                if !tex.usage().contains(wgpu::TextureUsages::STORAGE_BINDING)
                    || !features
                        .allowed_usages
                        .contains(wgpu::TextureUsages::STORAGE_BINDING)
                {
                    return Err(Error::share(
                        texture.get(),
                        format!("{:?} texture can not be written by kernels", tex.format()),
                    ));
                }
            }
        }

        let view = tex.create_view(&wgpu::TextureViewDescriptor {
            label: Some("tandem shared texture"),
            ..Default::default()
        });

        let key = self.images.insert(MemObject {
            texture,
            access,
            view,
            owner: Rc::clone(&slot.owner),
        });

        log::debug!("Wrapped texture {} for {:?} access", texture.get(), access);
        Ok(MemKey(key))
    }

    /// Create a read-only buffer holding the nine filter weights.
    ///
    /// The contents are fixed at creation, the buffer can not be written afterwards.
    pub fn create_parameter_buffer(
        &mut self,
        session: &Session,
        weights: &[f32; 9],
    ) -> Result<BufferKey> {
        let device = session.context().device();
        let buffer = util::scoped(device, "create_buffer", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tandem filter weights"),
                contents: bytemuck::cast_slice(&weights[..]),
                usage: wgpu::BufferUsages::STORAGE,
            })
        })?;

        Ok(BufferKey(self.buffers.insert(buffer)))
    }

    /// Release a wrapped texture. Releasing it again has no effect.
    ///
    /// A texture still acquired by compute is handed back to graphics.
    pub fn release(&mut self, MemKey(key): MemKey) {
        if let Some(object) = self.images.remove(key) {
            object.owner.set(Api::Graphics);
            log::debug!("Released memory object of texture {}", object.texture.get());
        }
    }

    /// Release a parameter buffer. Releasing it again has no effect.
    pub fn release_buffer(&mut self, BufferKey(key): BufferKey) {
        if let Some(buffer) = self.buffers.remove(key) {
            buffer.destroy();
        }
    }

    pub fn is_valid(&self, MemKey(key): MemKey) -> bool {
        self.images.contains_key(key)
    }

    pub fn is_valid_buffer(&self, BufferKey(key): BufferKey) -> bool {
        self.buffers.contains_key(key)
    }

    pub fn parameter_buffer(&self, BufferKey(key): BufferKey) -> Option<&wgpu::Buffer> {
        self.buffers.get(key)
    }

    /// The graphics texture behind a memory object.
    pub fn texture(&self, MemKey(key): MemKey) -> Option<TextureName> {
        self.images.get(key).map(|object| object.texture)
    }

    /// Take ownership of memory objects for compute.
    ///
    /// All pending graphics work on the textures must have finished before this is called.
    #[track_caller]
    pub fn acquire(&self, keys: &[MemKey]) -> Result<()> {
        for &key in keys {
            let object = self.image("enqueue_acquire", key)?;
            if object.owner.get() != Api::Graphics {
                return Err(Error::backend(
                    "enqueue_acquire",
                    format!("texture {} is already acquired", object.texture.get()),
                ));
            }
        }

        for &MemKey(key) in keys {
            if let Some(object) = self.images.get(key) {
                object.owner.set(Api::Compute);
            }
        }

        Ok(())
    }

    /// Hand memory objects back to graphics.
    #[track_caller]
    pub fn release_to_graphics(&self, keys: &[MemKey]) -> Result<()> {
        for &key in keys {
            let object = self.image("enqueue_release", key)?;
            if object.owner.get() != Api::Compute {
                return Err(Error::backend(
                    "enqueue_release",
                    format!("texture {} was not acquired", object.texture.get()),
                ));
            }
        }

        for &MemKey(key) in keys {
            if let Some(object) = self.images.get(key) {
                object.owner.set(Api::Graphics);
            }
        }

        Ok(())
    }

    /// The kernel argument for a memory object, which must currently be owned by compute.
    #[track_caller]
    pub(crate) fn image_arg(&self, key: MemKey) -> Result<KernelArg<'_>> {
        let object = self.image("set_kernel_arg", key)?;

        if object.owner.get() != Api::Compute {
            return Err(Error::backend(
                "set_kernel_arg",
                format!("texture {} is not acquired by compute", object.texture.get()),
            ));
        }

        Ok(match object.access {
            Access::ReadOnly => KernelArg::Image(&object.view),
            Access::WriteOnly => KernelArg::StorageImage(&object.view),
        })
    }

    #[track_caller]
    pub(crate) fn buffer_arg(&self, BufferKey(key): BufferKey) -> Result<KernelArg<'_>> {
        match self.buffers.get(key) {
            Some(buffer) => Ok(KernelArg::Buffer(buffer)),
            None => Err(Error::backend("set_kernel_arg", "released parameter buffer")),
        }
    }

    #[track_caller]
    fn image(&self, call: &'static str, MemKey(key): MemKey) -> Result<&MemObject> {
        match self.images.get(key) {
            Some(object) => Ok(object),
            None => Err(Error::backend(call, "released memory object")),
        }
    }
}
