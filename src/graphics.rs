//! The graphics side: the logical device driving the window and the textures it owns.
//!
//! Textures follow the model of a classic graphics API. A texture name is generated first and
//! storage is allocated separately, so a name can exist without any storage behind it. Every
//! texture carries an ownership flag that the compute side flips when acquiring it.
use core::cell::Cell;
use core::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use crate::catalog;
use crate::error::{Error, Result};
use crate::util::{self, ErrorSink, Fence};

/// The API currently allowed to access a shared texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Api {
    Graphics,
    Compute,
}

/// The name of a texture in a graphics context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureName(NonZeroU32);

/// How a texture is going to be used, which decides what the backend permits on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureRole {
    /// An image uploaded by the host and sampled afterwards.
    Image,
    /// A render target written by a kernel and sampled by draw calls.
    Target,
}

/// Storage parameters of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureSpec {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub role: TextureRole,
}

/// An initialized graphics context.
pub struct GraphicsContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    /// The catalog entry of the adapter the device was opened on.
    selected: catalog::Device,
    errors: ErrorSink,
    textures: Vec<TextureSlot>,
    /// Recorded graphics work which has not been submitted yet.
    pending: Vec<wgpu::CommandBuffer>,
}

pub(crate) struct TextureSlot {
    pub(crate) storage: Option<Storage>,
    pub(crate) owner: Rc<Cell<Api>>,
}

pub(crate) struct Storage {
    pub(crate) texture: wgpu::Texture,
    pub(crate) spec: TextureSpec,
}

impl GraphicsContext {
    /// Open a logical device on the selected adapter.
    pub fn new(device: &catalog::Device) -> Result<Self> {
        let adapter = device.adapter();
        let request = adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tandem graphics"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        );

        let (logical, queue) =
            util::block_on(request).map_err(|err| Error::backend("request_device", err))?;

        let errors = ErrorSink::install(&logical);

        log::info!("Graphics context on `{}`", device.name());
        Ok(GraphicsContext {
            device: Arc::new(logical),
            queue: Arc::new(queue),
            selected: device.clone(),
            errors,
            textures: vec![],
            pending: vec![],
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The device this context was created on.
    pub fn selected_device(&self) -> &catalog::Device {
        &self.selected
    }

    /// Report a backend error raised outside of the calls of this crate, e.g. in a draw.
    ///
    /// Such errors are collected per device, so this also reports failures of compute work
    /// submitted through a linked session.
    #[track_caller]
    pub fn check_errors(&self) -> Result<()> {
        self.errors.check("device")
    }

    pub(crate) fn shared_device(&self) -> (Arc<wgpu::Device>, Arc<wgpu::Queue>) {
        (Arc::clone(&self.device), Arc::clone(&self.queue))
    }

    /// Generate a new texture name, without any storage.
    pub fn gen_texture(&mut self) -> TextureName {
        self.textures.push(TextureSlot {
            storage: None,
            owner: Rc::new(Cell::new(Api::Graphics)),
        });

        let name = u32::try_from(self.textures.len()).unwrap_or(u32::MAX);
        TextureName(NonZeroU32::new(name).unwrap_or(NonZeroU32::MAX))
    }

    /// Allocate storage for a texture, optionally initializing it with tightly packed rows.
    pub fn tex_image(
        &mut self,
        name: TextureName,
        spec: TextureSpec,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let device = Arc::clone(&self.device);
        let queue = Arc::clone(&self.queue);
        let slot = self.slot_mut(name)?;

        if slot.owner.get() != Api::Graphics {
            return Err(Error::backend("tex_image", "texture is acquired by compute"));
        }

        if spec.width == 0 || spec.height == 0 {
            return Err(Error::allocation("texture storage", "zero-sized texture"));
        }

        let texel = spec
            .format
            .block_copy_size(None)
            .ok_or_else(|| Error::backend("tex_image", "format has no plain texel layout"))?;
        let bytes_per_row = spec.width * texel;

        if let Some(data) = data {
            let expected = bytes_per_row as usize * spec.height as usize;
            if data.len() != expected {
                return Err(Error::backend(
                    "tex_image",
                    format!("{} bytes of data for {} bytes of texture", data.len(), expected),
                ));
            }
        }

        let size = wgpu::Extent3d {
            width: spec.width,
            height: spec.height,
            depth_or_array_layers: 1,
        };

        let texture = util::scoped(&device, "tex_image", || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("tandem texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: spec.format,
                usage: spec.role.usage(),
                view_formats: &[],
            });

            if let Some(data) = data {
                queue.write_texture(
                    wgpu::ImageCopyTexture {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    data,
                    wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(spec.height),
                    },
                    size,
                );
            }

            texture
        })?;

        slot.storage = Some(Storage { texture, spec });
        Ok(())
    }

    /// Generate a texture and allocate its storage in one go.
    pub fn create_texture(
        &mut self,
        spec: TextureSpec,
        data: Option<&[u8]>,
    ) -> Result<TextureName> {
        let name = self.gen_texture();
        self.tex_image(name, spec, data)?;
        Ok(name)
    }

    /// Upload a decoded image as a sampled texture.
    pub fn upload_image(&mut self, image: &image::RgbaImage) -> Result<TextureName> {
        let spec = TextureSpec {
            width: image.width(),
            height: image.height(),
            format: wgpu::TextureFormat::Rgba8Unorm,
            role: TextureRole::Image,
        };

        self.create_texture(spec, Some(image.as_raw().as_slice()))
    }

    /// The storage parameters of a texture, `None` while it has no storage.
    pub fn spec(&self, name: TextureName) -> Option<TextureSpec> {
        let slot = self.slot(name).ok()?;
        slot.storage.as_ref().map(|storage| storage.spec)
    }

    /// The API currently owning the texture.
    pub fn owner(&self, name: TextureName) -> Option<Api> {
        self.slot(name).ok().map(|slot| slot.owner.get())
    }

    /// Access a texture for a draw call.
    ///
    /// Fails while the texture is acquired by compute or has no storage.
    #[track_caller]
    pub fn sample(&self, name: TextureName) -> Result<&wgpu::Texture> {
        let slot = self.slot(name)?;

        if slot.owner.get() != Api::Graphics {
            return Err(Error::backend(
                "sample",
                format!("texture {} is acquired by compute", name.get()),
            ));
        }

        match &slot.storage {
            Some(storage) => Ok(&storage.texture),
            None => Err(Error::backend(
                "sample",
                format!("texture {} has no storage", name.get()),
            )),
        }
    }

    /// Queue recorded graphics work, submitted by the next flush.
    pub fn push(&mut self, commands: wgpu::CommandBuffer) {
        self.pending.push(commands);
    }

    /// Submit all pending graphics work without waiting for it.
    #[track_caller]
    pub fn submit(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.queue.submit(self.pending.drain(..));
        }

        self.errors.check("submit")
    }

    /// Submit all pending graphics work and wait until the device has finished it.
    #[track_caller]
    pub fn flush(&mut self) -> Result<()> {
        self.submit()?;

        if !Fence::on_queue(&self.queue, &self.device) {
            return Err(Error::backend("flush", "graphics queue did not finish"));
        }

        self.errors.check("flush")
    }

    /// Read back the texels of a texture, as tightly packed rows.
    pub fn read_texture(&mut self, name: TextureName) -> Result<Vec<u8>> {
        self.flush()?;

        let texture = self.sample(name)?;
        let spec = self.spec(name).ok_or_else(|| Error::backend("read_texture", "no storage"))?;

        let texel = spec.format.block_copy_size(None).unwrap_or(4);
        let row = spec.width * texel;
        let padded = row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let size = wgpu::Extent3d {
            width: spec.width,
            height: spec.height,
            depth_or_array_layers: 1,
        };

        let buffer = util::scoped(&self.device, "read_texture", || {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tandem readback"),
                size: u64::from(padded) * u64::from(spec.height),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tandem readback"),
                });

            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &buffer,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(spec.height),
                    },
                },
                size,
            );

            self.queue.submit(Some(encoder.finish()));
            buffer
        })?;

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(Error::backend("map_async", err)),
            Err(_) => return Err(Error::backend("map_async", "mapping was cancelled")),
        }

        let mut texels = Vec::with_capacity(row as usize * spec.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for line in mapped.chunks(padded as usize).take(spec.height as usize) {
                texels.extend_from_slice(&line[..row as usize]);
            }
        }

        buffer.unmap();
        Ok(texels)
    }

    #[track_caller]
    pub(crate) fn slot(&self, name: TextureName) -> Result<&TextureSlot> {
        match self.textures.get(name.index()) {
            Some(slot) => Ok(slot),
            None => Err(Error::share(name.get(), "unknown texture name")),
        }
    }

    #[track_caller]
    fn slot_mut(&mut self, name: TextureName) -> Result<&mut TextureSlot> {
        match self.textures.get_mut(name.index()) {
            Some(slot) => Ok(slot),
            None => Err(Error::share(name.get(), "unknown texture name")),
        }
    }
}

impl TextureName {
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl TextureRole {
    fn usage(self) -> wgpu::TextureUsages {
        use wgpu::TextureUsages as U;
        match self {
            TextureRole::Image => U::TEXTURE_BINDING | U::COPY_DST | U::COPY_SRC,
            TextureRole::Target => U::STORAGE_BINDING | U::TEXTURE_BINDING | U::COPY_SRC,
        }
    }
}
