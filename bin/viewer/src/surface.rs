use std::borrow::Cow;

use tandem::catalog;
use tandem::graphics::{GraphicsContext, TextureName};

use crate::Failure;

pub struct Surface {
    /// The surface drawing into the window.
    inner: wgpu::Surface<'static>,
    /// Mirrored configuration of the surface.
    config: wgpu::SurfaceConfiguration,
    blit: Blit,
}

/// Draws a texture over the whole viewport.
struct Blit {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl Surface {
    pub fn new(
        inner: wgpu::Surface<'static>,
        device: &catalog::Device,
        graphics: &GraphicsContext,
        (width, height): (u32, u32),
    ) -> Result<Self, Failure> {
        let config = inner
            .get_default_config(device.adapter(), width.max(1), height.max(1))
            .ok_or_else(|| {
                Failure::other(format!("`{}` can not present to the window", device.name()))
            })?;

        inner.configure(graphics.device(), &config);
        let blit = Blit::new(graphics.device(), config.format);
        graphics.check_errors()?;

        Ok(Surface {
            inner,
            config,
            blit,
        })
    }

    pub fn resize(&mut self, graphics: &GraphicsContext, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.inner.configure(graphics.device(), &self.config);
    }

    /// Clear the window and draw the texture into it.
    pub fn draw(
        &mut self,
        graphics: &mut GraphicsContext,
        texture: TextureName,
    ) -> Result<(), Failure> {
        let frame = match self.inner.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.inner.configure(graphics.device(), &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring the next frame");
                return Ok(());
            }
            Err(err) => return Err(Failure::other(err)),
        };

        let image = graphics
            .sample(texture)?
            .create_view(&wgpu::TextureViewDescriptor::default());
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let device = graphics.device();
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tandem blit"),
            layout: &self.blit.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&image),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.blit.sampler),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tandem draw"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tandem draw"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.blit.pipeline);
            pass.set_bind_group(0, &group, &[]);
            pass.draw(0..3, 0..1);
        }

        graphics.push(encoder.finish());
        graphics.submit()?;
        frame.present();
        Ok(())
    }
}

impl Blit {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tandem blit"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("blit.wgsl"))),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tandem blit"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tandem blit"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tandem blit"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(format.into())],
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tandem blit"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Blit {
            pipeline,
            layout,
            sampler,
        }
    }
}
