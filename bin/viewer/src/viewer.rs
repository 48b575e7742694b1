//! The viewer state: selection, the filter pipeline and the frame counter.
use std::io;
use std::sync::Arc;

use tandem::catalog::Catalog;
use tandem::config::Config;

use crate::compute::Compute;
use crate::surface::Surface;
use crate::winit::{ModalEvent, ModalViewer};
use crate::Failure;

pub struct Viewer {
    config: Config,
    kernel_source: String,
    image: Option<image::RgbaImage>,
    instance: wgpu::Instance,
    running: Option<Running>,
    close_requested: bool,
    num_frames: u32,
    saved: bool,
}

struct Running {
    surface: Surface,
    compute: Compute,
}

impl Viewer {
    pub fn new(config: Config, kernel_source: String, image: image::RgbaImage) -> Self {
        Viewer {
            config,
            kernel_source,
            image: Some(image),
            instance: wgpu::Instance::default(),
            running: None,
            close_requested: false,
            num_frames: 0,
            saved: false,
        }
    }

    fn redraw(&mut self) -> Result<(), Failure> {
        let Some(running) = &mut self.running else {
            return Ok(());
        };

        let ran = running.compute.frame()?;
        if ran && !self.saved {
            if let Some(path) = &self.config.output {
                running.compute.save(path)?;
            }
            self.saved = true;
        }

        let (graphics, texture) = running.compute.drawable();
        running.surface.draw(graphics, texture)?;

        self.num_frames += 1;
        if let Some(limit) = self.config.frames {
            self.close_requested |= self.num_frames >= limit.get();
        }

        Ok(())
    }
}

impl ModalViewer for Viewer {
    fn start(&mut self, window: Arc<winit::window::Window>) -> Result<(), Failure> {
        let size = window.inner_size();
        let surface = self
            .instance
            .create_surface(window)
            .map_err(|err| Failure::other(err))?;

        let catalog = Catalog::enumerate_for_surface(&self.instance, &surface)?;
        catalog
            .write_report(&mut io::stdout().lock())
            .map_err(|err| Failure::other(err))?;

        let (platform, device) = self.config.selection.select(
            &catalog,
            &mut io::stdin().lock(),
            &mut io::stdout().lock(),
        )?;

        if !device.is_presentable() {
            log::warn!("`{}` may not be able to present to the window", device.name());
        }

        let image = self
            .image
            .take()
            .ok_or_else(|| Failure::other("the viewer was started twice"))?;

        let compute = Compute::new(
            &platform,
            &device,
            &image,
            &self.kernel_source,
            self.config.mode,
        )?;

        let surface = Surface::new(
            surface,
            &device,
            compute.graphics(),
            (size.width, size.height),
        )?;

        self.running = Some(Running { surface, compute });
        Ok(())
    }

    fn event(&mut self, ev: ModalEvent) -> Result<(), Failure> {
        match ev {
            ModalEvent::ExitPressed => self.close_requested = true,
            ModalEvent::RedrawRequested => self.redraw()?,
            ModalEvent::Resized { width, height } => {
                if let Some(running) = &mut self.running {
                    running
                        .surface
                        .resize(running.compute.graphics(), width, height);
                }
            }
        }

        Ok(())
    }

    fn exit(&self) -> bool {
        self.close_requested
    }

    fn stop(&mut self) -> Result<(), Failure> {
        match self.running.take() {
            Some(Running { surface, compute }) => {
                drop(surface);
                compute.teardown()
            }
            None => Ok(()),
        }
    }
}
