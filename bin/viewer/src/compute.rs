//! The filter pipeline behind the window.
use std::path::Path;

use tandem::catalog::{Device, Platform};
use tandem::filter::FilterWeights;
use tandem::graphics::{GraphicsContext, TextureName, TextureRole, TextureSpec};
use tandem::interop::{Access, Resources};
use tandem::program::{Kernel, Program, FILTER_ENTRY_POINT};
use tandem::run::{ExecutionMode, Executor, Job};
use tandem::session::Session;

use crate::Failure;

/// Every object of the filter, from the shared handles down to the graphics context.
///
/// Fields drop in declaration order, the reverse of creation.
pub struct Compute {
    job: Job,
    executor: Executor,
    resources: Resources,
    kernel: Kernel,
    program: Program,
    session: Session,
    destination: TextureName,
    graphics: GraphicsContext,
}

impl Compute {
    pub fn new(
        platform: &Platform,
        device: &Device,
        image: &image::RgbaImage,
        kernel_source: &str,
        mode: ExecutionMode,
    ) -> Result<Self, Failure> {
        let mut graphics = GraphicsContext::new(device)?;
        let (width, height) = image.dimensions();

        let source = graphics.upload_image(image)?;
        let destination = graphics.create_texture(
            TextureSpec {
                width,
                height,
                format: wgpu::TextureFormat::Rgba8Unorm,
                role: TextureRole::Target,
            },
            None,
        )?;

        let session = Session::create(platform, device, &graphics)?;
        let program = Program::build(&session, kernel_source)?;
        let kernel = program.create_kernel(FILTER_ENTRY_POINT)?;

        let mut resources = Resources::new();
        let job = Job {
            source: resources.wrap_texture(&session, &graphics, source, Access::ReadOnly)?,
            params: resources
                .create_parameter_buffer(&session, FilterWeights::binomial().as_array())?,
            destination: resources.wrap_texture(
                &session,
                &graphics,
                destination,
                Access::WriteOnly,
            )?,
            width,
            height,
        };

        Ok(Compute {
            job,
            executor: Executor::new(mode),
            resources,
            kernel,
            program,
            session,
            destination,
            graphics,
        })
    }

    /// Run the filter if this frame needs it. Returns whether it ran.
    pub fn frame(&mut self) -> Result<bool, Failure> {
        let ran = self.executor.frame(
            &mut self.graphics,
            &self.session,
            &mut self.kernel,
            &self.resources,
            &self.job,
        )?;

        Ok(ran)
    }

    pub fn graphics(&self) -> &GraphicsContext {
        &self.graphics
    }

    /// The graphics context together with the texture to draw.
    pub fn drawable(&mut self) -> (&mut GraphicsContext, TextureName) {
        (&mut self.graphics, self.destination)
    }

    /// Store the filtered texture as an image file.
    pub fn save(&mut self, path: &Path) -> Result<(), Failure> {
        let texels = self.graphics.read_texture(self.destination)?;
        let image = image::RgbaImage::from_raw(self.job.width, self.job.height, texels)
            .ok_or_else(|| Failure::other("filtered texture has an unexpected size"))?;

        image.save(path).map_err(|err| Failure::other(err))?;
        log::info!("Stored filtered image at `{}`", path.display());
        Ok(())
    }

    /// Release everything, in reverse order of creation.
    pub fn teardown(self) -> Result<(), Failure> {
        let Compute {
            job,
            executor,
            mut resources,
            kernel,
            program,
            session,
            destination: _,
            graphics,
        } = self;

        log::info!("Tearing down after {} filter runs", executor.runs());
        resources.release(job.source);
        resources.release(job.destination);
        resources.release_buffer(job.params);
        drop(resources);
        drop(kernel);
        drop(program);
        session.destroy()?;
        drop(graphics);
        Ok(())
    }
}
