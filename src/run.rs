//! Running the filter kernel on shared textures.
//!
//! One run is a fixed sequence. Graphics work is finished first, then the textures are acquired
//! for compute and the kernel is bound and dispatched. Only once the dispatch has completed are
//! the textures released to graphics, and the queue is drained once more after the release.
//! Afterwards graphics may sample the destination.
mod timing;

use crate::error::{Error, Result};
use crate::graphics::GraphicsContext;
use crate::interop::{BufferKey, MemKey, Resources};
use crate::program::Kernel;
use crate::session::Session;
use crate::util;

use self::timing::StepTimer;

/// When the filter is executed relative to the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Run a single time, before the first frame is drawn.
    #[default]
    Once,
    /// Run before every frame.
    EveryFrame,
}

/// The objects of one filter run.
#[derive(Clone, Copy, Debug)]
pub struct Job {
    /// The texture to read, wrapped read-only.
    pub source: MemKey,
    /// The nine weights.
    pub params: BufferKey,
    /// The texture to write, wrapped write-only.
    pub destination: MemKey,
    /// Work items along x, one per destination column.
    pub width: u32,
    /// Work items along y, one per destination row.
    pub height: u32,
}

/// Drives filter runs according to an execution mode.
pub struct Executor {
    mode: ExecutionMode,
    runs: u64,
}

impl Executor {
    pub fn new(mode: ExecutionMode) -> Self {
        Executor { mode, runs: 0 }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The number of completed runs.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Whether the next frame needs a run before it is drawn.
    pub fn is_due(&self) -> bool {
        match self.mode {
            ExecutionMode::Once => self.runs == 0,
            ExecutionMode::EveryFrame => true,
        }
    }

    /// Run the filter if the execution mode calls for it. Returns whether it ran.
    pub fn frame(
        &mut self,
        graphics: &mut GraphicsContext,
        session: &Session,
        kernel: &mut Kernel,
        resources: &Resources,
        job: &Job,
    ) -> Result<bool> {
        if !self.is_due() {
            return Ok(false);
        }

        self.run(graphics, session, kernel, resources, job)?;
        Ok(true)
    }

    /// Run the filter unconditionally.
    pub fn run(
        &mut self,
        graphics: &mut GraphicsContext,
        session: &Session,
        kernel: &mut Kernel,
        resources: &Resources,
        job: &Job,
    ) -> Result<()> {
        let mut timer = StepTimer::from_now();

        graphics.flush()?;
        timer.checkpoint("finish graphics");

        let objects = [job.source, job.destination];
        resources.acquire(&objects)?;

        // Ownership goes back to graphics even if the kernel could not be run.
        let computed = compute(graphics, session, kernel, resources, job, &mut timer);
        let released = resources.release_to_graphics(&objects);
        let drained = session.queue().finish();
        computed?;
        released?;
        drained?;
        timer.checkpoint("release");

        self.runs += 1;
        log::debug!("Filter run {} took {:?}", self.runs, timer.spent());
        Ok(())
    }
}

/// Everything between acquire and release. Returns once the kernel has completed.
fn compute(
    graphics: &GraphicsContext,
    session: &Session,
    kernel: &mut Kernel,
    resources: &Resources,
    job: &Job,
    timer: &mut StepTimer,
) -> Result<()> {
    session.queue().finish()?;
    timer.checkpoint("acquire");

    enqueue(session, kernel, resources, job)?;
    timer.checkpoint("enqueue");

    session.queue().finish()?;
    graphics.check_errors()?;
    timer.checkpoint("finish compute");
    Ok(())
}

fn enqueue(session: &Session, kernel: &mut Kernel, resources: &Resources, job: &Job) -> Result<()> {
    let device = session.queue().device();
    let limit = device.limits().max_compute_workgroups_per_dimension;

    if job.width == 0 || job.height == 0 || job.width > limit || job.height > limit {
        return Err(Error::backend(
            "enqueue_kernel",
            format!(
                "global size {}x{} is outside of [1-{}]",
                job.width, job.height, limit
            ),
        ));
    }

    let args = [
        resources.image_arg(job.source)?,
        resources.buffer_arg(job.params)?,
        resources.image_arg(job.destination)?,
    ];
    kernel.set_args(&args)?;

    let group = kernel
        .bound
        .as_ref()
        .ok_or_else(|| Error::backend("enqueue_kernel", "kernel arguments are not set"))?;

    let commands = util::scoped(device, "enqueue_kernel", || {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tandem filter"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });

            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, group, &[]);
            pass.dispatch_workgroups(job.width, job.height, 1);
        }

        encoder.finish()
    })?;

    session.queue().submit(commands);
    Ok(())
}
