use tandem::filter::{convolve_reference, FilterWeights, KERNEL_SOURCE};
use tandem::graphics::{Api, TextureName, TextureRole, TextureSpec};
use tandem::interop::{Access, Resources};
use tandem::program::{Kernel, Program, FILTER_ENTRY_POINT};
use tandem::run::{ExecutionMode, Executor, Job};
use tandem::session::Session;
use tandem::ErrorKind;

#[path = "util.rs"]
mod util;

#[test]
fn weights_are_normalized() {
    let weights = FilterWeights::binomial();
    assert!((weights.sum() - 1.0).abs() < 1e-6);
    assert_eq!(weights, FilterWeights::default());

    let box3 = FilterWeights::from_integers([1; 9]).expect("Non-zero weights");
    assert!((box3.sum() - 1.0).abs() < 1e-6);
}

#[test]
fn reference_keeps_uniform_images() {
    let image = util::uniform(4, 4, 128);
    let filtered = convolve_reference(&image, &FilterWeights::binomial());

    for pixel in filtered.pixels() {
        assert_eq!(pixel.0, [128, 128, 128, 255]);
    }
}

#[test]
fn reference_clamps_at_edges() {
    // A single bright column on the left border.
    let image = image::RgbaImage::from_fn(3, 3, |x, _| {
        let value = if x == 0 { 255 } else { 0 };
        image::Rgba([value, value, value, 255])
    });

    let filtered = convolve_reference(&image, &FilterWeights::binomial());

    // Left column sees the bright column twice, weights 1+2+1 from itself and 1+2+1 clamped.
    assert_eq!(filtered.get_pixel(0, 1).0[0], 191);
    // Middle column sees it once.
    assert_eq!(filtered.get_pixel(1, 1).0[0], 64);
    assert_eq!(filtered.get_pixel(2, 1).0[0], 0);
}

#[test]
fn reference_uses_luminance() {
    let red = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
    let filtered = convolve_reference(&red, &FilterWeights::binomial());
    assert_eq!(filtered.get_pixel(0, 0).0, [76, 76, 76, 255]);
}

#[test]
fn executor_modes() {
    let once = Executor::new(ExecutionMode::default());
    assert_eq!(once.mode(), ExecutionMode::Once);
    assert!(once.is_due());
    assert_eq!(once.runs(), 0);

    assert!(Executor::new(ExecutionMode::EveryFrame).is_due());
}

/// Everything needed to run the filter on one image.
struct Filter {
    gpu: util::Gpu,
    session: Session,
    kernel: Kernel,
    resources: Resources,
    job: Job,
    source: TextureName,
    destination: TextureName,
}

impl Filter {
    fn new(image: &image::RgbaImage) -> Self {
        let mut gpu = util::gpu();
        let (width, height) = image.dimensions();

        let source = gpu.graphics.upload_image(image).expect("Upload");
        let destination = gpu
            .graphics
            .create_texture(
                TextureSpec {
                    width,
                    height,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    role: TextureRole::Target,
                },
                None,
            )
            .expect("Allocate target");

        let session = gpu.session();
        let program = Program::build(&session, KERNEL_SOURCE).expect("Embedded kernel builds");
        let kernel = program
            .create_kernel(FILTER_ENTRY_POINT)
            .expect("Embedded kernel has a filter");

        let mut resources = Resources::new();
        let job = Job {
            source: resources
                .wrap_texture(&session, &gpu.graphics, source, Access::ReadOnly)
                .expect("Source can be read"),
            params: resources
                .create_parameter_buffer(&session, FilterWeights::binomial().as_array())
                .expect("Parameter buffer"),
            destination: resources
                .wrap_texture(&session, &gpu.graphics, destination, Access::WriteOnly)
                .expect("Target can be written"),
            width,
            height,
        };

        Filter {
            gpu,
            session,
            kernel,
            resources,
            job,
            source,
            destination,
        }
    }

    fn run(&mut self, executor: &mut Executor, job: &Job) -> tandem::Result<()> {
        executor.run(
            &mut self.gpu.graphics,
            &self.session,
            &mut self.kernel,
            &self.resources,
            job,
        )
    }

    fn assert_owned_by_graphics(&self) {
        let graphics = &self.gpu.graphics;
        assert_eq!(graphics.owner(self.source), Some(Api::Graphics));
        assert_eq!(graphics.owner(self.destination), Some(Api::Graphics));
        assert!(graphics.sample(self.destination).is_ok());
    }

    fn finish(mut self) -> image::RgbaImage {
        let texels = self
            .gpu
            .graphics
            .read_texture(self.destination)
            .expect("Destination is readable after release");

        let Filter {
            session,
            kernel,
            resources,
            job,
            ..
        } = self;

        drop(resources);
        drop(kernel);
        session.destroy().expect("Clean teardown");

        image::RgbaImage::from_raw(job.width, job.height, texels).expect("Tightly packed rows")
    }
}

fn run_filter(image: &image::RgbaImage, runs: usize) -> image::RgbaImage {
    let mut filter = Filter::new(image);
    let job = filter.job;

    let mut executor = Executor::new(ExecutionMode::EveryFrame);
    for _ in 0..runs {
        filter.run(&mut executor, &job).expect("Filter runs");
    }
    assert_eq!(executor.runs(), runs as u64);

    filter.finish()
}

#[test]
#[ignore = "requires a GPU adapter"]
fn uniform_image_filters_to_itself() {
    let filtered = run_filter(&util::uniform(4, 4, 128), 1);

    for pixel in filtered.pixels() {
        assert_eq!(pixel.0, [128, 128, 128, 255]);
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn device_matches_reference() {
    let image = image::RgbaImage::from_fn(13, 7, |x, y| {
        image::Rgba([(x * 19) as u8, (y * 31) as u8, ((x + y) * 11) as u8, 255])
    });

    let filtered = run_filter(&image, 1);

    let expected = convolve_reference(&image, &FilterWeights::binomial());
    for (ours, theirs) in filtered.pixels().zip(expected.pixels()) {
        for (a, b) in ours.0.iter().zip(theirs.0) {
            assert!(a.abs_diff(b) <= 1, "{:?} vs. {:?}", ours, theirs);
        }
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn repeated_runs_on_the_same_handles() {
    let filtered = run_filter(&util::uniform(8, 8, 200), 2);

    for pixel in filtered.pixels() {
        assert!(pixel.0[0].abs_diff(200) <= 1);
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn run_completes_before_graphics_owns_the_result() {
    let mut filter = Filter::new(&util::uniform(16, 16, 64));
    let job = filter.job;

    let mut executor = Executor::new(ExecutionMode::Once);
    assert!(executor
        .frame(
            &mut filter.gpu.graphics,
            &filter.session,
            &mut filter.kernel,
            &filter.resources,
            &job,
        )
        .expect("Filter runs"));

    // Nothing is left in flight once graphics owns the textures again.
    let polled = filter.gpu.graphics.device().poll(wgpu::Maintain::Poll);
    assert!(polled.is_queue_empty());
    filter.assert_owned_by_graphics();

    assert!(!executor.is_due());
    assert_eq!(executor.runs(), 1);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn failed_dispatch_hands_textures_back() {
    let mut filter = Filter::new(&util::uniform(4, 4, 10));
    let mut executor = Executor::new(ExecutionMode::EveryFrame);

    let empty = Job {
        width: 0,
        ..filter.job
    };
    let err = filter.run(&mut executor, &empty).expect_err("Nothing to dispatch");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));
    assert_eq!(executor.runs(), 0);
    filter.assert_owned_by_graphics();

    // The handles are still good for a proper run.
    let job = filter.job;
    filter.run(&mut executor, &job).expect("Filter runs");
    assert_eq!(executor.runs(), 1);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn released_parameters_hand_textures_back() {
    let mut filter = Filter::new(&util::uniform(4, 4, 10));
    let mut executor = Executor::new(ExecutionMode::EveryFrame);
    let job = filter.job;

    filter.resources.release_buffer(job.params);
    let err = filter.run(&mut executor, &job).expect_err("Weights are gone");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));
    assert_eq!(executor.runs(), 0);
    filter.assert_owned_by_graphics();
}

#[test]
#[ignore = "requires a GPU adapter"]
fn acquired_source_is_not_run() {
    let mut filter = Filter::new(&util::uniform(4, 4, 10));
    let mut executor = Executor::new(ExecutionMode::EveryFrame);
    let job = filter.job;

    filter.resources.acquire(&[job.source]).expect("Graphics owns the source");
    let err = filter.run(&mut executor, &job).expect_err("Source is taken");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));
    assert_eq!(executor.runs(), 0);

    // The failed run took nothing and gave nothing back.
    let graphics = &filter.gpu.graphics;
    assert_eq!(graphics.owner(filter.source), Some(Api::Compute));
    assert_eq!(graphics.owner(filter.destination), Some(Api::Graphics));

    filter
        .resources
        .release_to_graphics(&[job.source])
        .expect("Compute owns the source");
    filter.assert_owned_by_graphics();
}
