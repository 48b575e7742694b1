mod compute;
mod surface;
mod viewer;
mod winit;

use core::fmt;
use core::panic::Location;
use std::io::Write as _;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tandem::catalog::Catalog;
use tandem::config::Config;
use tandem::program::Program;
use tandem::run::ExecutionMode;
use tandem::select::Selection;

/// Filter an image with a compute kernel and show the result in a window.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// The image to filter.
    #[arg(default_value = "img.bmp")]
    image: PathBuf,
    /// Kernel source to build instead of the embedded filter.
    #[arg(long)]
    kernel: Option<PathBuf>,
    /// 1-based index of the platform, instead of prompting for it.
    #[arg(long, requires = "device")]
    platform: Option<usize>,
    /// 1-based index of the device on that platform.
    #[arg(long, requires = "platform")]
    device: Option<usize>,
    /// Print the platforms and devices, then exit.
    #[arg(long)]
    list: bool,
    /// Run the filter before every frame instead of once.
    #[arg(long)]
    every_frame: bool,
    /// Store the filtered image as PNG after the first run.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Close the window after this many frames.
    #[arg(long)]
    frames: Option<NonZeroU32>,
}

/// Any reason for the viewer to terminate early.
pub enum Failure {
    Tandem(tandem::Error),
    Other {
        message: String,
        location: &'static Location<'static>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = if args.list {
        list()
    } else {
        view(args.into_config())
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            failure.report();
            ExitCode::FAILURE
        }
    }
}

fn list() -> Result<(), Failure> {
    let instance = wgpu::Instance::default();
    let catalog = Catalog::enumerate(&instance)?;
    let stdout = std::io::stdout();
    catalog
        .write_report(&mut stdout.lock())
        .map_err(|err| Failure::other(err))
}

fn view(config: Config) -> Result<(), Failure> {
    // A broken kernel is reported before any window opens.
    let source = config.kernel_source()?;
    Program::check(&source)?;
    let image = config.load_image()?;

    let event_loop =
        ::winit::event_loop::EventLoop::new().map_err(|err| Failure::other(err))?;
    let viewer = viewer::Viewer::new(config, source.into_owned(), image);
    let mut app = winit::App::new(viewer);

    event_loop.run_app(&mut app).map_err(|err| Failure::other(err))?;
    app.finish()
}

impl Args {
    fn into_config(self) -> Config {
        let selection = match (self.platform, self.device) {
            (Some(platform), Some(device)) => Selection::Fixed { platform, device },
            _ => Selection::Interactive,
        };

        Config {
            kernel: self.kernel,
            selection,
            mode: if self.every_frame {
                ExecutionMode::EveryFrame
            } else {
                ExecutionMode::Once
            },
            output: self.output,
            frames: self.frames,
            ..Config::new(self.image)
        }
    }
}

impl Failure {
    #[track_caller]
    pub fn other(err: impl fmt::Display) -> Self {
        Failure::Other {
            message: err.to_string(),
            location: Location::caller(),
        }
    }

    fn report(&self) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        let _ = match self {
            Failure::Tandem(err) => match err.build_log() {
                Some(log) => writeln!(out, "{}\nBuild log:\n{}", err, log),
                None => writeln!(out, "{}", err),
            },
            Failure::Other { message, location } => writeln!(
                out,
                "{} at line {} in file {}",
                message,
                location.line(),
                location.file()
            ),
        };
    }
}

impl From<tandem::Error> for Failure {
    fn from(err: tandem::Error) -> Self {
        Failure::Tandem(err)
    }
}
