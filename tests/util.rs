// This is almost certainly not all used in all tests.
#![allow(dead_code)]
//! Tests touching a device are `#[ignore]`d, run them with `cargo test -- --ignored` on a machine
//! with an adapter. They fail instead of passing silently when there is none.
use tandem::catalog::{Catalog, Device, Platform};
use tandem::graphics::GraphicsContext;
use tandem::session::Session;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The catalog of this machine.
pub fn catalog() -> Catalog {
    init();
    Catalog::enumerate(&wgpu::Instance::default()).expect("Did not find any adapter")
}

/// A device able to run kernels, preferring native backends over OpenGL.
pub fn compute_device(catalog: &Catalog) -> (Platform, Device) {
    let mut candidates: Vec<_> = catalog
        .list_platforms()
        .into_iter()
        .flat_map(|platform| {
            catalog
                .list_devices(&platform)
                .into_iter()
                .map(move |device| (platform.clone(), device))
        })
        .filter(|(_, device)| device.supports_compute())
        .collect();

    candidates.sort_by_key(|(platform, _)| platform.backend() == wgpu::Backend::Gl);
    candidates
        .into_iter()
        .next()
        .expect("Did not find any adapter supporting compute")
}

pub struct Gpu {
    pub platform: Platform,
    pub device: Device,
    pub graphics: GraphicsContext,
}

/// A graphics context on a compute device.
pub fn gpu() -> Gpu {
    let catalog = catalog();
    let (platform, device) = compute_device(&catalog);
    let graphics = GraphicsContext::new(&device).expect("Graphics context on the adapter");

    Gpu {
        platform,
        device,
        graphics,
    }
}

impl Gpu {
    pub fn session(&self) -> Session {
        Session::create(&self.platform, &self.device, &self.graphics)
            .expect("Session on the graphics device")
    }
}

/// An opaque image of one grey value.
pub fn uniform(width: u32, height: u32, value: u8) -> image::RgbaImage {
    image::RgbaImage::from_pixel(width, height, image::Rgba([value, value, value, u8::MAX]))
}
