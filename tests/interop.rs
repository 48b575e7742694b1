use tandem::graphics::{Api, TextureRole, TextureSpec};
use tandem::interop::{Access, Resources};
use tandem::session::Session;
use tandem::ErrorKind;

#[path = "util.rs"]
mod util;

fn target(width: u32, height: u32) -> TextureSpec {
    TextureSpec {
        width,
        height,
        format: wgpu::TextureFormat::Rgba8Unorm,
        role: TextureRole::Target,
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn session_create_and_destroy_twice() {
    let gpu = util::gpu();

    for _ in 0..2 {
        let session = Session::create(&gpu.platform, &gpu.device, &gpu.graphics)
            .expect("Session on the graphics device");
        assert!(session.is_linked_to(&gpu.graphics));
        assert_eq!(session.device(), &gpu.device);
        session.destroy().expect("Clean teardown");
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn unallocated_texture_is_not_shared() {
    let mut gpu = util::gpu();

    let session = gpu.session();
    let name = gpu.graphics.gen_texture();
    let mut resources = Resources::new();

    let err = resources
        .wrap_texture(&session, &gpu.graphics, name, Access::ReadOnly)
        .expect_err("No storage to share");

    match err.kind() {
        ErrorKind::ResourceShareFailed { texture, .. } => assert_eq!(*texture, name.get()),
        other => panic!("Unexpected error {:?}", other),
    }

    // Wrapping did not allocate anything behind our back.
    assert_eq!(gpu.graphics.spec(name), None);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn wrapped_handles_are_distinct_and_released_once() {
    let mut gpu = util::gpu();

    let session = gpu.session();
    let image = util::uniform(4, 4, 17);
    let source = gpu.graphics.upload_image(&image).expect("Upload");
    let destination = gpu
        .graphics
        .create_texture(target(4, 4), None)
        .expect("Allocate target");

    let mut resources = Resources::new();
    let first = resources
        .wrap_texture(&session, &gpu.graphics, source, Access::ReadOnly)
        .expect("Source can be read");
    let second = resources
        .wrap_texture(&session, &gpu.graphics, destination, Access::WriteOnly)
        .expect("Target can be written");

    assert_ne!(first, second);
    assert_eq!(resources.texture(first), Some(source));
    assert_eq!(resources.texture(second), Some(destination));

    resources.release(first);
    assert!(!resources.is_valid(first));
    assert!(resources.is_valid(second));
    resources.release(first);
    assert!(resources.is_valid(second));

    let params = resources
        .create_parameter_buffer(&session, &[0.0; 9])
        .expect("Parameter buffer");
    assert!(resources.is_valid_buffer(params));
    resources.release_buffer(params);
    resources.release_buffer(params);
    assert!(!resources.is_valid_buffer(params));

    drop(resources);
    session.destroy().expect("Clean teardown");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn sampled_image_can_not_be_written() {
    let mut gpu = util::gpu();

    let session = gpu.session();
    let source = gpu
        .graphics
        .upload_image(&util::uniform(2, 2, 0))
        .expect("Upload");

    let err = Resources::new()
        .wrap_texture(&session, &gpu.graphics, source, Access::WriteOnly)
        .expect_err("Uploaded images are not storage textures");
    assert!(matches!(err.kind(), ErrorKind::ResourceShareFailed { .. }));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn ownership_moves_between_apis() {
    let mut gpu = util::gpu();

    let session = gpu.session();
    let destination = gpu
        .graphics
        .create_texture(target(2, 2), None)
        .expect("Allocate target");

    let mut resources = Resources::new();
    let key = resources
        .wrap_texture(&session, &gpu.graphics, destination, Access::WriteOnly)
        .expect("Target can be written");

    resources.release_to_graphics(&[key]).expect_err("Not acquired yet");

    resources.acquire(&[key]).expect("Graphics owns the texture");
    assert_eq!(gpu.graphics.owner(destination), Some(Api::Compute));

    let err = gpu.graphics.sample(destination).expect_err("Owned by compute");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));
    let err = resources.acquire(&[key]).expect_err("Already acquired");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));

    resources.release_to_graphics(&[key]).expect("Compute owns the texture");
    assert_eq!(gpu.graphics.owner(destination), Some(Api::Graphics));
    assert!(gpu.graphics.sample(destination).is_ok());

    // Releasing the handle while acquired hands the texture back as well.
    resources.acquire(&[key]).expect("Graphics owns the texture");
    resources.release(key);
    assert_eq!(gpu.graphics.owner(destination), Some(Api::Graphics));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn zero_sized_storage_fails() {
    let mut gpu = util::gpu();

    let err = gpu
        .graphics
        .create_texture(target(0, 4), None)
        .expect_err("Nothing to allocate");
    assert!(matches!(err.kind(), ErrorKind::ResourceAllocationFailed { .. }));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn session_needs_the_very_adapter_of_graphics() {
    let gpu = util::gpu();

    // The same board, enumerated a second time, is a different adapter.
    let catalog = util::catalog();
    let twin = catalog
        .list_devices(&gpu.platform)
        .into_iter()
        .find(|device| device.info() == gpu.device.info())
        .expect("Device is enumerated again");
    assert_ne!(twin, gpu.device);

    let err = Session::create(&gpu.platform, &twin, &gpu.graphics)
        .err()
        .expect("Graphics runs on another adapter");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn parameter_buffer_is_immutable() {
    let gpu = util::gpu();
    let session = gpu.session();

    let mut resources = Resources::new();
    let params = resources
        .create_parameter_buffer(&session, &[1.0 / 9.0; 9])
        .expect("Parameter buffer");

    let buffer = resources.parameter_buffer(params).expect("Buffer is valid");
    assert_eq!(buffer.usage(), wgpu::BufferUsages::STORAGE);
    assert_eq!(buffer.size(), 9 * 4);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn device_errors_outside_calls_are_reported() {
    let mut gpu = util::gpu();
    gpu.graphics.check_errors().expect("Fresh device");

    // Mapping for both reading and writing needs a feature we never request.
    let _buffer = gpu.graphics.device().create_buffer(&wgpu::BufferDescriptor {
        label: None,
        size: 16,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::MAP_WRITE,
        mapped_at_creation: false,
    });

    let err = gpu.graphics.submit().expect_err("Invalid buffer was reported");
    assert!(matches!(err.kind(), ErrorKind::BackendCallFailed { .. }));
    assert!(err.location().file().ends_with("interop.rs"));

    // Reported once, the device carries on.
    gpu.graphics.check_errors().expect("Error was taken");
    gpu.graphics.flush().expect("Device still works");
}
