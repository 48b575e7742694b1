/// The winit related state of the viewer.
///
/// Input events are rewritten into viewer semantics here. Anything that fails inside the event
/// loop is kept until the loop has ended, then handed back to `main`.
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::Failure;

#[derive(Debug)]
pub enum ModalEvent {
    ExitPressed,
    RedrawRequested,
    Resized { width: u32, height: u32 },
}

pub trait ModalViewer {
    /// Set up everything that needs the window.
    fn start(&mut self, window: Arc<Window>) -> Result<(), Failure>;
    /// Handle one input event.
    fn event(&mut self, _: ModalEvent) -> Result<(), Failure>;
    /// Issued to query if an exit is required.
    fn exit(&self) -> bool;
    /// Tear down, at most once.
    fn stop(&mut self) -> Result<(), Failure>;
}

pub struct App<V> {
    viewer: V,
    window: Option<Arc<Window>>,
    failure: Option<Failure>,
}

impl<V: ModalViewer> App<V> {
    pub fn new(viewer: V) -> Self {
        App {
            viewer,
            window: None,
            failure: None,
        }
    }

    /// Tear down the viewer after the event loop has returned.
    pub fn finish(mut self) -> Result<(), Failure> {
        let stopped = self.viewer.stop();

        match self.failure.take() {
            Some(failure) => Err(failure),
            None => stopped,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, failure: Failure) {
        self.failure.get_or_insert(failure);
        event_loop.exit();
    }
}

impl<V: ModalViewer> ApplicationHandler for App<V> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.failure.is_some() {
            return;
        }

        let attributes = Window::default_attributes().with_title("tandem");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, Failure::other(err)),
        };

        if let Err(failure) = self.viewer.start(Arc::clone(&window)) {
            return self.fail(event_loop, failure);
        }

        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match &self.window {
            Some(window) if window.id() == id => {}
            _ => return,
        }

        if let Some(event) = input(event) {
            log::trace!("{:?}", event);
            if let Err(failure) = self.viewer.event(event) {
                return self.fail(event_loop, failure);
            }
        }

        if self.viewer.exit() {
            log::info!("Viewer requested close, closing window");
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _: &ActiveEventLoop) {
        if let Err(failure) = self.viewer.stop() {
            self.failure.get_or_insert(failure);
        }
    }
}

fn input(event: WindowEvent) -> Option<ModalEvent> {
    Some(match event {
        WindowEvent::CloseRequested => ModalEvent::ExitPressed,
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Escape),
                    state: ElementState::Pressed,
                    ..
                },
            ..
        } => ModalEvent::ExitPressed,
        WindowEvent::RedrawRequested => ModalEvent::RedrawRequested,
        WindowEvent::Resized(size) => ModalEvent::Resized {
            width: size.width,
            height: size.height,
        },
        _ => return None,
    })
}
