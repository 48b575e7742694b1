use std::sync::{Arc, Condvar, Mutex};

/// Waits for a queue to report that previously submitted work is done.
///
/// The queue reports through a callback that is only invoked while the device is polled, so
/// waiting polls the device first and then blocks until the callback has fired.
pub(crate) struct Fence {
    state: Arc<State>,
}

/// The completing end of a fence, moved into the queue callback.
pub(crate) struct Signal {
    state: Option<Arc<State>>,
}

#[derive(Default)]
struct State {
    waiter: Condvar,
    done: Mutex<u8>,
}

impl Fence {
    pub(crate) fn new() -> (Self, Signal) {
        let state = Arc::<State>::default();
        let signal = Signal {
            state: Some(Arc::clone(&state)),
        };

        (Fence { state }, signal)
    }

    /// Arm the fence on a queue's currently submitted work and wait for it.
    ///
    /// Returns `false` if the callback was dropped without being called.
    pub(crate) fn on_queue(queue: &wgpu::Queue, device: &wgpu::Device) -> bool {
        let (fence, signal) = Fence::new();
        queue.on_submitted_work_done(move || signal.complete(true));
        fence.wait(device)
    }

    pub(crate) fn wait(self, device: &wgpu::Device) -> bool {
        device.poll(wgpu::Maintain::Wait);

        let lock = match self.state.done.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };

        let done = match self.state.waiter.wait_while(lock, |done| *done == 0) {
            Ok(done) => *done,
            Err(poisoned) => *poisoned.into_inner(),
        };

        done == 1
    }
}

impl Signal {
    pub(crate) fn complete(mut self, success: bool) {
        if let Some(state) = self.state.take() {
            state.complete(success);
        }
    }
}

impl Drop for Signal {
    fn drop(&mut self) {
        // The queue dropped the callback without running it, e.g. on device loss.
        if let Some(state) = self.state.take() {
            state.complete(false);
        }
    }
}

impl State {
    fn complete(&self, success: bool) {
        let mut done = match self.done.lock() {
            Ok(done) => done,
            Err(poisoned) => poisoned.into_inner(),
        };

        *done = if success { 1 } else { 2 };
        self.waiter.notify_all();
    }
}
