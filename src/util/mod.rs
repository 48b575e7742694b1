mod fence;

pub(crate) use self::fence::Fence;

use core::future::Future;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Block on a backend future on the current thread.
///
/// Device futures on native targets resolve without polling the device, except the ones tied to
/// queue progress which go through [`Fence`] instead.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    pollster::block_on(future)
}

/// Run `work` inside validation and out-of-memory error scopes of the device.
///
/// Errors raised by the backend while `work` runs are converted and attributed to `call`.
#[track_caller]
pub(crate) fn scoped<T>(
    device: &wgpu::Device,
    call: &'static str,
    work: impl FnOnce() -> T,
) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

    let result = work();

    let out_of_memory = block_on(device.pop_error_scope());
    let validation = block_on(device.pop_error_scope());

    match out_of_memory.or(validation) {
        Some(err) => Err(Error::from_scope(call, err)),
        None => Ok(result),
    }
}

/// Collects backend errors that were raised outside of any error scope.
///
/// The device would otherwise panic on them. Only the first error is kept until it is taken.
#[derive(Clone, Default)]
pub(crate) struct ErrorSink {
    first: Arc<Mutex<Option<wgpu::Error>>>,
}

impl ErrorSink {
    /// Replace the uncaptured error handler of `device` with a new sink.
    pub(crate) fn install(device: &wgpu::Device) -> Self {
        let sink = ErrorSink::default();
        let first = Arc::clone(&sink.first);

        device.on_uncaptured_error(Box::new(move |err| {
            log::error!("Uncaptured device error: {}", err);
            let mut first = match first.lock() {
                Ok(first) => first,
                Err(poisoned) => poisoned.into_inner(),
            };
            first.get_or_insert(err);
        }));

        sink
    }

    /// Turn a collected error into a failure of `call`.
    #[track_caller]
    pub(crate) fn check(&self, call: &'static str) -> Result<()> {
        let taken = match self.first.lock() {
            Ok(mut first) => first.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match taken {
            Some(err) => Err(Error::from_scope(call, err)),
            None => Ok(()),
        }
    }
}
