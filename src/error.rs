//! The error taxonomy of the interop layer.
//!
//! Every error records the source location that raised it. None of them are meant to be
//! recovered from locally, the binary prints the diagnostic and terminates.
use core::fmt;
use core::panic::Location;

use crate::program::BuildLog;

/// An error raised by the device, session, program, interop or executor layers.
#[derive(Debug, thiserror::Error)]
#[error("{kind} at line {} in file {}", .location.line(), .location.file())]
pub struct Error {
    kind: ErrorKind,
    location: &'static Location<'static>,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No platform was found, the program has nothing to run on.
    #[error("no compute platform available")]
    BackendUnavailable,
    /// A backend call reported failure. The resource state afterwards is not trusted.
    #[error("{call} failed: {description}")]
    BackendCallFailed {
        call: &'static str,
        description: String,
    },
    /// The backend could not provide memory for an object.
    #[error("allocation of {what} failed: {description}")]
    ResourceAllocationFailed {
        what: &'static str,
        description: String,
    },
    /// The kernel source did not build, the log has the details.
    #[error("kernel build failed ({} byte build log)", .log.len())]
    CompileFailed { log: BuildLog },
    #[error("no compute entry point named `{0}`")]
    EntryPointNotFound(String),
    #[error("texture {texture} can not be shared: {reason}")]
    ResourceShareFailed { texture: u32, reason: String },
    #[error("selection `{input}` is not in the range [1-{count}]")]
    UserInputOutOfRange { input: String, count: usize },
    /// An input file could not be read or decoded.
    #[error("can not read `{path}`: {description}")]
    InputUnreadable { path: String, description: String },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    #[track_caller]
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn backend(call: &'static str, description: impl fmt::Display) -> Self {
        Error::new(ErrorKind::BackendCallFailed {
            call,
            description: description.to_string(),
        })
    }

    #[track_caller]
    pub(crate) fn allocation(what: &'static str, description: impl fmt::Display) -> Self {
        Error::new(ErrorKind::ResourceAllocationFailed {
            what,
            description: description.to_string(),
        })
    }

    #[track_caller]
    pub(crate) fn share(texture: u32, reason: impl fmt::Display) -> Self {
        Error::new(ErrorKind::ResourceShareFailed {
            texture,
            reason: reason.to_string(),
        })
    }

    #[track_caller]
    pub(crate) fn input(path: &std::path::Path, description: impl fmt::Display) -> Self {
        Error::new(ErrorKind::InputUnreadable {
            path: path.display().to_string(),
            description: description.to_string(),
        })
    }

    /// Convert an error captured by a device error scope.
    #[track_caller]
    pub(crate) fn from_scope(call: &'static str, err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { .. } => Error::allocation(call, "out of device memory"),
            wgpu::Error::Validation { description, .. } => Error::backend(call, description),
            other => Error::backend(call, other),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The source location that raised this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// The build log, if this is a kernel compilation failure.
    pub fn build_log(&self) -> Option<&BuildLog> {
        match &self.kind {
            ErrorKind::CompileFailed { log } => Some(log),
            _ => None,
        }
    }
}
