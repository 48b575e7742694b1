//! ## Quick guide
//!
//! 1. Take the [`Catalog`](catalog::Catalog) of platforms and devices, and select one of each
//! 2. Create a [`GraphicsContext`](graphics::GraphicsContext) on the device and upload textures
//! 3. Create a [`Session`](session::Session) linked to that graphics context
//! 4. Build the kernel [`Program`](program::Program) and create its `Filter` kernel
//! 5. Wrap the textures and the weights in the interop [`Resources`](interop::Resources)
//! 6. Let an [`Executor`](run::Executor) run the kernel, then draw the destination texture
//!
//! Tear down in reverse order: resources, kernel and program, then the session.
//!
//! Every fallible operation returns an [`Error`] naming the source location that raised it.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod graphics;
pub mod interop;
pub mod program;
pub mod run;
pub mod select;
pub mod session;

mod util;

pub use self::error::{Error, ErrorKind, Result};
