//! Building kernel source into programs, and retrieving kernels from them.
//!
//! Source text is first run through the host-side compiler front end. That catches syntax and
//! type errors with a complete build log before any device is involved. The validated source is
//! then handed to the device, which may still reject it for its own limits.
use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::session::Session;
use crate::util;

/// The name of the filter kernel's entry point.
pub const FILTER_ENTRY_POINT: &str = "Filter";

/// The diagnostic output of a failed kernel build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildLog {
    text: String,
}

/// A kernel program built for the session's device.
pub struct Program {
    module: wgpu::ShaderModule,
    ir: naga::Module,
    device: Arc<wgpu::Device>,
}

/// One compute entry point of a program, with its argument interface.
pub struct Kernel {
    name: String,
    pub(crate) pipeline: wgpu::ComputePipeline,
    arguments: Vec<Argument>,
    device: Arc<wgpu::Device>,
    /// Arguments set by the last call to `set_args`.
    pub(crate) bound: Option<wgpu::BindGroup>,
}

/// A value passed to a kernel argument slot.
pub enum KernelArg<'a> {
    /// An image the kernel reads from.
    Image(&'a wgpu::TextureView),
    /// An image the kernel writes to.
    StorageImage(&'a wgpu::TextureView),
    Buffer(&'a wgpu::Buffer),
}

/// The kind of value an argument slot accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    Image,
    StorageImage,
    Buffer,
    /// Samplers and anything else we do not bind.
    Unsupported,
}

#[derive(Clone, Copy, Debug)]
struct Argument {
    binding: u32,
    kind: ArgKind,
}

impl Program {
    /// Parse and validate kernel source without a device.
    pub fn check(source: &str) -> Result<naga::Module> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|err| compile_failed(err.emit_to_string(source)))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );

        validator
            .validate(&module)
            .map_err(|err| compile_failed(err.emit_to_string(source)))?;

        Ok(module)
    }

    /// Build kernel source for the session's device.
    pub fn build(session: &Session, source: &str) -> Result<Self> {
        let ir = Self::check(source)?;
        let device = session.context().shared();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tandem kernel"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });

        if let Some(err) = util::block_on(device.pop_error_scope()) {
            let info = util::block_on(module.get_compilation_info());
            let mut text = String::new();

            for message in &info.messages {
                match &message.location {
                    Some(location) => text.push_str(&format!(
                        "{}:{}: {}\n",
                        location.line_number, location.line_position, message.message
                    )),
                    None => text.push_str(&format!("{}\n", message.message)),
                }
            }

            if text.is_empty() {
                text = err.to_string();
            }

            return Err(compile_failed(text));
        }

        log::info!(
            "Built kernel program with {} entry points",
            ir.entry_points.len()
        );

        Ok(Program { module, ir, device })
    }

    /// Names of all compute entry points.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> + '_ {
        self.ir
            .entry_points
            .iter()
            .filter(|ep| ep.stage == naga::ShaderStage::Compute)
            .map(|ep| ep.name.as_str())
    }

    /// Create the kernel for a compute entry point.
    pub fn create_kernel(&self, name: &str) -> Result<Kernel> {
        if !self.entry_points().any(|ep| ep == name) {
            return Err(Error::new(ErrorKind::EntryPointNotFound(name.to_owned())));
        }

        let pipeline = util::scoped(&self.device, "create_kernel", || {
            self.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(name),
                    layout: None,
                    module: &self.module,
                    entry_point: name,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                })
        })?;

        let mut arguments: Vec<Argument> = self
            .ir
            .global_variables
            .iter()
            .filter_map(|(_, var)| {
                let binding = var.binding.as_ref().filter(|binding| binding.group == 0)?;
                Some(Argument {
                    binding: binding.binding,
                    kind: ArgKind::of(&self.ir, var),
                })
            })
            .collect();
        arguments.sort_by_key(|arg| arg.binding);

        Ok(Kernel {
            name: name.to_owned(),
            pipeline,
            arguments,
            device: Arc::clone(&self.device),
            bound: None,
        })
    }
}

impl Kernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kinds of all argument slots, in binding order.
    pub fn arguments(&self) -> impl Iterator<Item = ArgKind> + '_ {
        self.arguments.iter().map(|arg| arg.kind)
    }

    /// Bind all arguments, `args[i]` to slot `i`.
    ///
    /// The argument order is part of the kernel's contract. Every slot must be provided with a
    /// value of the kind the kernel declares.
    pub fn set_args(&mut self, args: &[KernelArg<'_>]) -> Result<()> {
        if args.len() != self.arguments.len() {
            return Err(Error::backend(
                "set_kernel_arg",
                format!(
                    "kernel `{}` takes {} arguments, got {}",
                    self.name,
                    self.arguments.len(),
                    args.len()
                ),
            ));
        }

        let mut entries = Vec::with_capacity(args.len());
        for (idx, (arg, slot)) in args.iter().zip(&self.arguments).enumerate() {
            if arg.kind() != slot.kind {
                return Err(Error::backend(
                    "set_kernel_arg",
                    format!(
                        "argument {} of `{}` expects {:?}, got {:?}",
                        idx,
                        self.name,
                        slot.kind,
                        arg.kind()
                    ),
                ));
            }

            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: arg.resource(),
            });
        }

        let layout = self.pipeline.get_bind_group_layout(0);
        let group = util::scoped(&self.device, "set_kernel_arg", || {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tandem kernel arguments"),
                layout: &layout,
                entries: &entries,
            })
        })?;

        self.bound = Some(group);
        Ok(())
    }
}

impl KernelArg<'_> {
    pub fn kind(&self) -> ArgKind {
        match self {
            KernelArg::Image(_) => ArgKind::Image,
            KernelArg::StorageImage(_) => ArgKind::StorageImage,
            KernelArg::Buffer(_) => ArgKind::Buffer,
        }
    }

    fn resource(&self) -> wgpu::BindingResource<'_> {
        match *self {
            KernelArg::Image(view) | KernelArg::StorageImage(view) => {
                wgpu::BindingResource::TextureView(view)
            }
            KernelArg::Buffer(buffer) => buffer.as_entire_binding(),
        }
    }
}

impl ArgKind {
    fn of(module: &naga::Module, var: &naga::GlobalVariable) -> Self {
        match (&var.space, &module.types[var.ty].inner) {
            (
                _,
                naga::TypeInner::Image {
                    class: naga::ImageClass::Storage { .. },
                    ..
                },
            ) => ArgKind::StorageImage,
            (_, naga::TypeInner::Image { .. }) => ArgKind::Image,
            (naga::AddressSpace::Storage { .. } | naga::AddressSpace::Uniform, _) => {
                ArgKind::Buffer
            }
            _ => ArgKind::Unsupported,
        }
    }
}

impl BuildLog {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for BuildLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[track_caller]
fn compile_failed(text: String) -> Error {
    Error::new(ErrorKind::CompileFailed {
        log: BuildLog { text },
    })
}
