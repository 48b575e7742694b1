//! Enumeration of platforms and their devices.
//!
//! A platform is one backend runtime (Vulkan, Metal, ...) and a device is an adapter exposed by
//! it. The catalog is taken once at startup and never changes afterwards.
use core::fmt;
use core::num::NonZeroU32;
use std::io::{self, Write};
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};

/// All platforms found on this system, with their devices.
pub struct Catalog {
    platforms: Vec<Entry>,
}

struct Entry {
    platform: Platform,
    devices: Vec<Device>,
}

/// A vendor compute runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    backend: wgpu::Backend,
    name: String,
}

/// A compute-capable device under a platform.
#[derive(Clone)]
pub struct Device {
    adapter: Arc<wgpu::Adapter>,
    info: wgpu::AdapterInfo,
    presentable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Cpu,
    Gpu,
    Accelerator,
    Unknown,
}

/// What we report about a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
    pub name: String,
    pub class: DeviceClass,
    /// Parallel invocations one workgroup may hold.
    ///
    /// The backend has no notion of compute units, this is the closest figure it reports.
    pub compute_units: NonZeroU32,
}

impl Catalog {
    /// Enumerate every adapter of the instance.
    pub fn enumerate(instance: &wgpu::Instance) -> Result<Self> {
        Self::from_adapters(instance.enumerate_adapters(wgpu::Backends::all()), None)
    }

    /// Enumerate every adapter and note which of them can present to `surface`.
    pub fn enumerate_for_surface(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self> {
        Self::from_adapters(
            instance.enumerate_adapters(wgpu::Backends::all()),
            Some(surface),
        )
    }

    #[track_caller]
    fn from_adapters(
        adapters: Vec<wgpu::Adapter>,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let mut platforms: Vec<Entry> = vec![];

        for adapter in adapters {
            let info = adapter.get_info();
            let presentable = surface.map_or(true, |surface| adapter.is_surface_supported(surface));

            let device = Device {
                adapter: Arc::new(adapter),
                info,
                presentable,
            };

            match platforms
                .iter_mut()
                .find(|entry| entry.platform.backend == device.info.backend)
            {
                Some(entry) => entry.devices.push(device),
                None => platforms.push(Entry {
                    platform: Platform::new(device.info.backend),
                    devices: vec![device],
                }),
            }
        }

        if platforms.is_empty() {
            return Err(Error::new(ErrorKind::BackendUnavailable));
        }

        log::info!("Compute platforms detected: {}", platforms.len());
        Ok(Catalog { platforms })
    }

    pub fn list_platforms(&self) -> Vec<Platform> {
        self.platforms
            .iter()
            .map(|entry| entry.platform.clone())
            .collect()
    }

    /// The devices of a platform, empty if the platform is not part of this catalog.
    pub fn list_devices(&self, platform: &Platform) -> Vec<Device> {
        self.platforms
            .iter()
            .find(|entry| entry.platform == *platform)
            .map(|entry| entry.devices.clone())
            .unwrap_or_default()
    }

    pub fn describe(device: &Device) -> Description {
        device.describe()
    }

    /// Print the enumeration with 1-based indices, the same ones the selector accepts.
    pub fn write_report(&self, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "\nCompute platforms detected: {}", self.platforms.len())?;

        for (idx, entry) in self.platforms.iter().enumerate() {
            write!(out, "\n{}. Platform: {}", idx + 1, entry.platform.name())?;
            write!(out, "\n\tNumber of devices: {}", entry.devices.len())?;

            for (jdx, device) in entry.devices.iter().enumerate() {
                let description = device.describe();
                write!(out, "\n\t{}. Device: {}", jdx + 1, description.name)?;
                write!(out, "\n\t\tType: {}", description.class)?;
                write!(out, "\n\t\tNumber of CUs: {}", description.compute_units)?;

                if !device.presentable {
                    write!(out, "\n\t\t(can not present to the window)")?;
                }
            }
        }

        writeln!(out)
    }
}

impl Platform {
    fn new(backend: wgpu::Backend) -> Self {
        let name = match backend {
            wgpu::Backend::Vulkan => "Vulkan".to_owned(),
            wgpu::Backend::Metal => "Metal".to_owned(),
            wgpu::Backend::Dx12 => "Direct3D 12".to_owned(),
            wgpu::Backend::Gl => "OpenGL".to_owned(),
            wgpu::Backend::BrowserWebGpu => "WebGPU".to_owned(),
            other => format!("{:?}", other),
        };

        Platform { backend, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.backend
    }
}

impl Device {
    pub fn describe(&self) -> Description {
        let invocations = self.adapter.limits().max_compute_invocations_per_workgroup;

        Description {
            name: self.info.name.clone(),
            class: DeviceClass::from(self.info.device_type),
            compute_units: NonZeroU32::new(invocations).unwrap_or(NonZeroU32::MIN),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Whether the device belongs to the platform.
    pub fn is_on(&self, platform: &Platform) -> bool {
        self.info.backend == platform.backend
    }

    /// Whether the device can present to the surface it was enumerated against.
    ///
    /// Always `true` for a catalog taken without a surface.
    pub fn is_presentable(&self) -> bool {
        self.presentable
    }

    pub fn supports_compute(&self) -> bool {
        self.adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.adapter, &other.adapter)
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.info.name)
            .field("backend", &self.info.backend)
            .field("device_type", &self.info.device_type)
            .finish()
    }
}

impl From<wgpu::DeviceType> for DeviceClass {
    fn from(ty: wgpu::DeviceType) -> Self {
        match ty {
            wgpu::DeviceType::Cpu => DeviceClass::Cpu,
            wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu => DeviceClass::Gpu,
            wgpu::DeviceType::Other => DeviceClass::Unknown,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceClass::Cpu => "CPU",
            DeviceClass::Gpu => "GPU",
            DeviceClass::Accelerator => "ACCELERATOR",
            DeviceClass::Unknown => "Unknown",
        })
    }
}
