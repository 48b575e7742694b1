//! Settings of a viewer session and the inputs they point at.
use std::borrow::Cow;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::filter::KERNEL_SOURCE;
use crate::run::ExecutionMode;
use crate::select::Selection;

/// Resolved settings of a viewer session.
#[derive(Clone, Debug)]
pub struct Config {
    /// The image to filter.
    pub image: PathBuf,
    /// Kernel source to use instead of the embedded one.
    pub kernel: Option<PathBuf>,
    pub selection: Selection,
    pub mode: ExecutionMode,
    /// Where to store the filtered image after the first run.
    pub output: Option<PathBuf>,
    /// Close the window after this many frames.
    pub frames: Option<NonZeroU32>,
}

impl Config {
    /// The settings for an image, with every other option at its default.
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Config {
            image: image.into(),
            kernel: None,
            selection: Selection::default(),
            mode: ExecutionMode::default(),
            output: None,
            frames: None,
        }
    }

    /// The kernel source, read from the configured file or the embedded default.
    pub fn kernel_source(&self) -> Result<Cow<'static, str>> {
        match &self.kernel {
            None => Ok(Cow::Borrowed(KERNEL_SOURCE)),
            Some(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|err| Error::input(path, err)),
        }
    }

    /// Decode the configured image.
    pub fn load_image(&self) -> Result<image::RgbaImage> {
        load_image(&self.image)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new("img.bmp")
    }
}

/// Decode an image file to 8-bit RGBA.
pub fn load_image(path: &Path) -> Result<image::RgbaImage> {
    let image = image::open(path).map_err(|err| Error::input(path, err))?;
    let image = image.to_rgba8();
    log::info!(
        "Loaded `{}` ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn embedded_kernel_by_default() {
        let config = Config::default();
        assert_eq!(config.image, Path::new("img.bmp"));
        assert!(matches!(config.kernel_source(), Ok(Cow::Borrowed(KERNEL_SOURCE))));
    }

    #[test]
    fn missing_inputs_name_their_path() {
        let config = Config {
            kernel: Some(PathBuf::from("does/not/exist.wgsl")),
            ..Config::new("does/not/exist.bmp")
        };

        for err in [
            config.kernel_source().map(drop).unwrap_err(),
            config.load_image().map(drop).unwrap_err(),
        ] {
            match err.kind() {
                ErrorKind::InputUnreadable { path, .. } => assert!(path.contains("exist")),
                other => panic!("Unexpected error {:?}", other),
            }
        }
    }
}
