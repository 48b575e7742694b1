//! Picking one platform and one device from the catalog.
//!
//! Selection happens exactly once, before any window or real-time loop exists, so the
//! interactive variant is a plain blocking prompt.
use std::io::{BufRead, Write};

use crate::catalog::{Catalog, Device, Platform};
use crate::error::{Error, ErrorKind, Result};

/// The policy used to pick a platform and a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Selection {
    /// Prompt for a 1-based index per axis.
    #[default]
    Interactive,
    /// Use the given 1-based indices.
    Fixed { platform: usize, device: usize },
}

impl Selection {
    /// Resolve the policy against the catalog.
    ///
    /// The prompt is written to `output` and the answers read from `input`, these are only used
    /// by the interactive policy.
    pub fn select(
        self,
        catalog: &Catalog,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(Platform, Device)> {
        let platforms = catalog.list_platforms();
        let platform = match self {
            Selection::Interactive => prompt(&platforms, "platform", input, output)?,
            Selection::Fixed { platform, .. } => choose(&platforms, platform)?,
        };

        let devices = catalog.list_devices(&platform);
        let device = match self {
            Selection::Interactive => prompt(&devices, "device", input, output)?,
            Selection::Fixed { device, .. } => choose(&devices, device)?,
        };

        log::info!("Selected device `{}` on {}", device.name(), platform.name());
        Ok((platform, device))
    }
}

/// Interactively select from standard input, prompting on standard output.
pub fn select(catalog: &Catalog) -> Result<(Platform, Device)> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    Selection::Interactive.select(catalog, &mut stdin.lock(), &mut stdout.lock())
}

/// Pick the item with the 1-based `index`.
#[track_caller]
pub fn choose<T: Clone>(items: &[T], index: usize) -> Result<T> {
    match index.checked_sub(1).and_then(|idx| items.get(idx)) {
        Some(item) => Ok(item.clone()),
        None => Err(out_of_range(index.to_string(), items.len())),
    }
}

/// Parse one line of user input as a 1-based index into `items`.
#[track_caller]
pub fn parse_choice<T: Clone>(items: &[T], line: &str) -> Result<T> {
    let line = line.trim();
    match line.parse::<usize>() {
        Ok(index) => choose(items, index),
        Err(_) => Err(out_of_range(line.to_owned(), items.len())),
    }
}

fn prompt<T: Clone>(
    items: &[T],
    what: &str,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<T> {
    write!(output, "\nSelect {} to use [{}-{}]: ", what, 1, items.len())
        .and_then(|()| output.flush())
        .map_err(|err| Error::backend("write prompt", err))?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| Error::backend("read selection", err))?;

    parse_choice(items, &line)
}

#[track_caller]
fn out_of_range(input: String, count: usize) -> Error {
    Error::new(ErrorKind::UserInputOutOfRange { input, count })
}
