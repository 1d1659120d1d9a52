//! Backend de ventanas del sistema operativo

#[cfg(windows)]
mod win32;

use crate::config::Settings;
use crate::error::Result;
use crate::overlay::Host;

/// Crea las ventanas del overlay para el sistema actual
#[cfg(windows)]
pub fn create_host(settings: &Settings) -> Result<Box<dyn Host>> {
    Ok(Box::new(win32::Win32Host::new(settings)?))
}

/// Crea las ventanas del overlay para el sistema actual
#[cfg(not(windows))]
pub fn create_host(_settings: &Settings) -> Result<Box<dyn Host>> {
    Err(crate::error::OverlayError::UnsupportedPlatform)
}
