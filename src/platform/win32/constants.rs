//! Constantes Windows y IDs de mensajes

use windows::core::{w, PCWSTR};
use windows::Win32::UI::WindowsAndMessaging::WM_USER;

/// Clase de ventana compartida por el seguidor y la capa de destellos
pub const OVERLAY_CLASS: PCWSTR = w!("HachiwareOverlay");

/// Mensaje del system tray icon
pub const WM_TRAYICON: u32 = WM_USER + 100;

/// ID del icono en el system tray
pub const TRAY_ICON_ID: u32 = 1;

/// IDs de elementos del menú contextual
pub const IDM_EXIT: u32 = 1001;
