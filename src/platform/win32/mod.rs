//! Backend Win32: ventanas layered y un icono en el system tray

mod constants;
mod tray;
mod window;

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use image::RgbaImage;
use windows::core::w;
use windows::Win32::Foundation::{HINSTANCE, HWND, POINT};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::config::{Settings, ZOrder};
use crate::error::Result;
use crate::overlay::Host;
use crate::sparkle::SparkleId;
use crate::types::ScreenPoint;

use tray::{add_tray_icon, remove_tray_icon};
use window::{raise_topmost, register_window_class, stack_below, LayeredWindow};

/// Ventana del seguidor y una ventana pequeña por destello
pub struct Win32Host {
    instance: HINSTANCE,
    follower: LayeredWindow,
    sparkles: HashMap<SparkleId, LayeredWindow>,
    /// Ventanas de destellos ya eliminados, ocultas y listas para reutilizar
    spare: Vec<LayeredWindow>,
    z_order: ZOrder,
}

impl Win32Host {
    pub fn new(settings: &Settings) -> Result<Self> {
        unsafe {
            let instance: HINSTANCE = GetModuleHandleW(None)?.into();
            register_window_class(instance)?;

            let follower = LayeredWindow::create(instance, w!("Hachiware"))?;

            // Las ventanas dejan pasar los clics: el tray es la única forma de salir
            add_tray_icon(follower.hwnd())?;

            Ok(Self {
                instance,
                follower,
                sparkles: HashMap::new(),
                spare: Vec::new(),
                z_order: settings.z_order,
            })
        }
    }

    /// Coloca un destello por encima o por debajo del seguidor
    fn restack_sparkle(&self, sparkle: HWND) -> Result<()> {
        unsafe {
            match self.z_order {
                ZOrder::ParticlesBelow => stack_below(sparkle, self.follower.hwnd())?,
                ZOrder::ParticlesAbove => raise_topmost(sparkle)?,
            }
        }
        Ok(())
    }

    /// Reaplica el orden de apilado a todos los destellos visibles
    fn restack(&self) -> Result<()> {
        for window in self.sparkles.values() {
            self.restack_sparkle(window.hwnd())?;
        }
        Ok(())
    }
}

impl Host for Win32Host {
    fn cursor_position(&mut self) -> Result<ScreenPoint> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point)? };
        Ok(ScreenPoint::new(point.x, point.y))
    }

    fn present_follower(&mut self, canvas: &RgbaImage, origin: ScreenPoint) -> Result<()> {
        let was_visible = self.follower.is_visible();
        unsafe { self.follower.present(canvas, origin)? };
        if !was_visible {
            self.restack()?;
        }
        Ok(())
    }

    fn present_sparkle(
        &mut self,
        id: SparkleId,
        image: &RgbaImage,
        origin: ScreenPoint,
    ) -> Result<()> {
        let window = match self.sparkles.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let window = match self.spare.pop() {
                    Some(window) => window,
                    None => unsafe {
                        log::debug!("Nueva ventana de destello");
                        LayeredWindow::create(self.instance, w!("Hachiware - destello"))?
                    },
                };
                entry.insert(window)
            }
        };

        let was_visible = window.is_visible();
        unsafe { window.present(image, origin)? };
        let hwnd = window.hwnd();
        if !was_visible {
            self.restack_sparkle(hwnd)?;
        }
        Ok(())
    }

    fn hide_sparkle(&mut self, id: SparkleId) -> Result<()> {
        if let Some(mut window) = self.sparkles.remove(&id) {
            unsafe { window.hide() };
            self.spare.push(window);
        }
        Ok(())
    }

    fn apply_z_order(&mut self, order: ZOrder) -> Result<()> {
        self.z_order = order;
        self.restack()
    }

    fn pump_events(&mut self) -> Result<bool> {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    log::info!("Salida solicitada desde el tray");
                    return Ok(false);
                }
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }
        }
        Ok(true)
    }
}

impl Drop for Win32Host {
    fn drop(&mut self) {
        unsafe { remove_tray_icon(self.follower.hwnd()) };
    }
}
