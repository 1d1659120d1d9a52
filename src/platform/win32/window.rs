//! Ventanas layered con alfa por píxel

use std::ffi::c_void;

use image::RgbaImage;
use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use super::constants::*;
use super::tray::{handle_tray_message, remove_tray_icon};
use crate::types::ScreenPoint;

/// Registra la clase de ventana del overlay
pub unsafe fn register_window_class(instance: HINSTANCE) -> Result<()> {
    let wc = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        lpfnWndProc: Some(window_proc),
        hInstance: instance,
        hCursor: LoadCursorW(None, IDC_ARROW)?,
        lpszClassName: OVERLAY_CLASS,
        ..Default::default()
    };

    if RegisterClassExW(&wc) == 0 {
        return Err(Error::from_win32());
    }

    Ok(())
}

/// Procedimiento de ventana (maneja mensajes de Windows)
pub unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_TRAYICON => {
            handle_tray_message(hwnd, lparam);
            LRESULT(0)
        }
        WM_COMMAND => {
            if (wparam.0 & 0xFFFF) as u32 == IDM_EXIT {
                remove_tray_icon(hwnd);
                PostQuitMessage(0);
            }
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Ventana transparente, sin marco, siempre encima y que deja pasar los clics
pub struct LayeredWindow {
    hwnd: HWND,
    visible: bool,
}

impl LayeredWindow {
    /// Crea la ventana (inicialmente oculta)
    pub unsafe fn create(instance: HINSTANCE, title: PCWSTR) -> Result<Self> {
        let hwnd = CreateWindowExW(
            WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_TRANSPARENT | WS_EX_NOACTIVATE,
            OVERLAY_CLASS,
            title,
            WS_POPUP,
            0,
            0,
            1,
            1,
            None,
            None,
            instance,
            None,
        )?;

        Ok(Self {
            hwnd,
            visible: false,
        })
    }

    #[inline]
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Sustituye el contenido de la ventana y la mueve a `origin`
    pub unsafe fn present(&mut self, image: &RgbaImage, origin: ScreenPoint) -> Result<()> {
        let screen_dc = GetDC(None);
        if screen_dc.is_invalid() {
            return Err(Error::from_win32());
        }

        let mem_dc = CreateCompatibleDC(screen_dc);
        if mem_dc.is_invalid() {
            let _ = ReleaseDC(None, screen_dc);
            return Err(Error::from_win32());
        }

        let result = self.update_layered(screen_dc, mem_dc, image, origin);

        let _ = DeleteDC(mem_dc);
        let _ = ReleaseDC(None, screen_dc);
        result?;

        if !self.visible {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
            self.visible = true;
        }
        Ok(())
    }

    unsafe fn update_layered(
        &self,
        screen_dc: HDC,
        mem_dc: HDC,
        image: &RgbaImage,
        origin: ScreenPoint,
    ) -> Result<()> {
        let (width, height) = image.dimensions();

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32), // filas de arriba a abajo
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut bits: *mut c_void = std::ptr::null_mut();
        let bitmap = CreateDIBSection(screen_dc, &bmi, DIB_RGB_COLORS, &mut bits, None, 0)?;
        if bits.is_null() {
            let _ = DeleteObject(bitmap);
            return Err(Error::from_win32());
        }

        // SAFETY: el DIB de 32 bits ocupa exactamente ancho * alto * 4 bytes
        let pixels =
            std::slice::from_raw_parts_mut(bits as *mut u8, (width * height * 4) as usize);
        write_premultiplied_bgra(image, pixels);

        let old_bitmap = SelectObject(mem_dc, bitmap);

        let dst = POINT {
            x: origin.x,
            y: origin.y,
        };
        let size = SIZE {
            cx: width as i32,
            cy: height as i32,
        };
        let src = POINT::default();
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: 255,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };

        let result = UpdateLayeredWindow(
            self.hwnd,
            screen_dc,
            Some(&dst as *const POINT),
            Some(&size as *const SIZE),
            mem_dc,
            Some(&src as *const POINT),
            COLORREF(0),
            Some(&blend as *const BLENDFUNCTION),
            ULW_ALPHA,
        );

        let _ = SelectObject(mem_dc, old_bitmap);
        let _ = DeleteObject(bitmap);
        result
    }

    /// Oculta la ventana
    pub unsafe fn hide(&mut self) {
        if self.visible {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
            self.visible = false;
        }
    }
}

impl Drop for LayeredWindow {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
        }
    }
}

/// Coloca `window` justo debajo de `above` sin moverla ni activarla
pub unsafe fn stack_below(window: HWND, above: HWND) -> Result<()> {
    SetWindowPos(
        window,
        above,
        0,
        0,
        0,
        0,
        SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
    )
}

/// Sube `window` a lo más alto de la banda topmost sin activarla
pub unsafe fn raise_topmost(window: HWND) -> Result<()> {
    SetWindowPos(
        window,
        HWND_TOPMOST,
        0,
        0,
        0,
        0,
        SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
    )
}

/// Convierte RGBA sin premultiplicar al BGRA premultiplicado que espera
/// `UpdateLayeredWindow`
pub fn write_premultiplied_bgra(image: &RgbaImage, out: &mut [u8]) {
    for (pixel, dst) in image.pixels().zip(out.chunks_exact_mut(4)) {
        let [r, g, b, a] = pixel.0;
        let premultiply = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        dst[0] = premultiply(b);
        dst[1] = premultiply(g);
        dst[2] = premultiply(r);
        dst[3] = a;
    }
}
