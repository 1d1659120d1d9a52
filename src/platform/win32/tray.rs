//! System tray icon y menú contextual

use windows::core::*;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::UI::Shell::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use super::constants::{IDM_EXIT, TRAY_ICON_ID, WM_TRAYICON};

/// Crea un icono personalizado para el system tray
/// Dibuja una cara redonda blanca con dos orejas (la mascota)
unsafe fn create_embedded_icon() -> Result<HICON> {
    const ICON_SIZE: i32 = 16;

    let screen_dc = GetDC(None);
    if screen_dc.is_invalid() {
        return Err(Error::from_win32());
    }

    let icon_dc = CreateCompatibleDC(screen_dc);
    let mask_dc = CreateCompatibleDC(screen_dc);

    if icon_dc.is_invalid() || mask_dc.is_invalid() {
        let _ = ReleaseDC(None, screen_dc);
        return Err(Error::from_win32());
    }

    let icon_bitmap = CreateCompatibleBitmap(screen_dc, ICON_SIZE, ICON_SIZE);
    let mask_bitmap = CreateCompatibleBitmap(screen_dc, ICON_SIZE, ICON_SIZE);

    if icon_bitmap.is_invalid() || mask_bitmap.is_invalid() {
        let _ = DeleteDC(icon_dc);
        let _ = DeleteDC(mask_dc);
        let _ = ReleaseDC(None, screen_dc);
        return Err(Error::from_win32());
    }

    let old_icon_bmp = SelectObject(icon_dc, icon_bitmap);
    let old_mask_bmp = SelectObject(mask_dc, mask_bitmap);

    let rect = RECT {
        left: 0,
        top: 0,
        right: ICON_SIZE,
        bottom: ICON_SIZE,
    };

    // Máscara: blanco = transparente, negro = opaco
    let white_brush = CreateSolidBrush(COLORREF(0x00FFFFFF));
    let _ = FillRect(mask_dc, &rect, white_brush);
    let _ = DeleteObject(white_brush);
    draw_head(mask_dc, COLORREF(0x00000000), ICON_SIZE);

    // Color: cabeza blanca sobre fondo negro, con contorno gris
    let black_brush = CreateSolidBrush(COLORREF(0x00000000));
    let _ = FillRect(icon_dc, &rect, black_brush);
    let _ = DeleteObject(black_brush);
    draw_head(icon_dc, COLORREF(0x00F0F0F0), ICON_SIZE);

    // Ojos
    let eye_brush = CreateSolidBrush(COLORREF(0x00402020));
    let old_brush = SelectObject(icon_dc, eye_brush);
    let _ = Ellipse(icon_dc, 5, 8, 7, 10);
    let _ = Ellipse(icon_dc, 9, 8, 11, 10);
    let _ = SelectObject(icon_dc, old_brush);
    let _ = DeleteObject(eye_brush);

    let icon_info = ICONINFO {
        fIcon: true.into(),
        xHotspot: 0,
        yHotspot: 0,
        hbmMask: mask_bitmap,
        hbmColor: icon_bitmap,
    };

    let icon = CreateIconIndirect(&icon_info);

    // Limpiar recursos
    let _ = SelectObject(icon_dc, old_icon_bmp);
    let _ = SelectObject(mask_dc, old_mask_bmp);
    let _ = DeleteObject(icon_bitmap);
    let _ = DeleteObject(mask_bitmap);
    let _ = DeleteDC(icon_dc);
    let _ = DeleteDC(mask_dc);
    let _ = ReleaseDC(None, screen_dc);

    icon
}

/// Cabeza redonda con dos orejas triangulares
unsafe fn draw_head(hdc: HDC, color: COLORREF, size: i32) {
    let brush = CreateSolidBrush(color);
    let pen = CreatePen(PS_SOLID, 1, color);
    let old_brush = SelectObject(hdc, brush);
    let old_pen = SelectObject(hdc, pen);

    let _ = Ellipse(hdc, 1, 4, size - 1, size - 1);
    let left_ear = [
        POINT { x: 2, y: 1 },
        POINT { x: 7, y: 5 },
        POINT { x: 2, y: 8 },
    ];
    let right_ear = [
        POINT { x: size - 3, y: 1 },
        POINT { x: size - 8, y: 5 },
        POINT { x: size - 3, y: 8 },
    ];
    let _ = Polygon(hdc, &left_ear);
    let _ = Polygon(hdc, &right_ear);

    let _ = SelectObject(hdc, old_brush);
    let _ = SelectObject(hdc, old_pen);
    let _ = DeleteObject(brush);
    let _ = DeleteObject(pen);
}

/// Añade el icono al system tray
pub unsafe fn add_tray_icon(hwnd: HWND) -> Result<()> {
    let mut nid = NOTIFYICONDATAW {
        cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: TRAY_ICON_ID,
        uFlags: NIF_ICON | NIF_MESSAGE | NIF_TIP,
        uCallbackMessage: WM_TRAYICON,
        hIcon: create_embedded_icon()?,
        ..Default::default()
    };

    let tooltip = w!("Hachiware - clic derecho para salir");
    let tooltip_bytes = tooltip.as_wide();
    let copy_len = tooltip_bytes.len().min(nid.szTip.len() - 1);
    nid.szTip[..copy_len].copy_from_slice(&tooltip_bytes[..copy_len]);

    if Shell_NotifyIconW(NIM_ADD, &nid).as_bool() {
        Ok(())
    } else {
        Err(Error::from_win32())
    }
}

/// Elimina el icono del system tray
pub unsafe fn remove_tray_icon(hwnd: HWND) {
    let nid = NOTIFYICONDATAW {
        cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: TRAY_ICON_ID,
        ..Default::default()
    };

    let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
}

/// Muestra el menú contextual del system tray
unsafe fn show_tray_menu(hwnd: HWND) {
    let Ok(hmenu) = CreatePopupMenu() else {
        log::warn!("No se pudo crear el menú del tray");
        return;
    };

    let _ = AppendMenuW(hmenu, MF_STRING, IDM_EXIT as usize, w!("Salir"));

    let mut pt = POINT::default();
    let _ = GetCursorPos(&mut pt);

    // Hacer que la ventana sea foreground para que el menú se cierre correctamente
    let _ = SetForegroundWindow(hwnd);

    let _ = TrackPopupMenu(hmenu, TPM_RIGHTBUTTON, pt.x, pt.y, 0, hwnd, None);

    let _ = DestroyMenu(hmenu);
}

/// Maneja los mensajes del system tray
pub unsafe fn handle_tray_message(hwnd: HWND, lparam: LPARAM) {
    if lparam.0 as u32 == WM_RBUTTONUP {
        show_tray_menu(hwnd);
    }
}
