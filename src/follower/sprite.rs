//! Carga, rotación y composición del sprite

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::{OverlayError, Result};

/// Imagen inmutable compartida (se carga una sola vez al arrancar)
pub type SpriteHandle = Rc<RgbaImage>;

/// Muestreo usado al rotar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Bilinear,
}

impl Interpolation {
    pub fn from_antialias(antialias: bool) -> Self {
        if antialias {
            Interpolation::Bilinear
        } else {
            Interpolation::Nearest
        }
    }
}

/// Carga una imagen y la escala para caber en `max_size` × `max_size`
/// manteniendo la proporción
pub fn load_scaled(path: &Path, max_size: u32) -> Result<SpriteHandle> {
    let image = image::open(path).map_err(|source| OverlayError::AssetLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let scaled = image.resize(max_size, max_size, FilterType::CatmullRom).to_rgba8();
    log::info!(
        "Imagen {} cargada ({}x{} -> {}x{})",
        path.display(),
        image.width(),
        image.height(),
        scaled.width(),
        scaled.height()
    );
    Ok(Rc::new(scaled))
}

/// Rota la imagen `degrees` grados en sentido horario alrededor de su centro.
/// El resultado se amplía para contener la imagen girada completa.
pub fn rotate(src: &RgbaImage, degrees: f64, interpolation: Interpolation) -> RgbaImage {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (src.width() as f64, src.height() as f64);

    // Quitar ruido de coma flotante antes de redondear hacia arriba
    let out_w = ((w * cos.abs() + h * sin.abs()) - 1e-9).ceil().max(1.0) as u32;
    let out_h = ((w * sin.abs() + h * cos.abs()) - 1e-9).ceil().max(1.0) as u32;

    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ox, oy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = x as f64 + 0.5 - ox;
        let dy = y as f64 + 0.5 - oy;
        let sx = dx * cos + dy * sin + cx;
        let sy = -dx * sin + dy * cos + cy;
        match interpolation {
            Interpolation::Nearest => sample_nearest(src, sx, sy),
            Interpolation::Bilinear => sample_bilinear(src, sx - 0.5, sy - 0.5),
        }
    })
}

fn pixel_at(src: &RgbaImage, x: i64, y: i64) -> Rgba<u8> {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        Rgba([0, 0, 0, 0])
    } else {
        *src.get_pixel(x as u32, y as u32)
    }
}

fn sample_nearest(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    pixel_at(src, x.floor() as i64, y.floor() as i64)
}

/// Interpolación bilineal con alfa premultiplicado (evita halos oscuros)
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut rgb = [0.0f64; 3];
    let mut alpha = 0.0f64;
    for (px, py, weight) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ] {
        if weight <= 0.0 {
            continue;
        }
        let p = pixel_at(src, px, py);
        let a = p[3] as f64 / 255.0 * weight;
        for c in 0..3 {
            rgb[c] += p[c] as f64 * a;
        }
        alpha += a;
    }

    if alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([
        (rgb[0] / alpha).round().min(255.0) as u8,
        (rgb[1] / alpha).round().min(255.0) as u8,
        (rgb[2] / alpha).round().min(255.0) as u8,
        (alpha * 255.0).round().min(255.0) as u8,
    ])
}

/// Caché de sprites rotados indexada por grado entero
pub struct RotationCache {
    base: SpriteHandle,
    interpolation: Interpolation,
    entries: HashMap<i32, SpriteHandle>,
}

impl RotationCache {
    pub fn new(base: SpriteHandle, interpolation: Interpolation) -> Self {
        Self {
            base,
            interpolation,
            entries: HashMap::new(),
        }
    }

    /// Devuelve el sprite rotado para `angle`, calculándolo la primera vez
    pub fn get(&mut self, angle: i32) -> SpriteHandle {
        let base = &self.base;
        let interpolation = self.interpolation;
        let sprite = self.entries.entry(angle).or_insert_with(|| {
            log::trace!("Rotando sprite a {} grados", angle);
            Rc::new(rotate(base, angle as f64, interpolation))
        });
        Rc::clone(sprite)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Compone el sprite centrado sobre un lienzo transparente de tamaño fijo
pub fn compose_centered(sprite: &RgbaImage, canvas_size: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(canvas_size, canvas_size);
    let x = (canvas_size as i64 - sprite.width() as i64).div_euclid(2);
    let y = (canvas_size as i64 - sprite.height() as i64).div_euclid(2);
    imageops::overlay(&mut canvas, sprite, x, y);
    canvas
}
