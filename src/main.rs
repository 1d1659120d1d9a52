//! Hachiware - mascota que sigue al cursor con estela de destellos
//!
//! La mascota persigue al cursor con suavizado, se inclina según el
//! movimiento y deja una estela de destellos que se desvanecen.
//! Salida: clic derecho en el icono del system tray -> Salir

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod error;
mod follower;
mod overlay;
mod platform;
mod scheduler;
mod sparkle;
mod types;

use std::time::Instant;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;

use config::load_config;
use follower::load_scaled;
use overlay::Overlay;

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // Cargar configuración guardada (o valores por defecto)
    let settings = load_config();
    log::info!("Variante {:?}, destellos {:?}", settings.preset, settings.z_order);

    // Imágenes compartidas, cargadas una sola vez
    let sprite = load_scaled(&settings.sprite_path, settings.follower.canvas_size)
        .context("no se pudo cargar el sprite")?;
    let sparkle = load_scaled(&settings.sparkle_path, settings.sparkle.size)
        .context("no se pudo cargar el destello")?;

    let mut host = platform::create_host(&settings)?;
    let cursor = host.cursor_position()?;

    let overlay = Overlay::new(
        settings,
        sprite,
        sparkle,
        cursor,
        Instant::now(),
        StdRng::from_entropy(),
    );
    overlay.run(host.as_mut())?;

    Ok(())
}
