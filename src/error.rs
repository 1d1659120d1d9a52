//! Errores de la aplicación

use std::path::PathBuf;

/// Errores que pueden terminar el arranque o el bucle principal
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Imagen ausente o ilegible (fatal al arrancar)
    #[error("no se pudo cargar la imagen {path}: {source}")]
    AssetLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Fallo de la API de Windows
    #[cfg(windows)]
    #[error("error de Win32: {0}")]
    Platform(#[from] windows::core::Error),

    /// No hay backend de ventanas para este sistema
    #[cfg_attr(windows, allow(dead_code))]
    #[error("plataforma no soportada: se requiere Windows")]
    UnsupportedPlatform,
}

pub type Result<T> = std::result::Result<T, OverlayError>;
