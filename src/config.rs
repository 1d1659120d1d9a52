//! Configuración de la aplicación y persistencia

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Valores por defecto de la configuración
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const FOLLOW_INTERVAL_MS: u64 = 10; // ~100 FPS
    pub const SPAWN_INTERVAL_MS: u64 = 80;
    pub const FADE_INTERVAL_MS: u64 = 30;

    pub const FADE_STEP: f32 = 0.05;
    pub const SPARKLE_JITTER: i32 = 50;
    pub const SPARKLE_SIZE: u32 = 40;

    // Balanceo vertical
    pub const BOB_FREQUENCY: f64 = 8.0; // rad/s
    pub const BOB_AMPLITUDE: f64 = 5.0; // píxeles

    pub const SPRITE_PATH: &'static str = "hachiware.png";
    pub const SPARKLE_PATH: &'static str = "stars.png";
}

/// Variantes de ajuste históricas del seguidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Desplazamiento grande recortado al radio, giro por retraso
    #[default]
    Classic,
    /// Desplazamiento corto con balanceo lateral según la velocidad
    Sway,
    /// Lienzo pequeño sin antialiasing
    Crisp,
}

/// De dónde sale el ángulo objetivo del sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSource {
    /// Proporcional al balanceo suavizado
    Sway,
    /// Proporcional a la distancia horizontal cursor - seguidor
    Lag,
}

/// Orden de apilado entre la capa de destellos y el seguidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZOrder {
    #[default]
    ParticlesBelow,
    ParticlesAbove,
}

/// Ajustes del seguidor (posición, giro y lienzo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerSettings {
    pub offset_x: f64,
    pub offset_y: f64,
    /// Factor de suavizado de la posición, en (0, 1]
    pub smoothing: f64,
    /// Distancia máxima permitida entre seguidor y cursor
    pub clamp_radius: f64,
    pub sway_gain: f64,
    pub sway_smoothing: f64,
    pub max_sway: f64,
    pub rotation_source: RotationSource,
    pub angle_gain: f64,
    pub angle_smoothing: f64,
    pub max_angle_deg: f64,
    pub canvas_size: u32,
    pub antialias: bool,
    pub bob_frequency: f64,
    pub bob_amplitude: f64,
    pub interval_ms: u64,
}

impl FollowerSettings {
    /// Constantes de cada variante
    pub fn for_preset(preset: Preset) -> Self {
        let base = Self {
            offset_x: 1000.0,
            offset_y: 700.0,
            smoothing: 0.15,
            clamp_radius: 50.0,
            sway_gain: 0.0,
            sway_smoothing: 1.0,
            max_sway: 0.0,
            rotation_source: RotationSource::Lag,
            angle_gain: 2.0,
            angle_smoothing: 0.2,
            max_angle_deg: 15.0,
            canvas_size: 80,
            antialias: true,
            bob_frequency: ConfigDefaults::BOB_FREQUENCY,
            bob_amplitude: ConfigDefaults::BOB_AMPLITUDE,
            interval_ms: ConfigDefaults::FOLLOW_INTERVAL_MS,
        };

        match preset {
            Preset::Classic => base,
            Preset::Sway => Self {
                offset_x: 40.0,
                offset_y: 30.0,
                smoothing: 0.2,
                clamp_radius: 60.0,
                sway_gain: 1.0,
                sway_smoothing: 0.3,
                max_sway: 20.0,
                rotation_source: RotationSource::Sway,
                angle_gain: 1.0,
                canvas_size: 96,
                ..base
            },
            Preset::Crisp => Self {
                offset_x: 24.0,
                offset_y: 24.0,
                smoothing: 0.25,
                clamp_radius: 40.0,
                canvas_size: 64,
                antialias: false,
                ..base
            },
        }
    }
}

/// Ajustes de la estela de destellos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparkleSettings {
    pub spawn_interval_ms: u64,
    pub fade_interval_ms: u64,
    pub fade_step: f32,
    /// Dispersión aleatoria máxima en cada eje (píxeles)
    pub jitter: i32,
    pub size: u32,
}

impl Default for SparkleSettings {
    fn default() -> Self {
        Self {
            spawn_interval_ms: ConfigDefaults::SPAWN_INTERVAL_MS,
            fade_interval_ms: ConfigDefaults::FADE_INTERVAL_MS,
            fade_step: ConfigDefaults::FADE_STEP,
            jitter: ConfigDefaults::SPARKLE_JITTER,
            size: ConfigDefaults::SPARKLE_SIZE,
        }
    }
}

/// Configuración serializable para persistencia
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub preset: Preset,
    pub follower: FollowerSettings,
    pub sparkle: SparkleSettings,
    pub z_order: ZOrder,
    pub sprite_path: PathBuf,
    pub sparkle_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl Settings {
    /// Crea una configuración con los valores de una variante
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            preset,
            follower: FollowerSettings::for_preset(preset),
            sparkle: SparkleSettings::default(),
            z_order: ZOrder::default(),
            sprite_path: PathBuf::from(ConfigDefaults::SPRITE_PATH),
            sparkle_path: PathBuf::from(ConfigDefaults::SPARKLE_PATH),
        }
    }

    /// Valida que los valores estén en rangos válidos
    pub fn validate(&self) -> std::result::Result<(), String> {
        let f = &self.follower;
        let s = &self.sparkle;

        for (name, value) in [
            ("smoothing", f.smoothing),
            ("sway_smoothing", f.sway_smoothing),
            ("angle_smoothing", f.angle_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(format!("{} debe estar en (0, 1]", name));
            }
        }
        if !(f.clamp_radius > 0.0) {
            return Err("El radio de recorte debe ser positivo".to_string());
        }
        if !(f.max_sway >= 0.0) {
            return Err("El balanceo máximo no puede ser negativo".to_string());
        }
        if !(0.0..=180.0).contains(&f.max_angle_deg) {
            return Err("El ángulo máximo debe estar entre 0-180 grados".to_string());
        }
        if f.canvas_size < 16 || f.canvas_size > 512 {
            return Err("El lienzo debe medir entre 16-512 píxeles".to_string());
        }
        if f.interval_ms == 0 || s.spawn_interval_ms == 0 || s.fade_interval_ms == 0 {
            return Err("Los intervalos deben ser mayores que 0ms".to_string());
        }
        if !(s.fade_step > 0.0 && s.fade_step <= 1.0) {
            return Err("El paso de desvanecido debe estar en (0, 1]".to_string());
        }
        if s.jitter < 0 {
            return Err("La dispersión no puede ser negativa".to_string());
        }
        if s.size == 0 || s.size > 512 {
            return Err("El destello debe medir entre 1-512 píxeles".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// PERSISTENCIA
// =============================================================================

/// Obtiene la ruta del archivo de configuración
/// El archivo se llama igual que el ejecutable pero con extensión .json
/// Ejemplo: hachiware-overlay.exe -> hachiware-overlay.json
pub fn get_config_path() -> std::result::Result<PathBuf, String> {
    let exe_path = std::env::current_exe()
        .map_err(|e| format!("No se pudo obtener la ruta del ejecutable: {}", e))?;

    let exe_dir = exe_path
        .parent()
        .ok_or("No se pudo obtener el directorio del ejecutable")?;

    let config_name = exe_path
        .file_stem()
        .ok_or("No se pudo obtener el nombre del ejecutable")?
        .to_string_lossy()
        .to_string()
        + ".json";

    Ok(exe_dir.join(config_name))
}

/// Guarda la configuración en `path` como JSON legible
pub fn save_config_to(path: &Path, settings: &Settings) -> std::result::Result<(), String> {
    // Validar antes de guardar
    settings.validate()?;

    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Error al serializar config: {}", e))?;

    fs::write(path, json).map_err(|e| format!("Error al guardar config: {}", e))?;
    log::info!("Configuración guardada en {}", path.display());

    Ok(())
}

/// Interpreta y valida el contenido JSON de la configuración
pub fn parse_config(json: &str) -> std::result::Result<Settings, String> {
    let settings = serde_json::from_str::<Settings>(json)
        .map_err(|e| format!("JSON inválido: {}", e))?;
    settings.validate()?;
    Ok(settings)
}

/// Carga la configuración desde el archivo junto al ejecutable
pub fn load_config() -> Settings {
    match get_config_path() {
        Ok(path) => load_config_from(&path),
        Err(e) => {
            log::warn!("{}; usando valores por defecto", e);
            Settings::default()
        }
    }
}

/// Carga la configuración desde `path`
///
/// Si el archivo no existe se crea con los valores por defecto. Si no se
/// puede leer, no es JSON válido o tiene valores fuera de rango, se usan los
/// valores por defecto sin tocar el archivo.
pub fn load_config_from(path: &Path) -> Settings {
    if !path.exists() {
        let settings = Settings::default();
        if let Err(e) = save_config_to(path, &settings) {
            log::warn!("{}", e);
        }
        return settings;
    }

    match fs::read_to_string(path) {
        Ok(json) => match parse_config(&json) {
            Ok(settings) => {
                log::info!("Configuración cargada de {}", path.display());
                return settings;
            }
            Err(e) => log::warn!("{}: {}", path.display(), e),
        },
        Err(e) => log::warn!("No se pudo leer {}: {}", path.display(), e),
    }

    // Si falla la carga por cualquier razón, usar valores por defecto
    Settings::default()
}
