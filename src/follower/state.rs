//! Estado del seguidor: posición suavizada, balanceo y ángulo

use std::time::Duration;

use crate::config::{FollowerSettings, RotationSource};
use crate::types::{ScreenPoint, Vec2};

/// Estado mutable del seguidor, actualizado en cada tick
#[derive(Debug, Clone)]
pub struct FollowerState {
    position: Vec2,
    angle: f64,
    prev_cursor_x: f64,
    sway: f64,
}

impl FollowerState {
    /// Arranca sobre la posición actual del cursor
    pub fn new(cursor: ScreenPoint) -> Self {
        let cursor = cursor.to_vec2();
        Self {
            position: cursor,
            angle: 0.0,
            prev_cursor_x: cursor.x,
            sway: 0.0,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Ángulo actual en grados (positivo = horario)
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    #[inline]
    pub fn sway(&self) -> f64 {
        self.sway
    }

    /// Ángulo redondeado al grado, clave de la caché de rotaciones
    #[inline]
    pub fn angle_key(&self) -> i32 {
        self.angle.round() as i32
    }

    /// Avanza un tick hacia la posición del cursor
    pub fn update(&mut self, cursor: ScreenPoint, cfg: &FollowerSettings) {
        let cursor = cursor.to_vec2();

        // Balanceo lateral a partir de la velocidad horizontal
        let delta_x = cursor.x - self.prev_cursor_x;
        self.prev_cursor_x = cursor.x;
        self.sway += (delta_x * cfg.sway_gain - self.sway) * cfg.sway_smoothing;
        self.sway = self.sway.clamp(-cfg.max_sway, cfg.max_sway);

        let target = cursor + Vec2::new(cfg.offset_x + self.sway, cfg.offset_y);
        self.position = self.position.lerp(target, cfg.smoothing);

        // Recorte duro al radio máximo alrededor del cursor
        let dist = self.position.distance(cursor);
        if dist > cfg.clamp_radius {
            self.position = cursor + (self.position - cursor) * (cfg.clamp_radius / dist);
        }

        let raw_angle = match cfg.rotation_source {
            RotationSource::Sway => self.sway * cfg.angle_gain,
            RotationSource::Lag => (cursor.x - self.position.x) * cfg.angle_gain,
        };
        let max = cfg.max_angle_deg;
        let target_angle = raw_angle.clamp(-max, max);
        self.angle += (target_angle - self.angle) * cfg.angle_smoothing;
        self.angle = self.angle.clamp(-max, max);
    }
}

/// Desplazamiento vertical del balanceo para el tiempo transcurrido
pub fn bob_offset(elapsed: Duration, cfg: &FollowerSettings) -> f64 {
    (elapsed.as_secs_f64() * cfg.bob_frequency).sin() * cfg.bob_amplitude
}

/// Esquina superior izquierda de la ventana para centrar el lienzo en `center`
pub fn window_origin(center: Vec2, bob: f64, canvas_size: u32) -> ScreenPoint {
    let half = (canvas_size / 2) as f64;
    ScreenPoint::new((center.x - half) as i32, (center.y - half + bob) as i32)
}
