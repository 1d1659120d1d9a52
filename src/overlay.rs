//! Bucle principal del overlay: seguidor + estela de destellos

use std::thread;
use std::time::{Duration, Instant};

use image::RgbaImage;
use rand::rngs::StdRng;

use crate::config::{Settings, ZOrder};
use crate::error::Result;
use crate::follower::{
    bob_offset, compose_centered, window_origin, FollowerState, Interpolation, RotationCache,
    SpriteHandle,
};
use crate::scheduler::{Scheduler, Task};
use crate::sparkle::{ParticleLayer, SparkleId, SparkleUpdate};
use crate::types::ScreenPoint;

/// Servicios que el sistema de ventanas presta al overlay
pub trait Host {
    /// Posición global del cursor
    fn cursor_position(&mut self) -> Result<ScreenPoint>;

    /// Muestra el lienzo del seguidor con la esquina superior izquierda en `origin`
    fn present_follower(&mut self, canvas: &RgbaImage, origin: ScreenPoint) -> Result<()>;

    /// Muestra o redibuja un destello con la esquina superior izquierda en `origin`
    fn present_sparkle(
        &mut self,
        id: SparkleId,
        image: &RgbaImage,
        origin: ScreenPoint,
    ) -> Result<()>;

    /// Oculta un destello eliminado; ignora identificadores desconocidos
    fn hide_sparkle(&mut self, id: SparkleId) -> Result<()>;

    /// Fija el orden de apilado entre el seguidor y los destellos
    fn apply_z_order(&mut self, order: ZOrder) -> Result<()>;

    /// Procesa los mensajes pendientes; devuelve false si hay que salir
    fn pump_events(&mut self) -> Result<bool>;
}

/// Estado completo del overlay
pub struct Overlay {
    settings: Settings,
    follower: FollowerState,
    cache: RotationCache,
    particles: ParticleLayer,
    scheduler: Scheduler,
    started: Instant,
    rng: StdRng,
    /// La última lectura del cursor falló (ya avisado en el log)
    cursor_lost: bool,
}

impl Overlay {
    pub fn new(
        settings: Settings,
        sprite: SpriteHandle,
        sparkle: SpriteHandle,
        cursor: ScreenPoint,
        now: Instant,
        rng: StdRng,
    ) -> Self {
        let interpolation = Interpolation::from_antialias(settings.follower.antialias);

        let mut scheduler = Scheduler::new();
        scheduler.add(
            Task::Follow,
            Duration::from_millis(settings.follower.interval_ms),
            now,
        );
        scheduler.add(
            Task::Spawn,
            Duration::from_millis(settings.sparkle.spawn_interval_ms),
            now,
        );

        Self {
            follower: FollowerState::new(cursor),
            cache: RotationCache::new(sprite, interpolation),
            particles: ParticleLayer::new(sparkle, settings.sparkle.clone()),
            scheduler,
            started: now,
            rng,
            cursor_lost: false,
            settings,
        }
    }

    pub fn cached_rotations(&self) -> usize {
        self.cache.len()
    }

    /// Ejecuta las tareas que vencen en `now`
    pub fn step(&mut self, host: &mut dyn Host, now: Instant) -> Result<()> {
        let mut followed = false;

        for task in self.scheduler.due(now) {
            match task {
                Task::Follow => {
                    self.follow(host, now);
                    followed = true;
                }
                Task::Spawn => {
                    let around = self.follower.position();
                    let at = self.particles.spawn_near(around, now, &mut self.rng);
                    log::trace!(
                        "Destello en ({}, {}), {} vivos",
                        at.x,
                        at.y,
                        self.particles.live()
                    );
                }
            }
        }

        let report = self.particles.tick(now);
        if report.changed() {
            log::trace!(
                "{} destellos atenuados, {} eliminados, {} vivos",
                report.faded,
                report.removed,
                self.particles.live()
            );
        }

        // Los destellos se redibujan como mucho una vez por tick del seguidor
        if followed {
            self.present_sparkles(host);
        }

        Ok(())
    }

    fn follow(&mut self, host: &mut dyn Host, now: Instant) {
        let cursor = match host.cursor_position() {
            Ok(cursor) => {
                if self.cursor_lost {
                    log::info!("Lectura del cursor recuperada");
                    self.cursor_lost = false;
                }
                cursor
            }
            Err(e) => {
                if !self.cursor_lost {
                    log::warn!("No se pudo leer el cursor: {}", e);
                    self.cursor_lost = true;
                }
                return;
            }
        };

        let cfg = &self.settings.follower;
        self.follower.update(cursor, cfg);
        log::trace!(
            "Seguidor en ({:.1}, {:.1}), ángulo {:.1}, balanceo {:.1}",
            self.follower.position().x,
            self.follower.position().y,
            self.follower.angle(),
            self.follower.sway()
        );

        let sprite = self.cache.get(self.follower.angle_key());
        let canvas = compose_centered(&sprite, cfg.canvas_size);
        let bob = bob_offset(now.saturating_duration_since(self.started), cfg);
        let origin = window_origin(self.follower.position(), bob, cfg.canvas_size);

        if let Err(e) = host.present_follower(&canvas, origin) {
            log::warn!("No se pudo dibujar el seguidor: {}", e);
        }
    }

    /// Envía al host sólo los destellos nuevos, atenuados o eliminados
    fn present_sparkles(&mut self, host: &mut dyn Host) {
        for update in self.particles.take_updates() {
            let result = match &update {
                SparkleUpdate::Show { id, origin, image } => {
                    host.present_sparkle(*id, image, *origin)
                }
                SparkleUpdate::Hide { id } => host.hide_sparkle(*id),
            };
            if let Err(e) = result {
                log::warn!("No se pudo dibujar la estela: {}", e);
            }
        }
    }

    /// Próximo instante en que hay trabajo pendiente
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.scheduler.next_deadline(), self.particles.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Bucle principal: procesa mensajes, ejecuta tareas y duerme hasta el
    /// siguiente vencimiento
    pub fn run(mut self, host: &mut dyn Host) -> Result<()> {
        host.apply_z_order(self.settings.z_order)?;
        log::info!(
            "Overlay en marcha (variante {:?}, lienzo {}px)",
            self.settings.preset,
            self.settings.follower.canvas_size
        );

        while host.pump_events()? {
            self.step(host, Instant::now())?;

            if let Some(deadline) = self.next_deadline() {
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                }
            }
        }

        log::info!(
            "Overlay detenido ({} rotaciones en caché)",
            self.cached_rotations()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::error::OverlayError;
    use image::Rgba;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Host simulado: cursor programable y registro de lo presentado
    #[derive(Default)]
    struct FakeHost {
        cursor: ScreenPoint,
        cursor_fails: bool,
        follower_frames: Vec<(ScreenPoint, (u32, u32))>,
        sparkles: HashMap<SparkleId, ScreenPoint>,
        sparkle_draws: usize,
        sparkle_pixels: u64,
        sparkle_max_area: u32,
        hidden: Vec<SparkleId>,
        z_order: Option<ZOrder>,
        fail_present: bool,
        pumps_left: usize,
    }

    impl FakeHost {
        fn sparkle_ops(&self) -> usize {
            self.sparkle_draws + self.hidden.len()
        }
    }

    impl Host for FakeHost {
        fn cursor_position(&mut self) -> Result<ScreenPoint> {
            if self.cursor_fails {
                return Err(OverlayError::UnsupportedPlatform);
            }
            Ok(self.cursor)
        }

        fn present_follower(&mut self, canvas: &RgbaImage, origin: ScreenPoint) -> Result<()> {
            if self.fail_present {
                return Err(OverlayError::UnsupportedPlatform);
            }
            self.follower_frames.push((origin, canvas.dimensions()));
            Ok(())
        }

        fn present_sparkle(
            &mut self,
            id: SparkleId,
            image: &RgbaImage,
            origin: ScreenPoint,
        ) -> Result<()> {
            let area = image.width() * image.height();
            self.sparkles.insert(id, origin);
            self.sparkle_draws += 1;
            self.sparkle_pixels += area as u64;
            self.sparkle_max_area = self.sparkle_max_area.max(area);
            Ok(())
        }

        fn hide_sparkle(&mut self, id: SparkleId) -> Result<()> {
            self.sparkles.remove(&id);
            self.hidden.push(id);
            Ok(())
        }

        fn apply_z_order(&mut self, order: ZOrder) -> Result<()> {
            self.z_order = Some(order);
            Ok(())
        }

        fn pump_events(&mut self) -> Result<bool> {
            if self.pumps_left == 0 {
                return Ok(false);
            }
            self.pumps_left -= 1;
            Ok(true)
        }
    }

    fn overlay(settings: Settings, cursor: ScreenPoint, now: Instant) -> Overlay {
        let sprite = Rc::new(RgbaImage::from_pixel(40, 30, Rgba([200, 200, 200, 255])));
        let sparkle = Rc::new(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 0, 255])));
        Overlay::new(settings, sprite, sparkle, cursor, now, StdRng::seed_from_u64(3))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_follow_and_spawn_cadence() {
        let start = Instant::now();
        let settings = Settings::default();
        let mut host = FakeHost::default();
        let mut overlay = overlay(settings, host.cursor, start);

        for t in 1..=160 {
            overlay.step(&mut host, start + ms(t)).unwrap();
        }
        assert_eq!(host.follower_frames.len(), 16);
        assert!(host
            .follower_frames
            .iter()
            .all(|(_, size)| *size == (80, 80)));
        // Dos emisiones, ambas ya en pantalla
        assert_eq!(overlay.particles.live(), 2);
        assert_eq!(host.sparkles.len(), 2);
    }

    #[test]
    fn test_follower_stays_within_radius_after_jump() {
        let start = Instant::now();
        let settings = Settings::from_preset(Preset::Sway);
        let radius = settings.follower.clamp_radius;
        let mut host = FakeHost::default();
        let mut overlay = overlay(settings, ScreenPoint::new(100, 100), start);
        host.cursor = ScreenPoint::new(100, 100);

        overlay.step(&mut host, start + ms(10)).unwrap();
        host.cursor = ScreenPoint::new(1100, 1100);
        overlay.step(&mut host, start + ms(20)).unwrap();

        let dist = overlay.follower.position().distance(host.cursor.to_vec2());
        assert!(dist <= radius + 1e-9);
    }

    #[test]
    fn test_window_is_centered_on_follower() {
        let start = Instant::now();
        let mut settings = Settings::default();
        settings.follower.bob_amplitude = 0.0;
        let mut host = FakeHost::default();
        host.cursor = ScreenPoint::new(500, 500);
        let mut overlay = overlay(settings, host.cursor, start);

        overlay.step(&mut host, start + ms(10)).unwrap();
        let pos = overlay.follower.position();
        let (origin, _) = host.follower_frames[0];
        assert_eq!(origin.x, (pos.x - 40.0) as i32);
        assert_eq!(origin.y, (pos.y - 40.0) as i32);
    }

    #[test]
    fn test_expired_sparkles_are_hidden() {
        let start = Instant::now();
        let mut host = FakeHost::default();
        let mut overlay = overlay(Settings::default(), host.cursor, start);

        overlay.step(&mut host, start + ms(80)).unwrap();
        assert_eq!(overlay.particles.live(), 1);
        assert_eq!(host.sparkles.len(), 1);

        // Sin nuevas emisiones: sólo el seguidor y los temporizadores de destellos
        overlay.scheduler = Scheduler::new();
        overlay.scheduler.add(Task::Follow, ms(10), start + ms(80));
        let mut t = 80;
        while overlay.particles.live() > 0 {
            t += 10;
            overlay.step(&mut host, start + ms(t)).unwrap();
            assert!(t < 80 + 30 * 25, "el destello no se elimina");
        }
        assert!(host.sparkles.is_empty());
        assert_eq!(host.hidden, vec![0]);
    }

    #[test]
    fn test_sparkle_redraw_is_bounded_during_fast_flick() {
        let start = Instant::now();
        let mut host = FakeHost::default();
        let mut overlay = overlay(Settings::default(), host.cursor, start);

        for t in 1..=1000i32 {
            // Barrido de 3000x1600 px en 400 ms, luego quieto
            let progress = t.min(400);
            host.cursor = ScreenPoint::new(3000 * progress / 400, 1600 * progress / 400);

            let frames = host.follower_frames.len();
            let ops = host.sparkle_ops();
            overlay.step(&mut host, start + ms(t as u64)).unwrap();
            if host.follower_frames.len() == frames {
                assert_eq!(host.sparkle_ops(), ops, "redibujo fuera del tick en t={}", t);
            }
        }

        assert_eq!(host.follower_frames.len(), 100);
        // Cada destello se dibuja en su propia ventana del tamaño del sprite
        assert_eq!(host.sparkle_max_area, 10 * 10);
        // Un dibujo al aparecer y uno por cada paso de desvanecido, como mucho
        let spawned = 1000 / 80;
        assert!(host.sparkle_draws <= spawned * 21, "{}", host.sparkle_draws);
        assert!(host.sparkle_pixels <= (spawned * 21 * 100) as u64);
    }

    #[test]
    fn test_rotation_cache_is_reused() {
        let start = Instant::now();
        let settings = Settings::default();
        let mut host = FakeHost::default();
        host.cursor = ScreenPoint::new(300, 300);
        let mut overlay = overlay(settings, host.cursor, start);

        for t in 1..=500 {
            overlay.step(&mut host, start + ms(t * 10)).unwrap();
        }
        // Cursor quieto: el ángulo converge y sólo se rota un puñado de veces
        assert!(overlay.cached_rotations() <= 16);
        assert_eq!(host.follower_frames.len(), 500);
    }

    #[test]
    fn test_present_failure_does_not_stop_loop() {
        let start = Instant::now();
        let mut host = FakeHost {
            fail_present: true,
            ..FakeHost::default()
        };
        let mut overlay = overlay(Settings::default(), host.cursor, start);
        assert!(overlay.step(&mut host, start + ms(10)).is_ok());
        assert!(host.follower_frames.is_empty());
    }

    #[test]
    fn test_cursor_failure_is_reported_until_recovered() {
        let start = Instant::now();
        let mut host = FakeHost {
            cursor_fails: true,
            ..FakeHost::default()
        };
        let mut overlay = overlay(Settings::default(), host.cursor, start);

        overlay.step(&mut host, start + ms(10)).unwrap();
        assert!(overlay.cursor_lost);
        overlay.step(&mut host, start + ms(20)).unwrap();
        assert!(overlay.cursor_lost);
        assert!(host.follower_frames.is_empty());

        host.cursor_fails = false;
        overlay.step(&mut host, start + ms(30)).unwrap();
        assert!(!overlay.cursor_lost);
        assert_eq!(host.follower_frames.len(), 1);
    }

    #[test]
    fn test_run_applies_z_order_and_stops_on_quit() {
        let start = Instant::now();
        let mut settings = Settings::default();
        settings.z_order = ZOrder::ParticlesAbove;
        let mut host = FakeHost {
            pumps_left: 3,
            ..FakeHost::default()
        };
        let overlay = overlay(settings, host.cursor, start);
        overlay.run(&mut host).unwrap();
        assert_eq!(host.z_order, Some(ZOrder::ParticlesAbove));
        assert_eq!(host.pumps_left, 0);
    }

    #[test]
    fn test_next_deadline_includes_particles() {
        let start = Instant::now();
        let mut host = FakeHost::default();
        let mut overlay = overlay(Settings::default(), host.cursor, start);
        assert_eq!(overlay.next_deadline(), Some(start + ms(10)));

        overlay.step(&mut host, start + ms(80)).unwrap();
        overlay.scheduler = Scheduler::new();
        assert_eq!(overlay.next_deadline(), Some(start + ms(110)));
    }
}
