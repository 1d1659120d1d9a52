//! Estela de destellos que se desvanecen

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::SparkleSettings;
use crate::follower::SpriteHandle;
use crate::scheduler::Interval;
use crate::types::{ScreenPoint, Vec2};

/// Identificador estable de un destello mientras vive
pub type SparkleId = u64;

/// Resultado de un paso de desvanecido
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    Visible,
    Expired,
}

/// Destello individual con su propio temporizador de desvanecido
#[derive(Debug, Clone)]
pub struct Particle {
    id: SparkleId,
    center: ScreenPoint,
    opacity: f32,
    timer: Interval,
    /// Ya se ha mostrado alguna vez en pantalla
    shown: bool,
    /// Cambió desde la última vez que se presentó
    dirty: bool,
}

impl Particle {
    pub fn new(id: SparkleId, center: ScreenPoint, fade_interval: Duration, now: Instant) -> Self {
        Self {
            id,
            center,
            opacity: 1.0,
            timer: Interval::new(fade_interval, now),
            shown: false,
            dirty: true,
        }
    }

    /// Resta un paso de opacidad
    pub fn fade(&mut self, step: f32) -> FadeOutcome {
        self.opacity -= step;
        if self.opacity <= 0.0 {
            FadeOutcome::Expired
        } else {
            self.dirty = true;
            FadeOutcome::Visible
        }
    }
}

/// Resumen de un tick de la capa
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FadeReport {
    pub faded: usize,
    pub removed: usize,
}

impl FadeReport {
    #[inline]
    pub fn changed(&self) -> bool {
        self.faded > 0 || self.removed > 0
    }
}

/// Cambio pendiente de mostrar en pantalla
#[derive(Debug, Clone)]
pub enum SparkleUpdate {
    /// Mostrar (o redibujar) el destello con esa imagen y esquina superior izquierda
    Show {
        id: SparkleId,
        origin: ScreenPoint,
        image: SpriteHandle,
    },
    /// Ocultar el destello, que ya no existe
    Hide { id: SparkleId },
}

/// Imágenes del destello ya atenuadas, una por nivel de alfa
struct FadeCache {
    base: SpriteHandle,
    levels: HashMap<u8, SpriteHandle>,
}

impl FadeCache {
    fn new(base: SpriteHandle) -> Self {
        Self {
            base,
            levels: HashMap::new(),
        }
    }

    fn get(&mut self, opacity: f32) -> SpriteHandle {
        let level = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        if level == u8::MAX {
            return Rc::clone(&self.base);
        }
        let base = &self.base;
        Rc::clone(self.levels.entry(level).or_insert_with(|| {
            let mut faded = (**base).clone();
            for pixel in faded.pixels_mut() {
                pixel[3] = ((pixel[3] as u16 * level as u16 + 127) / 255) as u8;
            }
            Rc::new(faded)
        }))
    }
}

/// Todos los destellos vivos, cada uno presentado por separado
pub struct ParticleLayer {
    fades: FadeCache,
    settings: SparkleSettings,
    particles: Vec<Particle>,
    pending_hide: Vec<SparkleId>,
    next_id: SparkleId,
}

impl ParticleLayer {
    pub fn new(image: SpriteHandle, settings: SparkleSettings) -> Self {
        Self {
            fades: FadeCache::new(image),
            settings,
            particles: Vec::new(),
            pending_hide: Vec::new(),
            next_id: 0,
        }
    }

    /// Número de destellos vivos
    pub fn live(&self) -> usize {
        self.particles.len()
    }

    /// Crea un destello cerca de `around` con dispersión aleatoria uniforme
    pub fn spawn_near<R: Rng + ?Sized>(
        &mut self,
        around: Vec2,
        now: Instant,
        rng: &mut R,
    ) -> ScreenPoint {
        let jitter = self.settings.jitter;
        let center = ScreenPoint::new(
            around.x as i32 + rng.gen_range(-jitter..=jitter),
            around.y as i32 + rng.gen_range(-jitter..=jitter),
        );
        let interval = Duration::from_millis(self.settings.fade_interval_ms);
        self.particles
            .push(Particle::new(self.next_id, center, interval, now));
        self.next_id += 1;
        center
    }

    /// Desvanece los destellos cuyo temporizador ha vencido y elimina los agotados
    pub fn tick(&mut self, now: Instant) -> FadeReport {
        let step = self.settings.fade_step;
        let mut report = FadeReport::default();
        let pending_hide = &mut self.pending_hide;

        self.particles.retain_mut(|particle| {
            if !particle.timer.poll(now) {
                return true;
            }
            match particle.fade(step) {
                FadeOutcome::Visible => {
                    report.faded += 1;
                    true
                }
                FadeOutcome::Expired => {
                    report.removed += 1;
                    if particle.shown {
                        pending_hide.push(particle.id);
                    }
                    false
                }
            }
        });

        report
    }

    /// Próximo vencimiento de cualquier destello
    pub fn next_deadline(&self) -> Option<Instant> {
        self.particles.iter().map(|p| p.timer.next_due()).min()
    }

    /// Cambios acumulados desde la última llamada: primero los destellos
    /// eliminados, luego los nuevos o atenuados
    pub fn take_updates(&mut self) -> Vec<SparkleUpdate> {
        let mut updates: Vec<SparkleUpdate> = self
            .pending_hide
            .drain(..)
            .map(|id| SparkleUpdate::Hide { id })
            .collect();

        for particle in self.particles.iter_mut().filter(|p| p.dirty) {
            let image = self.fades.get(particle.opacity);
            let (w, h) = image.dimensions();
            let origin = ScreenPoint::new(
                particle.center.x - (w / 2) as i32,
                particle.center.y - (h / 2) as i32,
            );
            particle.dirty = false;
            particle.shown = true;
            updates.push(SparkleUpdate::Show {
                id: particle.id,
                origin,
                image,
            });
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer() -> ParticleLayer {
        let image = Rc::new(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 0, 255])));
        ParticleLayer::new(image, SparkleSettings::default())
    }

    fn shown_ids(updates: &[SparkleUpdate]) -> Vec<SparkleId> {
        updates
            .iter()
            .filter_map(|u| match u {
                SparkleUpdate::Show { id, .. } => Some(*id),
                SparkleUpdate::Hide { .. } => None,
            })
            .collect()
    }

    fn hidden_ids(updates: &[SparkleUpdate]) -> Vec<SparkleId> {
        updates
            .iter()
            .filter_map(|u| match u {
                SparkleUpdate::Hide { id } => Some(*id),
                SparkleUpdate::Show { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_opacity_drops_by_step_until_removed() {
        let settings = SparkleSettings::default();
        let interval = Duration::from_millis(settings.fade_interval_ms);
        let start = Instant::now();
        let mut layer = layer();
        let mut rng = StdRng::seed_from_u64(7);
        layer.spawn_near(Vec2::new(50.0, 50.0), start, &mut rng);

        let mut expected = 1.0f32;
        let mut tick = 0;
        loop {
            tick += 1;
            let report = layer.tick(start + interval * tick);
            expected -= settings.fade_step;
            if expected <= 0.0 {
                assert_eq!(report, FadeReport { faded: 0, removed: 1 });
                assert_eq!(layer.live(), 0);
                break;
            }
            assert_eq!(report, FadeReport { faded: 1, removed: 0 });
            assert_eq!(layer.particles[0].opacity, expected);
        }
        // 1.0 / 0.05 pasos, con margen por redondeo
        assert!((20..=21).contains(&tick));

        // Una vez eliminado no vuelve a contarse
        assert_eq!(layer.tick(start + interval * (tick + 1)), FadeReport::default());
    }

    #[test]
    fn test_each_particle_fades_on_its_own_timer() {
        let start = Instant::now();
        let origin = Vec2::new(0.0, 0.0);
        let mut layer = layer();
        let mut rng = StdRng::seed_from_u64(1);
        layer.spawn_near(origin, start, &mut rng);
        layer.spawn_near(origin, start + Duration::from_millis(20), &mut rng);

        let report = layer.tick(start + Duration::from_millis(30));
        assert_eq!(report.faded, 1);
        assert_eq!(layer.particles[0].opacity, 1.0 - 0.05);
        assert_eq!(layer.particles[1].opacity, 1.0);
        assert_eq!(
            layer.next_deadline(),
            Some(start + Duration::from_millis(50))
        );
    }

    #[test]
    fn test_spawn_jitter_stays_in_range() {
        let start = Instant::now();
        let mut layer = layer();
        let mut rng = StdRng::seed_from_u64(42);
        let around = Vec2::new(500.0, 300.0);
        for _ in 0..500 {
            let p = layer.spawn_near(around, start, &mut rng);
            assert!((450..=550).contains(&p.x));
            assert!((250..=350).contains(&p.y));
        }
        assert_eq!(layer.live(), 500);
    }

    #[test]
    fn test_updates_center_each_sparkle() {
        let start = Instant::now();
        let mut layer = layer();
        let interval = Duration::from_millis(30);
        layer.particles.push(Particle::new(7, ScreenPoint::new(10, 10), interval, start));

        let updates = layer.take_updates();
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            SparkleUpdate::Show { id, origin, image } => {
                assert_eq!(*id, 7);
                assert_eq!(*origin, ScreenPoint::new(8, 8));
                assert_eq!(image.dimensions(), (4, 4));
                assert_eq!(image.get_pixel(1, 1)[3], 255);
            }
            other => panic!("se esperaba Show, no {:?}", other),
        }

        // Sin cambios no hay nada que redibujar
        assert!(layer.take_updates().is_empty());
    }

    #[test]
    fn test_only_faded_sparkles_are_redrawn() {
        let start = Instant::now();
        let mut layer = layer();
        let mut rng = StdRng::seed_from_u64(5);
        layer.spawn_near(Vec2::new(0.0, 0.0), start, &mut rng);
        layer.spawn_near(Vec2::new(0.0, 0.0), start + Duration::from_millis(20), &mut rng);
        assert_eq!(shown_ids(&layer.take_updates()), vec![0, 1]);

        layer.tick(start + Duration::from_millis(30));
        let updates = layer.take_updates();
        assert_eq!(shown_ids(&updates), vec![0]);
        match &updates[0] {
            SparkleUpdate::Show { image, .. } => {
                assert!((241..=243).contains(&image.get_pixel(0, 0)[3]));
            }
            other => panic!("se esperaba Show, no {:?}", other),
        }
    }

    #[test]
    fn test_faded_images_are_shared_per_level() {
        let start = Instant::now();
        let interval = Duration::from_millis(30);
        let mut layer = layer();
        for id in 0..2 {
            let mut particle = Particle::new(id, ScreenPoint::new(0, 0), interval, start);
            particle.opacity = 0.5;
            layer.particles.push(particle);
        }

        let images: Vec<SpriteHandle> = layer
            .take_updates()
            .into_iter()
            .filter_map(|u| match u {
                SparkleUpdate::Show { image, .. } => Some(image),
                SparkleUpdate::Hide { .. } => None,
            })
            .collect();
        assert_eq!(images.len(), 2);
        assert!(Rc::ptr_eq(&images[0], &images[1]));
        assert!((127..=128).contains(&images[0].get_pixel(1, 1)[3]));
        assert_eq!(layer.fades.levels.len(), 1);
    }

    #[test]
    fn test_expired_sparkle_is_hidden_once() {
        let settings = SparkleSettings::default();
        let interval = Duration::from_millis(settings.fade_interval_ms);
        let start = Instant::now();
        let mut layer = layer();
        let mut rng = StdRng::seed_from_u64(9);
        layer.spawn_near(Vec2::new(0.0, 0.0), start, &mut rng);
        layer.take_updates();

        let mut hides = Vec::new();
        for tick in 1..=30 {
            layer.tick(start + interval * tick);
            hides.extend(hidden_ids(&layer.take_updates()));
        }
        assert_eq!(hides, vec![0]);
        assert_eq!(layer.live(), 0);
    }

    #[test]
    fn test_never_shown_sparkle_needs_no_hide() {
        let start = Instant::now();
        let mut layer = layer();
        let mut particle = Particle::new(0, ScreenPoint::new(0, 0), Duration::from_millis(30), start);
        particle.opacity = 0.05;
        layer.particles.push(particle);

        assert_eq!(layer.tick(start + Duration::from_millis(30)).removed, 1);
        assert!(layer.take_updates().is_empty());
    }

    #[test]
    fn test_empty_layer_has_no_work() {
        let mut layer = layer();
        assert!(layer.take_updates().is_empty());
        assert!(layer.next_deadline().is_none());
    }
}
