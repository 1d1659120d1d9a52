//! Planificador de tareas periódicas a ritmo fijo

use std::time::{Duration, Instant};

/// Temporizador periódico sondeado desde el bucle principal
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period: Duration,
    next_due: Instant,
}

impl Interval {
    /// Primer disparo un periodo después de `start`
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_due: start + period,
        }
    }

    #[inline]
    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Devuelve true si toca disparar en `now` y programa el siguiente.
    /// Si el bucle se ha retrasado más de un periodo, dispara una sola vez
    /// y se reancla a `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.period;
        if self.next_due <= now {
            self.next_due = now + self.period;
        }
        true
    }
}

/// Tareas del overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Actualizar y redibujar el seguidor
    Follow,
    /// Emitir un destello
    Spawn,
}

/// Conjunto de tareas periódicas independientes
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<(Task, Interval)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task, period: Duration, now: Instant) {
        self.tasks.push((task, Interval::new(period, now)));
    }

    /// Tareas que vencen en `now`, en orden de registro
    pub fn due(&mut self, now: Instant) -> Vec<Task> {
        self.tasks
            .iter_mut()
            .filter_map(|(task, interval)| interval.poll(now).then_some(*task))
            .collect()
    }

    /// Próximo vencimiento de cualquier tarea
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|(_, interval)| interval.next_due()).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_interval_fires_once_per_period() {
        let start = Instant::now();
        let mut interval = Interval::new(ms(10), start);
        assert!(!interval.poll(start));
        assert!(!interval.poll(start + ms(9)));
        assert!(interval.poll(start + ms(10)));
        assert!(!interval.poll(start + ms(15)));
        assert!(interval.poll(start + ms(21)));
        // Mantiene la fase de arranque
        assert_eq!(interval.next_due(), start + ms(30));
    }

    #[test]
    fn test_interval_reanchors_after_stall() {
        let start = Instant::now();
        let mut interval = Interval::new(ms(10), start);
        let late = start + ms(95);
        assert!(interval.poll(late));
        assert!(!interval.poll(late));
        assert_eq!(interval.next_due(), late + ms(10));
    }

    #[test]
    fn test_scheduler_runs_tasks_at_their_own_rate() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.add(Task::Follow, ms(10), start);
        scheduler.add(Task::Spawn, ms(80), start);

        let mut follows = 0;
        let mut spawns = 0;
        for step in 1..=160 {
            for task in scheduler.due(start + ms(step)) {
                match task {
                    Task::Follow => follows += 1,
                    Task::Spawn => spawns += 1,
                }
            }
        }
        assert_eq!(follows, 16);
        assert_eq!(spawns, 2);
    }

    #[test]
    fn test_next_deadline_is_earliest_task() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.next_deadline(), None);
        scheduler.add(Task::Spawn, ms(80), start);
        scheduler.add(Task::Follow, ms(10), start);
        assert_eq!(scheduler.next_deadline(), Some(start + ms(10)));
    }
}
