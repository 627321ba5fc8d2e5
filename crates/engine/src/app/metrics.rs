use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::rendering::DrawStats;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn recover<G>(poisoned: PoisonError<G>, operation: &'static str) -> G {
    if !METRICS_LOCK_POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
    poisoned.into_inner()
}

/// Loop and draw statistics averaged over one logging interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Slowest single frame in the interval.
    pub worst_frame_ms: f32,
    pub text_quads_per_frame: f32,
    pub mesh_triangles_per_frame: f32,
    /// Simulation time thrown away because a frame hit the tick cap.
    pub dropped_backlog_ms: f32,
    pub entity_count: usize,
}

/// Read side of the loop metrics, cheap to clone into tools or tests.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self
            .latest
            .read()
            .unwrap_or_else(|poisoned| recover(poisoned, "read"))
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| recover(poisoned, "write")) = snapshot;
    }
}

/// What one presented frame cost and produced.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FrameSample {
    pub(crate) frame_dt: Duration,
    pub(crate) ticks: u32,
    pub(crate) dropped_backlog: Duration,
    pub(crate) draw: DrawStats,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
    worst_frame: Duration,
    dropped_backlog: Duration,
    text_quads: u64,
    mesh_triangles: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            frames: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
            worst_frame: Duration::ZERO,
            dropped_backlog: Duration::ZERO,
            text_quads: 0,
            mesh_triangles: 0,
        }
    }

    pub(crate) fn record_frame(&mut self, sample: FrameSample) {
        self.frames = self.frames.saturating_add(1);
        self.ticks = self.ticks.saturating_add(sample.ticks);
        self.frame_time_sum = self.frame_time_sum.saturating_add(sample.frame_dt);
        self.worst_frame = self.worst_frame.max(sample.frame_dt);
        self.dropped_backlog = self.dropped_backlog.saturating_add(sample.dropped_backlog);
        self.text_quads = self.text_quads.saturating_add(sample.draw.text_quads as u64);
        self.mesh_triangles = self
            .mesh_triangles
            .saturating_add(sample.draw.mesh_triangles as u64);
    }

    /// Closes the interval once it has run its length and starts the next
    /// one at `now`.
    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        entity_count: usize,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let per_frame = |total: f32| {
            if self.frames == 0 {
                0.0
            } else {
                total / self.frames as f32
            }
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms: per_frame(self.frame_time_sum.as_secs_f32() * 1000.0),
            worst_frame_ms: self.worst_frame.as_secs_f32() * 1000.0,
            text_quads_per_frame: per_frame(self.text_quads as f32),
            mesh_triangles_per_frame: per_frame(self.mesh_triangles as f32),
            dropped_backlog_ms: self.dropped_backlog.as_secs_f32() * 1000.0,
            entity_count,
        };

        *self = Self::new(self.interval, now);
        Some(snapshot)
    }
}
