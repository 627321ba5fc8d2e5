use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

static SETTINGS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_settings_lock_poison_once(operation: &'static str) {
    if SETTINGS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "settings lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Linear RGBA in `[0, 1]`.
    pub clear_color: [f32; 4],
    pub fullscreen: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.08, 0.08, 0.1, 1.0],
            fullscreen: false,
        }
    }
}

/// Shared render settings. Console commands write, the loop reads once per
/// frame.
#[derive(Clone, Debug, Default)]
pub struct SettingsHandle {
    settings: Arc<RwLock<RenderSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> RenderSettings {
        match self.settings.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_settings_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub fn update(&self, apply: impl FnOnce(&mut RenderSettings)) {
        match self.settings.write() {
            Ok(mut guard) => apply(&mut guard),
            Err(poisoned) => {
                warn_settings_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                apply(&mut guard);
            }
        }
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.update(|settings| settings.fullscreen = fullscreen);
        info!(fullscreen, "fullscreen_changed");
    }

    pub fn set_clear_color(&self, rgb: [f32; 3]) {
        self.update(|settings| settings.clear_color = [rgb[0], rgb[1], rgb[2], 1.0]);
        info!(r = rgb[0], g = rgb[1], b = rgb[2], "clear_color_changed");
    }
}

/// Cleared to request loop shutdown.
#[derive(Clone, Debug)]
pub struct RunHandle {
    running: Arc<AtomicBool>,
}

impl Default for RunHandle {
    fn default() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl RunHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn request_exit(&self) {
        self.running.store(false, Ordering::Release);
    }
}
