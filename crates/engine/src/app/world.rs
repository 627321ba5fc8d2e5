use tracing::debug;

use crate::resources::{Font, Handle, Mesh};
use crate::text::{build_text_mesh, TextMesh};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone)]
pub struct TextLabel {
    pub text: String,
    pub font: Handle<Font>,
    pub font_size: f32,
    /// Baseline origin in window pixels, +Y up.
    pub position: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh: Handle<Mesh>,
    pub position: [f32; 2],
    pub scale: f32,
}

/// Countdown that destroys its entity when it reaches zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    pub active: bool,
    pub remaining_seconds: f64,
}

impl Timer {
    pub fn new(seconds: f64, active: bool) -> Self {
        Self {
            active,
            remaining_seconds: seconds,
        }
    }

    pub fn restart(&mut self, seconds: f64, active: bool) {
        self.remaining_seconds = seconds;
        self.active = active;
    }
}

#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub label: Option<TextLabel>,
    pub text_mesh: Option<TextMesh>,
    pub mesh: Option<MeshInstance>,
    pub timer: Option<Timer>,
}

impl Entity {
    /// Brings the text mesh in line with the label. Dynamic meshes are
    /// rewritten in place; a missing mesh is built statically. Does nothing
    /// while the label's font is unloaded.
    pub fn refresh_text_mesh(&mut self) {
        let Some(label) = self.label.as_ref() else {
            self.text_mesh = None;
            return;
        };
        let Some(font) = label.font.get() else {
            return;
        };
        match self.text_mesh.as_mut() {
            Some(mesh) => {
                if mesh.font_size() != label.font_size {
                    mesh.set_font_size(font, label.font_size);
                }
                if mesh.origin() != label.position {
                    mesh.set_origin(font, label.position[0], label.position[1]);
                }
                mesh.update(font, &label.text);
            }
            None => {
                self.text_mesh = Some(build_text_mesh(
                    &label.text,
                    font,
                    label.position[0],
                    label.position[1],
                    label.font_size,
                ));
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct World {
    next_id: u64,
    entities: Vec<Entity>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: impl Into<String>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.entities.push(Entity {
            id,
            name: name.into(),
            label: None,
            text_mesh: None,
            mesh: None,
            timer: None,
        });
        id
    }

    /// Spawns an entity showing `label` through a freshly built static mesh.
    pub fn spawn_label(&mut self, name: impl Into<String>, label: TextLabel) -> EntityId {
        let id = self.spawn(name);
        if let Some(entity) = self.get_mut(id) {
            entity.label = Some(label);
            entity.refresh_text_mesh();
        }
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let before = self.entities.len();
        self.entities.retain(|entity| entity.id != id);
        self.entities.len() != before
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

/// Ticks every active timer by `dt` seconds and destroys entities whose
/// timer reached zero. Returns the destroyed ids in storage order.
pub fn run_timers(world: &mut World, dt: f64) -> Vec<EntityId> {
    let mut expired = Vec::new();
    for entity in &mut world.entities {
        let Some(timer) = entity.timer.as_mut() else {
            continue;
        };
        if timer.active {
            timer.remaining_seconds -= dt;
        }
        if timer.remaining_seconds <= 0.0 {
            expired.push(entity.id);
        }
    }
    if !expired.is_empty() {
        world
            .entities
            .retain(|entity| !expired.contains(&entity.id));
        debug!(count = expired.len(), "timer_entities_destroyed");
    }
    expired
}
