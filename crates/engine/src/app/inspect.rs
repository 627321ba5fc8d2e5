use super::world::{Entity, MeshInstance, TextLabel, Timer};
use crate::text::TextMesh;

/// One-line debug description of a component.
pub trait Inspect {
    const NAME: &'static str;

    fn describe(&self) -> String;
}

impl Inspect for TextLabel {
    const NAME: &'static str = "TextLabel";

    fn describe(&self) -> String {
        format!(
            "text={:?} size={} at ({:.1}, {:.1}) font={}",
            self.text,
            self.font_size,
            self.position[0],
            self.position[1],
            if self.font.is_loaded() { "loaded" } else { "missing" }
        )
    }
}

impl Inspect for TextMesh {
    const NAME: &'static str = "TextMesh";

    fn describe(&self) -> String {
        let report = self.report();
        format!(
            "{:?} quads={} vertices={} indices={} missing={} truncated={}",
            self.mode(),
            report.quads,
            self.vertices().len(),
            self.indices().len(),
            report.missing_glyphs,
            report.truncated
        )
    }
}

impl Inspect for MeshInstance {
    const NAME: &'static str = "MeshInstance";

    fn describe(&self) -> String {
        match self.mesh.get() {
            Some(mesh) => format!(
                "triangles={} at ({:.1}, {:.1}) scale={}",
                mesh.triangle_count(),
                self.position[0],
                self.position[1],
                self.scale
            ),
            None => "mesh not loaded".to_string(),
        }
    }
}

impl Inspect for Timer {
    const NAME: &'static str = "Timer";

    fn describe(&self) -> String {
        format!(
            "{} remaining={:.2}s",
            if self.active { "running" } else { "paused" },
            self.remaining_seconds
        )
    }
}

pub struct ComponentInspector {
    pub name: &'static str,
    pub inspect: fn(&Entity) -> Option<String>,
}

fn inspect_component<C: Inspect>(component: Option<&C>) -> Option<String> {
    component.map(C::describe)
}

fn inspect_label(entity: &Entity) -> Option<String> {
    inspect_component(entity.label.as_ref())
}

fn inspect_text_mesh(entity: &Entity) -> Option<String> {
    inspect_component(entity.text_mesh.as_ref())
}

fn inspect_mesh(entity: &Entity) -> Option<String> {
    inspect_component(entity.mesh.as_ref())
}

fn inspect_timer(entity: &Entity) -> Option<String> {
    inspect_component(entity.timer.as_ref())
}

/// Every inspectable component, in display order.
pub static COMPONENT_INSPECTORS: &[ComponentInspector] = &[
    ComponentInspector {
        name: TextLabel::NAME,
        inspect: inspect_label,
    },
    ComponentInspector {
        name: TextMesh::NAME,
        inspect: inspect_text_mesh,
    },
    ComponentInspector {
        name: MeshInstance::NAME,
        inspect: inspect_mesh,
    },
    ComponentInspector {
        name: Timer::NAME,
        inspect: inspect_timer,
    },
];

/// Header line followed by one line per present component.
pub fn describe_entity(entity: &Entity) -> Vec<String> {
    let mut lines = vec![format!("entity {} '{}'", entity.id.0, entity.name)];
    for inspector in COMPONENT_INSPECTORS {
        if let Some(description) = (inspector.inspect)(entity) {
            lines.push(format!("  {}: {description}", inspector.name));
        }
    }
    lines
}
