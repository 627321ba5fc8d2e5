use tracing::info;
use ui_engine::{Command, CommandError, Engine, Mesh, MeshInstance, MessageLevel};

const TITLE_COLOR: [f32; 4] = [0.95, 0.95, 0.9, 1.0];
const HINT_COLOR: [f32; 4] = [0.6, 0.65, 0.7, 1.0];
const QUAD_COLOR: [f32; 4] = [0.25, 0.45, 0.8, 1.0];
const QUAD_MODEL: &str = "quad";

/// Fills a fresh engine with the sandbox scene and project commands.
pub(crate) fn populate(engine: &mut Engine, font: &str) {
    engine.spawn_text("title", "UI Engine Sandbox", font, 36.0, [20.0, 80.0], TITLE_COLOR);
    engine.spawn_text(
        "hint",
        "press $ or / to open the console\n$help lists commands",
        font,
        18.0,
        [20.0, 50.0],
        HINT_COLOR,
    );

    let mesh = engine.resources_mut().load::<Mesh>(QUAD_MODEL, QUAD_COLOR);
    if mesh.is_loaded() {
        let id = engine.world_mut().spawn("quad");
        if let Some(entity) = engine.world_mut().get_mut(id) {
            entity.mesh = Some(MeshInstance {
                mesh,
                position: [420.0, 200.0],
                scale: 120.0,
            });
        }
    }

    engine.commands_mut().register(Command::new(
        "version",
        "",
        "Print the sandbox version",
        |args, out| {
            if !args.is_empty() {
                return Err(CommandError::Arity {
                    expected: "no arguments",
                    actual: args.len(),
                });
            }
            out.push(
                MessageLevel::Info,
                format!("sandbox {}", env!("CARGO_PKG_VERSION")),
            );
            Ok(())
        },
    ));

    info!(entity_count = engine.world().len(), "demo_scene_populated");
}
