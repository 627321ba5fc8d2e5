use tracing::{debug, info, warn};

use crate::resources::{Font, Handle, ResourceManager, Shader};

use super::events::{EngineEvent, EventQueue, GameState};
use super::input::{InputSnapshot, Key};
use super::inspect::describe_entity;
use super::rendering::{supports_text_shader, Projection};
use super::settings::{RenderSettings, RunHandle, SettingsHandle};
use super::tools::{
    register_builtin_commands, CommandRegistry, ConsoleMessage, ConsoleState, MessageLevel,
    COMMAND_SIGIL,
};
use super::world::{run_timers, EntityId, TextLabel, World};

pub const TEXT_SHADER: &str = "msdf_text";

/// Everything one running engine owns. Collaborators are passed explicitly;
/// nothing here is global.
pub struct Engine {
    resources: ResourceManager,
    commands: CommandRegistry,
    events: EventQueue<EngineEvent>,
    world: World,
    console: ConsoleState,
    settings: SettingsHandle,
    run: RunHandle,
    game_state: GameState,
    projection: Projection,
    text_shader: Handle<Shader>,
}

impl Engine {
    /// Loads the console font and text shader through `resources`. Either may
    /// come back empty; text drawing is then skipped.
    pub fn new(
        mut resources: ResourceManager,
        console_font: &str,
        console_font_size: f32,
        window_size: (u32, u32),
        settings: RenderSettings,
    ) -> Self {
        let font = resources.load::<Font>(console_font, ());
        let text_shader = resources.load::<Shader>(TEXT_SHADER, ());
        Self::with_console_font(
            resources,
            font,
            text_shader,
            console_font_size,
            window_size,
            settings,
        )
    }

    pub fn with_console_font(
        resources: ResourceManager,
        font: Handle<Font>,
        text_shader: Handle<Shader>,
        console_font_size: f32,
        window_size: (u32, u32),
        settings: RenderSettings,
    ) -> Self {
        let settings = SettingsHandle::new(settings);
        let run = RunHandle::default();
        let mut commands = CommandRegistry::new();
        register_builtin_commands(&mut commands, &settings, &run);

        let mut world = World::new();
        let mut console = ConsoleState::new(font, console_font_size, window_size);
        console.init(&mut world);

        info!(
            commands = commands.len(),
            console_font_loaded = console.font().is_loaded(),
            text_shader_loaded = text_shader.is_loaded(),
            "engine_initialized"
        );
        if let Some(shader) = text_shader.get().filter(|shader| !supports_text_shader(shader)) {
            warn!(shader = shader.name(), "text_shader_interface_mismatch");
        }

        Self {
            resources,
            commands,
            events: EventQueue::new(),
            world,
            console,
            settings,
            run,
            game_state: GameState::InGame,
            projection: Projection::new(window_size.0, window_size.1),
            text_shader,
        }
    }

    /// One frame of input handling: deliver queued events, react to the
    /// console hotkeys, then let the console consume input.
    pub fn update(&mut self, input: &InputSnapshot) {
        self.flush_events();
        self.user_control(input);
        self.console
            .update(input, &self.commands, &mut self.world, &mut self.events);
    }

    /// Advances timers by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let destroyed = run_timers(&mut self.world, dt);
        for id in destroyed {
            self.console.forget_entity(id);
        }
    }

    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    /// Queues a resize; the projection and console follow at the next flush.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.events.push(EngineEvent::Resized { width, height });
    }

    pub fn post_message(&mut self, level: MessageLevel, text: impl Into<String>) {
        self.events
            .push(EngineEvent::ConsoleMessage(ConsoleMessage::new(level, text)));
    }

    /// Spawns a static text label, loading `font_name` through the cache.
    pub fn spawn_text(
        &mut self,
        name: &str,
        text: &str,
        font_name: &str,
        font_size: f32,
        position: [f32; 2],
        color: [f32; 4],
    ) -> EntityId {
        let font = self.resources.get_or_load::<Font>(font_name, ());
        self.world.spawn_label(
            name,
            TextLabel {
                text: text.to_string(),
                font,
                font_size,
                position,
                color,
            },
        )
    }

    pub fn flush_events(&mut self) {
        for event in self.events.take_pending() {
            self.handle_event(event);
        }
    }

    fn user_control(&mut self, input: &InputSnapshot) {
        match self.game_state {
            GameState::InGame => {
                let opener = input.is_pressed(Key::Semicolon)
                    || input.is_pressed(Key::Slash)
                    || input.text().contains(COMMAND_SIGIL);
                if opener {
                    self.events
                        .push(EngineEvent::GameStateChanged(GameState::Console));
                }
            }
            GameState::Console => {
                if input.is_pressed(Key::Escape) {
                    self.events
                        .push(EngineEvent::GameStateChanged(GameState::InGame));
                }
            }
        }
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::GameStateChanged(state) => {
                if state == self.game_state {
                    return;
                }
                self.game_state = state;
                self.console.on_game_state_changed(state, &mut self.world);
                info!(state = ?state, "game_state_changed");
            }
            EngineEvent::Resized { width, height } => {
                self.projection.resize(width, height);
                self.console.on_resize(width, height, &mut self.world);
                debug!(width, height, "viewport_resized");
            }
            EngineEvent::ConsoleMessage(message) => {
                self.console.push_message(&message, &mut self.world);
            }
            EngineEvent::InspectEntity(id) => {
                let lines = self.world.get(id).map(describe_entity);
                match lines {
                    Some(lines) => {
                        for line in lines {
                            self.console
                                .push_message(&ConsoleMessage::plain(line), &mut self.world);
                        }
                    }
                    None => self.console.push_message(
                        &ConsoleMessage::new(MessageLevel::Warning, format!("no entity {}", id.0)),
                        &mut self.world,
                    ),
                }
            }
            EngineEvent::ListEntities => {
                let lines: Vec<String> = self
                    .world
                    .entities()
                    .iter()
                    .map(|entity| format!("{} {}", entity.id.0, entity.name))
                    .collect();
                for line in lines {
                    self.console
                        .push_message(&ConsoleMessage::plain(line), &mut self.world);
                }
            }
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Register project commands here; re-registering a name replaces it.
    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    pub fn console(&self) -> &ConsoleState {
        &self.console
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn run_handle(&self) -> &RunHandle {
        &self.run
    }

    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// False until a text shader with the raster's uniforms compiled.
    /// Labels whose font failed to load are skipped individually at draw
    /// time.
    pub fn text_enabled(&self) -> bool {
        self.text_shader.get().is_some_and(supports_text_shader)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::app::world::Timer;
    use crate::text::test_fonts::ascii_font;

    fn engine() -> Engine {
        Engine::with_console_font(
            ResourceManager::new("."),
            Handle::new(ascii_font()),
            Handle::empty(),
            10.0,
            (640, 360),
            RenderSettings::default(),
        )
    }

    fn submit(engine: &mut Engine, line: &str) {
        engine.update(&InputSnapshot::empty().with_text("$"));
        engine.update(&InputSnapshot::empty().with_text(line));
        engine.update(&InputSnapshot::empty().with_key_pressed(Key::Enter));
        engine.flush_events();
    }

    fn history(engine: &Engine) -> Vec<String> {
        engine.console().history().map(str::to_string).collect()
    }

    #[test]
    fn opener_activates_console_on_next_frame() {
        let mut engine = engine();
        engine.update(&InputSnapshot::empty().with_text("$"));
        assert_eq!(engine.game_state(), GameState::InGame);
        assert!(engine.console().buffer().is_empty());

        engine.update(&InputSnapshot::empty().with_text("ec"));
        assert_eq!(engine.game_state(), GameState::Console);
        assert_eq!(engine.console().buffer(), "ec");

        engine.update(&InputSnapshot::empty().with_key_pressed(Key::Escape));
        engine.flush_events();
        assert_eq!(engine.game_state(), GameState::InGame);
        assert!(engine.console().buffer().is_empty());
    }

    #[test]
    fn slash_and_semicolon_open_console() {
        for key in [Key::Slash, Key::Semicolon] {
            let mut engine = engine();
            engine.update(&InputSnapshot::empty().with_key_pressed(key));
            engine.flush_events();
            assert_eq!(engine.game_state(), GameState::Console);
            assert!(engine.console().is_active());
        }
    }

    #[test]
    fn inspect_reports_entity_or_warns() {
        let mut engine = engine();
        let id = engine.world_mut().spawn("crate");
        if let Some(entity) = engine.world_mut().get_mut(id) {
            entity.timer = Some(Timer::new(5.0, false));
        }

        submit(&mut engine, &format!("$inspect {}", id.0));
        let lines = history(&engine);
        assert_eq!(lines[0], "  Timer: paused remaining=5.00s");
        assert_eq!(lines[1], format!("entity {} 'crate'", id.0));

        submit(&mut engine, "$inspect 999");
        assert_eq!(history(&engine)[0], "[WARNING] no entity 999");
    }

    #[test]
    fn entities_lists_every_entity() {
        let mut engine = engine();
        engine.world_mut().spawn("alpha");
        submit(&mut engine, "$entities");

        let lines = history(&engine);
        assert!(lines.iter().any(|line| line.ends_with(" alpha")));
        assert!(lines.iter().any(|line| line.ends_with(" console_input")));
    }

    #[test]
    fn resize_updates_projection_after_flush() {
        let mut engine = engine();
        engine.resize(800, 600);
        assert_eq!(engine.projection().viewport().width, 640);

        engine.flush_events();
        assert_eq!(engine.projection().viewport().width, 800);
        assert_eq!(engine.projection().viewport().height, 600);
    }

    #[test]
    fn posted_messages_reach_history() {
        let mut engine = engine();
        engine.post_message(MessageLevel::Error, "disk full");
        engine.flush_events();
        assert_eq!(history(&engine), vec!["[ERROR] disk full".to_string()]);
    }

    #[test]
    fn history_overlay_expires_after_console_closes() {
        let mut engine = engine();
        submit(&mut engine, "$echo hi");
        let overlay = engine.console().history_entity().expect("history entity");
        assert!(engine.world().contains(overlay));

        engine.tick(1.0);
        assert!(engine.world().contains(overlay));
        engine.tick(2.5);
        assert!(!engine.world().contains(overlay));
        assert_eq!(engine.console().history_entity(), None);
    }

    #[test]
    fn exit_command_clears_run_handle() {
        let mut engine = engine();
        assert!(engine.run_handle().is_running());
        submit(&mut engine, "$exit");
        assert!(!engine.run_handle().is_running());
    }

    #[test]
    fn spawn_text_shares_cached_font() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("fonts")).expect("fonts dir");
        let mut engine = Engine::new(
            ResourceManager::new(temp.path()),
            "missing",
            12.0,
            (320, 200),
            RenderSettings::default(),
        );
        assert!(!engine.text_enabled());

        let first = engine.spawn_text("a", "hello", "missing", 12.0, [0.0, 0.0], [1.0; 4]);
        let second = engine.spawn_text("b", "world", "missing", 12.0, [0.0, 20.0], [1.0; 4]);

        assert_ne!(first, second);
        assert_eq!(engine.resources().cached_count::<Font>(), 1);
        let label = engine
            .world()
            .get(first)
            .and_then(|entity| entity.label.as_ref())
            .expect("label");
        assert!(label.font.is_empty());
        assert!(engine.world().get(first).and_then(|e| e.text_mesh.as_ref()).is_none());
    }
}
