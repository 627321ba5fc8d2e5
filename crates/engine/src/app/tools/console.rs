use std::collections::VecDeque;

use tracing::{debug, info};

use crate::app::events::{EngineEvent, EventQueue, GameState};
use crate::app::input::{InputSnapshot, Key};
use crate::app::world::{EntityId, TextLabel, Timer, World};
use crate::resources::{Font, Handle};
use crate::text::{TextMesh, LINE_CAPACITY};

use super::console_commands::{CommandOutput, CommandRegistry, DispatchOutcome};
use super::messages::ConsoleMessage;

pub const HISTORY_CAPACITY: usize = 20;
pub const HISTORY_HIDE_SECONDS: f64 = 3.0;
pub const DEFAULT_CONSOLE_FONT_SIZE: f32 = 20.0;

/// Every history line fits, so the overlay never truncates.
const HISTORY_OVERLAY_CAPACITY: usize = HISTORY_CAPACITY * LINE_CAPACITY;

const PROMPT: &str = "> ";
const MARGIN_PX: f32 = 10.0;
const INPUT_TEXT_COLOR: [f32; 4] = [0.82, 0.9, 0.82, 1.0];
const HISTORY_TEXT_COLOR: [f32; 4] = [0.7, 0.75, 0.7, 1.0];

/// Developer console: an input line plus a history overlay that hides
/// itself a few seconds after the console closes.
#[derive(Debug)]
pub struct ConsoleState {
    active: bool,
    buffer: String,
    /// Newest first.
    history: VecDeque<String>,
    font: Handle<Font>,
    font_size: f32,
    window_size: (u32, u32),
    input_entity: Option<EntityId>,
    history_entity: Option<EntityId>,
}

impl ConsoleState {
    pub fn new(font: Handle<Font>, font_size: f32, window_size: (u32, u32)) -> Self {
        Self {
            active: false,
            buffer: String::new(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            font,
            font_size,
            window_size,
            input_entity: None,
            history_entity: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// History lines, newest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn input_entity(&self) -> Option<EntityId> {
        self.input_entity
    }

    pub fn history_entity(&self) -> Option<EntityId> {
        self.history_entity
    }

    pub fn font(&self) -> &Handle<Font> {
        &self.font
    }

    /// Drops a stale reference after `id` was destroyed elsewhere.
    pub fn forget_entity(&mut self, id: EntityId) {
        if self.history_entity == Some(id) {
            self.history_entity = None;
        }
        if self.input_entity == Some(id) {
            self.input_entity = None;
        }
    }

    /// Spawns the input line entity. Called once before the first frame.
    pub fn init(&mut self, world: &mut World) {
        let position = self.input_origin();
        let id = world.spawn("console_input");
        if let Some(entity) = world.get_mut(id) {
            entity.label = Some(TextLabel {
                text: String::new(),
                font: self.font.clone(),
                font_size: self.font_size,
                position,
                color: INPUT_TEXT_COLOR,
            });
            entity.text_mesh = Some(TextMesh::dynamic(
                LINE_CAPACITY,
                position[0],
                position[1],
                self.font_size,
            ));
            entity.refresh_text_mesh();
        }
        self.input_entity = Some(id);
    }

    pub fn on_game_state_changed(&mut self, state: GameState, world: &mut World) {
        let active = state == GameState::Console;
        if active == self.active {
            return;
        }
        self.active = active;
        debug!(active, "console_state_changed");

        if active {
            let history_id = self.ensure_history_entity(world);
            restart_timer(world, history_id, false);
        } else {
            self.buffer.clear();
            if let Some(history_id) = self.history_entity.filter(|id| world.contains(*id)) {
                restart_timer(world, history_id, true);
            }
        }
        self.refresh_input(world);
    }

    pub fn on_resize(&mut self, width: u32, height: u32, world: &mut World) {
        self.window_size = (width, height);
        let anchors = [
            (self.input_entity, self.input_origin()),
            (self.history_entity, self.history_origin()),
        ];
        for (id, origin) in anchors {
            let Some(entity) = id.and_then(|id| world.get_mut(id)) else {
                continue;
            };
            if let Some(label) = entity.label.as_mut() {
                label.position = origin;
            }
            entity.refresh_text_mesh();
        }
    }

    /// Records a leveled message in the history.
    pub fn push_message(&mut self, message: &ConsoleMessage, world: &mut World) {
        self.record(message.to_string());
        self.history_changed(world);
    }

    pub fn clear_history(&mut self, world: &mut World) {
        self.history.clear();
        self.history_changed(world);
    }

    /// Consumes this frame's keyboard input while the console is open.
    pub fn update(
        &mut self,
        input: &InputSnapshot,
        commands: &CommandRegistry,
        world: &mut World,
        events: &mut EventQueue<EngineEvent>,
    ) {
        if !self.active {
            return;
        }

        let before = self.buffer.len();
        let max_chars = LINE_CAPACITY - PROMPT.chars().count();
        let mut chars = self.buffer.chars().count();
        for ch in input.text().chars() {
            if ch.is_control() {
                continue;
            }
            if chars >= max_chars {
                break;
            }
            self.buffer.push(ch);
            chars += 1;
        }
        let mut changed = self.buffer.len() != before;
        if input.is_pressed(Key::Backspace) && self.buffer.pop().is_some() {
            changed = true;
        }

        if input.is_pressed(Key::Enter) {
            if !self.buffer.is_empty() {
                let line = std::mem::take(&mut self.buffer);
                self.submit(&line, commands, world, events);
            }
            events.push(EngineEvent::GameStateChanged(GameState::InGame));
            changed = true;
        } else if input.is_pressed(Key::Escape) {
            self.buffer.clear();
            events.push(EngineEvent::GameStateChanged(GameState::InGame));
            changed = true;
        }

        if changed {
            self.refresh_input(world);
        }
    }

    fn submit(
        &mut self,
        line: &str,
        commands: &CommandRegistry,
        world: &mut World,
        events: &mut EventQueue<EngineEvent>,
    ) {
        let mut output = CommandOutput::default();
        let outcome = commands.dispatch(line, &mut output);
        info!(line, outcome = ?outcome, "console_line_submitted");

        self.record(line.to_string());
        let (messages, command_events, clear_history) = output.into_parts();
        for message in &messages {
            self.record(message.to_string());
        }
        if clear_history && outcome == DispatchOutcome::Executed {
            self.history.clear();
        }
        events.extend(command_events);
        self.history_changed(world);
    }

    fn record(&mut self, mut line: String) {
        if let Some((cut, _)) = line.char_indices().nth(LINE_CAPACITY) {
            line.truncate(cut);
        }
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_back();
        }
        self.history.push_front(line);
    }

    fn history_text(&self) -> String {
        let mut text = String::new();
        for line in &self.history {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    fn history_changed(&mut self, world: &mut World) {
        let id = self.ensure_history_entity(world);
        let text = self.history_text();
        if let Some(entity) = world.get_mut(id) {
            if let Some(label) = entity.label.as_mut() {
                label.text = text;
            }
            entity.refresh_text_mesh();
        }
        restart_timer(world, id, !self.active);
    }

    fn ensure_history_entity(&mut self, world: &mut World) -> EntityId {
        if let Some(id) = self.history_entity.filter(|id| world.contains(*id)) {
            return id;
        }

        let position = self.history_origin();
        let id = world.spawn("console_history");
        if let Some(entity) = world.get_mut(id) {
            entity.label = Some(TextLabel {
                text: self.history_text(),
                font: self.font.clone(),
                font_size: self.font_size,
                position,
                color: HISTORY_TEXT_COLOR,
            });
            entity.text_mesh = Some(TextMesh::dynamic(
                HISTORY_OVERLAY_CAPACITY,
                position[0],
                position[1],
                self.font_size,
            ));
            entity.timer = Some(Timer::new(HISTORY_HIDE_SECONDS, !self.active));
            entity.refresh_text_mesh();
        }
        self.history_entity = Some(id);
        id
    }

    fn refresh_input(&mut self, world: &mut World) {
        let text = if self.active {
            format!("{PROMPT}{}", self.buffer)
        } else {
            String::new()
        };
        let Some(entity) = self.input_entity.and_then(|id| world.get_mut(id)) else {
            return;
        };
        if let Some(label) = entity.label.as_mut() {
            label.text = text;
        }
        entity.refresh_text_mesh();
    }

    /// Baseline of the input line, one line below the window's top edge.
    fn input_origin(&self) -> [f32; 2] {
        [MARGIN_PX, self.window_size.1 as f32 - MARGIN_PX - self.font_size]
    }

    fn history_origin(&self) -> [f32; 2] {
        [
            MARGIN_PX,
            self.window_size.1 as f32 - MARGIN_PX - 2.0 * self.font_size,
        ]
    }
}

fn restart_timer(world: &mut World, id: EntityId, active: bool) {
    if let Some(timer) = world.get_mut(id).and_then(|entity| entity.timer.as_mut()) {
        timer.restart(HISTORY_HIDE_SECONDS, active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::settings::{RunHandle, SettingsHandle};
    use crate::app::tools::console_commands::register_builtin_commands;
    use crate::app::tools::messages::MessageLevel;
    use crate::app::world::run_timers;
    use crate::text::test_fonts::ascii_font;

    struct Harness {
        console: ConsoleState,
        commands: CommandRegistry,
        world: World,
        events: EventQueue<EngineEvent>,
        settings: SettingsHandle,
    }

    impl Harness {
        fn new() -> Self {
            let settings = SettingsHandle::default();
            let mut commands = CommandRegistry::new();
            register_builtin_commands(&mut commands, &settings, &RunHandle::default());
            let mut world = World::new();
            let mut console = ConsoleState::new(Handle::new(ascii_font()), 10.0, (640, 360));
            console.init(&mut world);
            Self {
                console,
                commands,
                world,
                events: EventQueue::new(),
                settings,
            }
        }

        fn open(&mut self) {
            self.console
                .on_game_state_changed(GameState::Console, &mut self.world);
        }

        fn frame(&mut self, input: InputSnapshot) {
            self.console
                .update(&input, &self.commands, &mut self.world, &mut self.events);
        }

        fn type_and_submit(&mut self, line: &str) {
            self.frame(InputSnapshot::empty().with_text(line));
            self.frame(InputSnapshot::empty().with_key_pressed(Key::Enter));
        }

        fn input_text(&self) -> String {
            self.console
                .input_entity()
                .and_then(|id| self.world.get(id))
                .and_then(|entity| entity.label.as_ref())
                .map(|label| label.text.clone())
                .unwrap_or_default()
        }

        fn history(&self) -> Vec<String> {
            self.console.history().map(str::to_string).collect()
        }
    }

    #[test]
    fn input_is_ignored_while_inactive() {
        let mut harness = Harness::new();
        harness.frame(InputSnapshot::empty().with_text("abc"));

        assert_eq!(harness.console.buffer(), "");
        assert!(harness.events.is_empty());
    }

    #[test]
    fn typing_appends_and_skips_control_characters() {
        let mut harness = Harness::new();
        harness.open();

        harness.frame(InputSnapshot::empty().with_text("ab\r\tc"));

        assert_eq!(harness.console.buffer(), "abc");
        assert_eq!(harness.input_text(), "> abc");
    }

    #[test]
    fn backspace_removes_one_multi_byte_code_point() {
        let mut harness = Harness::new();
        harness.open();
        harness.frame(InputSnapshot::empty().with_text("a\u{20ac}"));
        assert_eq!(harness.console.buffer().len(), 4);

        harness.frame(InputSnapshot::empty().with_key_pressed(Key::Backspace));

        assert_eq!(harness.console.buffer(), "a");
    }

    #[test]
    fn backspace_on_empty_buffer_is_a_no_op() {
        let mut harness = Harness::new();
        harness.open();
        harness.frame(InputSnapshot::empty().with_key_pressed(Key::Backspace));
        assert_eq!(harness.console.buffer(), "");
        assert_eq!(harness.input_text(), "> ");
    }

    #[test]
    fn input_is_capped_to_line_capacity() {
        let mut harness = Harness::new();
        harness.open();
        harness.frame(InputSnapshot::empty().with_text("x".repeat(LINE_CAPACITY + 10)));

        assert_eq!(
            harness.console.buffer().chars().count(),
            LINE_CAPACITY - PROMPT.len()
        );
    }

    #[test]
    fn enter_submits_records_raw_line_and_returns_to_game() {
        let mut harness = Harness::new();
        harness.open();

        harness.type_and_submit("$echo hi");

        assert_eq!(harness.history(), vec!["hi", "$echo hi"]);
        assert_eq!(harness.console.buffer(), "");
        assert_eq!(
            harness.events.take_pending(),
            vec![EngineEvent::GameStateChanged(GameState::InGame)]
        );
    }

    #[test]
    fn enter_on_empty_buffer_only_requests_game_state() {
        let mut harness = Harness::new();
        harness.open();

        harness.frame(InputSnapshot::empty().with_key_pressed(Key::Enter));

        assert!(harness.history().is_empty());
        assert_eq!(
            harness.events.take_pending(),
            vec![EngineEvent::GameStateChanged(GameState::InGame)]
        );
    }

    #[test]
    fn escape_discards_buffer_without_history() {
        let mut harness = Harness::new();
        harness.open();
        harness.frame(InputSnapshot::empty().with_text("$exit"));

        harness.frame(InputSnapshot::empty().with_key_pressed(Key::Escape));

        assert_eq!(harness.console.buffer(), "");
        assert!(harness.history().is_empty());
        assert_eq!(
            harness.events.take_pending(),
            vec![EngineEvent::GameStateChanged(GameState::InGame)]
        );
    }

    #[test]
    fn unknown_command_is_recorded_with_warning() {
        let mut harness = Harness::new();
        harness.open();

        harness.type_and_submit("$frobnicate");

        assert_eq!(
            harness.history(),
            vec![
                "[WARNING] unknown command 'frobnicate', try $help",
                "$frobnicate"
            ]
        );
    }

    #[test]
    fn rejected_fullscreen_records_help_and_keeps_state() {
        let mut harness = Harness::new();
        harness.open();

        harness.type_and_submit("$fullscreen 2");

        assert!(!harness.settings.snapshot().fullscreen);
        assert!(harness
            .history()
            .contains(&"[ERROR] $fullscreen <0|1> - Leave or enter fullscreen".to_string()));
    }

    #[test]
    fn clear_command_empties_history() {
        let mut harness = Harness::new();
        harness.open();
        harness.type_and_submit("$echo one");
        harness.open();

        harness.type_and_submit("$clear");

        assert!(harness.history().is_empty());
    }

    #[test]
    fn history_is_bounded_and_drops_oldest() {
        let mut harness = Harness::new();
        for index in 0..(HISTORY_CAPACITY + 5) {
            harness.console.push_message(
                &ConsoleMessage::new(MessageLevel::Info, format!("m{index}")),
                &mut harness.world,
            );
        }

        let history = harness.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0], format!("[INFO] m{}", HISTORY_CAPACITY + 4));
        assert_eq!(history[HISTORY_CAPACITY - 1], "[INFO] m5");
    }

    #[test]
    fn full_history_of_long_lines_is_drawn_without_truncation() {
        let mut harness = Harness::new();
        for index in 0..HISTORY_CAPACITY {
            let text = format!("{index:02}{}", "w".repeat(LINE_CAPACITY * 2));
            harness
                .console
                .push_message(&ConsoleMessage::plain(text), &mut harness.world);
        }

        let history = harness.history();
        assert!(history.iter().all(|line| line.chars().count() == LINE_CAPACITY));
        let mesh = harness
            .console
            .history_entity()
            .and_then(|id| harness.world.get(id))
            .and_then(|entity| entity.text_mesh.as_ref())
            .expect("history mesh");
        let report = mesh.report();
        assert!(!report.truncated);
        assert_eq!(report.quads, HISTORY_CAPACITY * LINE_CAPACITY);
    }

    #[test]
    fn history_overlay_hides_after_timeout_only_while_closed() {
        let mut harness = Harness::new();
        harness.open();
        harness.type_and_submit("$echo hi");
        let history_id = harness.console.history_entity().expect("history entity");

        // Still open: the timer is paused.
        assert!(run_timers(&mut harness.world, 10.0).is_empty());

        harness
            .console
            .on_game_state_changed(GameState::InGame, &mut harness.world);
        assert!(run_timers(&mut harness.world, 2.0).is_empty());
        assert_eq!(
            run_timers(&mut harness.world, 1.5),
            vec![history_id]
        );
        assert!(!harness.world.contains(history_id));

        harness.open();
        let recreated = harness.console.history_entity().expect("recreated");
        assert_ne!(recreated, history_id);
        assert!(harness.world.contains(recreated));
    }

    #[test]
    fn history_change_restarts_countdown() {
        let mut harness = Harness::new();
        harness.console.push_message(&ConsoleMessage::plain("first"), &mut harness.world);
        assert!(run_timers(&mut harness.world, 2.5).is_empty());

        harness.console.push_message(&ConsoleMessage::plain("second"), &mut harness.world);
        assert!(run_timers(&mut harness.world, 2.5).is_empty());
        assert_eq!(run_timers(&mut harness.world, 1.0).len(), 1);
    }

    #[test]
    fn resize_reanchors_text_to_top_left() {
        let mut harness = Harness::new();
        harness.open();
        harness.console.push_message(&ConsoleMessage::plain("x"), &mut harness.world);

        harness.console.on_resize(800, 600, &mut harness.world);

        let input = harness
            .console
            .input_entity()
            .and_then(|id| harness.world.get(id))
            .expect("input");
        let mesh = input.text_mesh.as_ref().expect("input mesh");
        assert_eq!(mesh.origin(), [MARGIN_PX, 600.0 - MARGIN_PX - 10.0]);

        let history = harness
            .console
            .history_entity()
            .and_then(|id| harness.world.get(id))
            .expect("history");
        let mesh = history.text_mesh.as_ref().expect("history mesh");
        assert_eq!(mesh.origin(), [MARGIN_PX, 600.0 - MARGIN_PX - 20.0]);
        assert_eq!(mesh.vertices()[0].position[1], 600.0 - MARGIN_PX - 20.0);
    }
}
