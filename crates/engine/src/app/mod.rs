mod engine;
mod events;
mod input;
mod inspect;
mod loop_runner;
mod metrics;
mod rendering;
mod settings;
mod tools;
mod world;

pub use engine::{Engine, TEXT_SHADER};
pub use events::{EngineEvent, EventQueue, GameState};
pub use input::{InputSnapshot, Key};
pub use inspect::{describe_entity, ComponentInspector, Inspect, COMPONENT_INSPECTORS};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    clear_frame, draw_mesh, draw_text_mesh, draw_world, supports_text_shader, DrawStats,
    Projection, Renderer, Viewport, TEXT_SHADER_UNIFORMS,
};
pub use settings::{RenderSettings, RunHandle, SettingsHandle};
pub use tools::{
    parse_command_line, register_builtin_commands, Command, CommandError, CommandLine,
    CommandOutput, CommandRegistry, ConsoleMessage, ConsoleState, DispatchOutcome, MessageLevel,
    COMMAND_SIGIL, DEFAULT_CONSOLE_FONT_SIZE, HISTORY_CAPACITY, HISTORY_HIDE_SECONDS,
};
pub use world::{run_timers, Entity, EntityId, MeshInstance, TextLabel, Timer, World};
