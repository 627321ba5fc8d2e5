use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::events::EngineEvent;
use crate::app::settings::{RunHandle, SettingsHandle};
use crate::app::world::EntityId;

use super::messages::{ConsoleMessage, MessageLevel};

pub const COMMAND_SIGIL: char = '$';
const HELP_COMMAND: &str = "help";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("expected {expected}, got {actual} argument(s)")]
    Arity {
        expected: &'static str,
        actual: usize,
    },
    #[error("invalid value '{value}': {reason}")]
    Value { value: String, reason: String },
}

/// Side effects a command hands back to the console.
#[derive(Debug, Default)]
pub struct CommandOutput {
    messages: Vec<ConsoleMessage>,
    events: Vec<EngineEvent>,
    clear_history: bool,
}

impl CommandOutput {
    pub fn push(&mut self, level: MessageLevel, text: impl Into<String>) {
        self.messages.push(ConsoleMessage::new(level, text));
    }

    pub fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn request_clear_history(&mut self) {
        self.clear_history = true;
    }

    pub fn messages(&self) -> &[ConsoleMessage] {
        &self.messages
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn clear_history_requested(&self) -> bool {
        self.clear_history
    }

    pub fn into_parts(self) -> (Vec<ConsoleMessage>, Vec<EngineEvent>, bool) {
        (self.messages, self.events, self.clear_history)
    }

    fn merge(&mut self, other: CommandOutput) {
        self.messages.extend(other.messages);
        self.events.extend(other.events);
        self.clear_history |= other.clear_history;
    }
}

type RunFn = dyn Fn(&[String], &mut CommandOutput) -> Result<(), CommandError> + Send + Sync;

pub struct Command {
    name: String,
    arg_schema: String,
    help: String,
    run: Box<RunFn>,
}

impl Command {
    pub fn new<F>(
        name: impl Into<String>,
        arg_schema: impl Into<String>,
        help: impl Into<String>,
        run: F,
    ) -> Self
    where
        F: Fn(&[String], &mut CommandOutput) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arg_schema: arg_schema.into(),
            help: help.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `$name <args> - help`, as listed by `$help` and reported on misuse.
    pub fn help_line(&self) -> String {
        if self.arg_schema.is_empty() {
            format!("{COMMAND_SIGIL}{} - {}", self.name, self.help)
        } else {
            format!(
                "{COMMAND_SIGIL}{} {} - {}",
                self.name, self.arg_schema, self.help
            )
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arg_schema", &self.arg_schema)
            .finish_non_exhaustive()
    }
}

/// What a console line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Empty,
    /// Text without the command sigil.
    Plain(String),
    Invocation { name: String, args: Vec<String> },
}

/// Splits on spaces (no quoting). A leading `$` marks a command invocation.
pub fn parse_command_line(line: &str) -> CommandLine {
    let mut tokens = line.split(' ').filter(|token| !token.is_empty());
    let Some(first) = tokens.next() else {
        return CommandLine::Empty;
    };
    let Some(name) = first.strip_prefix(COMMAND_SIGIL) else {
        return CommandLine::Plain(line.trim().to_string());
    };
    CommandLine::Invocation {
        name: name.to_string(),
        args: tokens.map(str::to_string).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Empty,
    NotACommand,
    Executed,
    Failed,
    Unknown(String),
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    lookup: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `command`, replacing any command with the same name in its
    /// original slot. `help` is reserved and cannot be registered.
    pub fn register(&mut self, command: Command) {
        if command.name == HELP_COMMAND {
            warn!(command = %command.name, "command_name_reserved");
            return;
        }
        match self.lookup.get(&command.name) {
            Some(index) => {
                debug!(command = %command.name, "command_replaced");
                self.commands[*index] = command;
            }
            None => {
                self.lookup
                    .insert(command.name.clone(), self.commands.len());
                self.commands.push(command);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == HELP_COMMAND || self.lookup.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Registered commands in registration order.
    pub fn help_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.commands.iter().map(Command::help_line)
    }

    /// Runs `name` with `args`. Returns false when no such command exists.
    /// A command that rejects its arguments leaves nothing in `output`
    /// except an error line and its help line.
    pub fn execute(&self, name: &str, args: &[String], output: &mut CommandOutput) -> bool {
        if name == HELP_COMMAND {
            for line in self.help_lines() {
                output.push(MessageLevel::None, line);
            }
            return true;
        }

        let Some(command) = self.lookup.get(name).map(|index| &self.commands[*index]) else {
            return false;
        };

        let mut scratch = CommandOutput::default();
        match (command.run)(args, &mut scratch) {
            Ok(()) => output.merge(scratch),
            Err(error) => {
                debug!(command = name, error = %error, "command_rejected");
                output.push(MessageLevel::Error, format!("{name}: {error}"));
                output.push(MessageLevel::Error, command.help_line());
            }
        }
        true
    }

    /// Parses one console line and executes it when it is an invocation.
    pub fn dispatch(&self, line: &str, output: &mut CommandOutput) -> DispatchOutcome {
        match parse_command_line(line) {
            CommandLine::Empty => DispatchOutcome::Empty,
            CommandLine::Plain(_) => {
                output.push(
                    MessageLevel::Info,
                    format!("commands start with '{COMMAND_SIGIL}', try {COMMAND_SIGIL}help"),
                );
                DispatchOutcome::NotACommand
            }
            CommandLine::Invocation { name, args } => {
                let before = output.messages.len();
                if !self.execute(&name, &args, output) {
                    output.push(
                        MessageLevel::Warning,
                        format!("unknown command '{name}', try {COMMAND_SIGIL}help"),
                    );
                    return DispatchOutcome::Unknown(name);
                }
                let failed = output.messages[before..]
                    .iter()
                    .any(|message| message.level == MessageLevel::Error);
                if failed {
                    DispatchOutcome::Failed
                } else {
                    DispatchOutcome::Executed
                }
            }
        }
    }
}

/// Registers the engine's built-in commands. `help` is answered by the
/// registry itself.
pub fn register_builtin_commands(
    registry: &mut CommandRegistry,
    settings: &SettingsHandle,
    run: &RunHandle,
) {
    let exit_handle = run.clone();
    registry.register(Command::new("exit", "", "Quit the application", move |args, out| {
        require_args(args, 0, "no arguments")?;
        info!("exit_requested");
        exit_handle.request_exit();
        out.push(MessageLevel::Info, "exiting");
        Ok(())
    }));

    let fullscreen_settings = settings.clone();
    registry.register(Command::new(
        "fullscreen",
        "<0|1>",
        "Leave or enter fullscreen",
        move |args, out| {
            require_args(args, 1, "1 argument")?;
            let fullscreen = match args[0].as_str() {
                "0" => false,
                "1" => true,
                other => {
                    return Err(CommandError::Value {
                        value: other.to_string(),
                        reason: "expected 0 or 1".to_string(),
                    })
                }
            };
            fullscreen_settings.set_fullscreen(fullscreen);
            out.push(
                MessageLevel::Info,
                format!("fullscreen {}", if fullscreen { "on" } else { "off" }),
            );
            Ok(())
        },
    ));

    let clear_color_settings = settings.clone();
    registry.register(Command::new(
        "set_clear_color",
        "<r> <g> <b>",
        "Set the background color from floats in [0, 1]",
        move |args, out| {
            require_args(args, 3, "3 arguments")?;
            let mut rgb = [0.0f32; 3];
            for (slot, arg) in rgb.iter_mut().zip(args) {
                *slot = parse_unit_float(arg)?;
            }
            clear_color_settings.set_clear_color(rgb);
            out.push(
                MessageLevel::Info,
                format!("clear color {:.3} {:.3} {:.3}", rgb[0], rgb[1], rgb[2]),
            );
            Ok(())
        },
    ));

    let clear_color_rgb_settings = settings.clone();
    registry.register(Command::new(
        "set_clear_color_rgb",
        "<r> <g> <b>",
        "Set the background color from integers in [0, 255]",
        move |args, out| {
            require_args(args, 3, "3 arguments")?;
            let mut bytes = [0u8; 3];
            for (slot, arg) in bytes.iter_mut().zip(args) {
                *slot = arg.parse::<u8>().map_err(|_| CommandError::Value {
                    value: arg.clone(),
                    reason: "expected an integer in [0, 255]".to_string(),
                })?;
            }
            clear_color_rgb_settings.set_clear_color(bytes.map(|byte| byte as f32 / 255.0));
            out.push(
                MessageLevel::Info,
                format!("clear color {} {} {}", bytes[0], bytes[1], bytes[2]),
            );
            Ok(())
        },
    ));

    registry.register(Command::new("clear", "", "Clear console history", |args, out| {
        require_args(args, 0, "no arguments")?;
        out.request_clear_history();
        Ok(())
    }));

    registry.register(Command::new("echo", "<text...>", "Print text", |args, out| {
        if args.is_empty() {
            return Err(CommandError::Arity {
                expected: "at least 1 argument",
                actual: 0,
            });
        }
        out.push(MessageLevel::None, args.join(" "));
        Ok(())
    }));

    registry.register(Command::new(
        "inspect",
        "<entity_id>",
        "Describe an entity's components",
        |args, out| {
            require_args(args, 1, "1 argument")?;
            let id = args[0].parse::<u64>().map_err(|_| CommandError::Value {
                value: args[0].clone(),
                reason: "expected an entity id".to_string(),
            })?;
            out.emit(EngineEvent::InspectEntity(EntityId(id)));
            Ok(())
        },
    ));

    registry.register(Command::new("entities", "", "List live entities", |args, out| {
        require_args(args, 0, "no arguments")?;
        out.emit(EngineEvent::ListEntities);
        Ok(())
    }));
}

fn require_args(args: &[String], count: usize, expected: &'static str) -> Result<(), CommandError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(CommandError::Arity {
            expected,
            actual: args.len(),
        })
    }
}

fn parse_unit_float(arg: &str) -> Result<f32, CommandError> {
    match arg.parse::<f32>() {
        Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
        _ => Err(CommandError::Value {
            value: arg.to_string(),
            reason: "expected a number in [0, 1]".to_string(),
        }),
    }
}
