mod console;
mod console_commands;
mod messages;

pub use console::{
    ConsoleState, DEFAULT_CONSOLE_FONT_SIZE, HISTORY_CAPACITY, HISTORY_HIDE_SECONDS,
};
pub use console_commands::{
    parse_command_line, register_builtin_commands, Command, CommandError, CommandLine,
    CommandOutput, CommandRegistry, DispatchOutcome, COMMAND_SIGIL,
};
pub use messages::{ConsoleMessage, MessageLevel};
