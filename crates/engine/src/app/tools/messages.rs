use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageLevel {
    #[default]
    None,
    Info,
    Warning,
    Error,
    Fatal,
}

impl MessageLevel {
    pub fn label(self) -> Option<&'static str> {
        match self {
            MessageLevel::None => None,
            MessageLevel::Info => Some("INFO"),
            MessageLevel::Warning => Some("WARNING"),
            MessageLevel::Error => Some("ERROR"),
            MessageLevel::Fatal => Some("FATAL"),
        }
    }
}

/// A leveled line destined for the console history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl ConsoleMessage {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::None, text)
    }
}

impl fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level.label() {
            Some(label) => write!(f, "[{label}] {}", self.text),
            None => f.write_str(&self.text),
        }
    }
}
