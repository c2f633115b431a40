//! Common types for cush-expect.

use std::fmt;
use std::ops::Range;

use harness_pty::ExitStatus;

/// A successful expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The full text that matched.
    pub matched: String,

    /// Output between the previous cursor position and the match.
    pub before: String,

    /// Byte range of the match within everything the shell has printed.
    pub range: Range<usize>,

    /// Capture groups from regex patterns (empty for literals).
    pub captures: Vec<String>,
}

impl Match {
    /// Create a new match result.
    #[must_use]
    pub fn new(matched: impl Into<String>, before: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            matched: matched.into(),
            before: before.into(),
            range,
            captures: Vec::new(),
        }
    }

    /// Create a match with captures.
    #[must_use]
    pub fn with_captures(mut self, captures: Vec<String>) -> Self {
        self.captures = captures;
        self
    }

    /// Get a capture group by index.
    #[must_use]
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }

    /// Get the full matched text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.matched
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matched)
    }
}

/// State of a harness session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The shell is running (as far as the harness knows).
    Running,

    /// The shell exited on its own.
    Exited(ExitStatus),

    /// The session was terminated; its descriptors are closed.
    Closed,
}

impl SessionState {
    /// Whether input can still be sent.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the session has been torn down.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited(status) => write!(f, "exited ({status})"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Control characters a script can send to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlChar {
    /// Ctrl+C (ETX) - Interrupt
    CtrlC,
    /// Ctrl+D (EOT) - End of input
    CtrlD,
    /// Ctrl+L (FF) - Clear screen
    CtrlL,
    /// Ctrl+U (NAK) - Kill line
    CtrlU,
    /// Ctrl+W (ETB) - Kill word
    CtrlW,
    /// Ctrl+Z (SUB) - Suspend
    CtrlZ,
    /// Ctrl+\ (FS) - Quit
    CtrlBackslash,
}

impl ControlChar {
    /// Get the byte value of this control character.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::CtrlC => 0x03,
            Self::CtrlD => 0x04,
            Self::CtrlL => 0x0C,
            Self::CtrlU => 0x15,
            Self::CtrlW => 0x17,
            Self::CtrlZ => 0x1A,
            Self::CtrlBackslash => 0x1C,
        }
    }

    /// Create a control character from a regular character.
    ///
    /// For example, `ControlChar::from_char('c')` returns `Some(ControlChar::CtrlC)`.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'c' => Some(Self::CtrlC),
            'd' => Some(Self::CtrlD),
            'l' => Some(Self::CtrlL),
            'u' => Some(Self::CtrlU),
            'w' => Some(Self::CtrlW),
            'z' => Some(Self::CtrlZ),
            '\\' => Some(Self::CtrlBackslash),
            _ => None,
        }
    }
}

impl From<ControlChar> for u8 {
    fn from(c: ControlChar) -> Self {
        c.as_byte()
    }
}
