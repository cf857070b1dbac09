use std::{
    io,
    fmt::Write,
    path::PathBuf,
    process::Output,
    time::Duration,
};
use colored::Colorize;
use crate::ext;

/// General enum, representing possible errors.
#[derive(Debug)]
pub enum Error {
    Io(io::Error, Vec<PathBuf>),
    /// Error, produced by an argument parser.
    Lexopt(lexopt::Error),
    /// Executable not found.
    NoExec(PathBuf),
    /// External tool finished with non-zero exit code: `(program name, process output)`.
    SubprocessFail(String, Output),
    /// External tool ran past the configured time limit: `(program name, limit)`.
    Timeout(String, Duration),
    InvalidInput(String),
    RuntimeError(String),
}

impl From<lexopt::Error> for Error {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

/// Last `n` lines of a diagnostic stream, lossily decoded.
fn tail_lines(bytes: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end();
    let skip = text.lines().count().saturating_sub(n);
    text.lines().skip(skip).collect::<Vec<_>>().join("\n")
}

impl Error {
    /// Format error message.
    pub fn display(&self) -> String {
        let mut s = String::new();
        match self {
            Self::Io(e, files) => {
                write!(s, "{} in relation to ", "Input/Output error".red()).unwrap();
                if files.is_empty() {
                    write!(s, "unnamed streams").unwrap();
                } else {
                    write!(s, "{}", files.iter().map(|f| ext::fmt::path(f).cyan().to_string())
                        .collect::<Vec<_>>().join(", ")).unwrap();
                }
                write!(s, ": {}", e.kind()).unwrap();
                if let Some(e2) = e.get_ref() {
                    write!(s, ", {}", e2).unwrap();
                }
            }
            Self::Lexopt(e) => write!(s, "{} to parse command-line arguments: {}", "Failed".red(), e).unwrap(),
            Self::NoExec(path) => write!(s, "{} at {}", "Could not find executable".red(),
                ext::fmt::path(path).cyan()).unwrap(),
            Self::SubprocessFail(program, out) => {
                write!(s, "{} {}", program.underline(), "failed".red()).unwrap();
                match out.status.code() {
                    Some(code) => write!(s, " with exit code {}", code).unwrap(),
                    None => write!(s, " (terminated by signal)").unwrap(),
                }
                // Stderr carries the diagnostics for both tools, stdout is a fallback.
                let diag = if out.stderr.is_empty() { &out.stdout } else { &out.stderr };
                if !diag.is_empty() {
                    write!(s, ":\n{}", tail_lines(diag, 20)).unwrap();
                }
            }
            Self::Timeout(program, limit) => write!(s, "{} {} after {}",
                program.underline(), "timed out".red(), ext::fmt::Duration(*limit)).unwrap(),
            Self::InvalidInput(e) => write!(s, "{}: {}", "Invalid input".red(), e).unwrap(),
            Self::RuntimeError(e) => write!(s, "{}: {}", "Runtime error".red(), e).unwrap(),
        };
        s
    }
}

macro_rules! validate_param {
    ($cond:expr, $($arg:expr),+) => {{
        if !($cond) {
            (
                Err($crate::Error::InvalidInput(format!($($arg),+)))
            ?)
        }
    }};
}
pub(crate) use validate_param;

macro_rules! add_path {
    (!) => {
        |e| $crate::Error::Io(e, Vec::new())
    };
    ($path:expr) => {
        |e| $crate::Error::Io(e, vec![std::convert::AsRef::<std::path::Path>::as_ref(&$path).to_owned()])
    };
    ($($path:expr),+) => {
        |e| {
            let mut v = Vec::new();
            $(
                v.push(std::convert::AsRef::<std::path::Path>::as_ref(&$path).to_owned());
            )*
            $crate::Error::Io(e, v)
        }
    };
}
pub(crate) use add_path;

macro_rules! error {
    ($var:ident, $($arg:expr),+ $(,)?) => {
        $crate::Error::$var(format!($($arg),+))
    }
}
pub(crate) use error;

/// Wrapper around the standard result.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines(b"a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines(b"a\nb", 5), "a\nb");
        assert_eq!(tail_lines(b"", 3), "");
    }
}
