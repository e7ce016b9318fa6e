//! Progress reporting with two sinks.
//!
//! The foreground install task writes straight to the terminal. The
//! background task writes into an in-memory buffer that is flushed as
//! one block after the foreground phase completes, so build logs stay
//! readable instead of interleaving two downloads line by line.

use console::{style, Term};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Out,
    Err,
}

struct Line {
    stream: Stream,
    text: String,
}

enum Sink {
    Direct { out: Term, err: Term },
    Buffered(Mutex<Vec<Line>>),
}

pub struct Reporter {
    sink: Sink,
}

impl Reporter {
    /// Reporter that writes lines to the terminal immediately.
    pub fn direct() -> Self {
        Self {
            sink: Sink::Direct {
                out: Term::stdout(),
                err: Term::stderr(),
            },
        }
    }

    /// Reporter that holds lines until [`flush`](Self::flush) is called.
    pub fn buffered() -> Self {
        Self {
            sink: Sink::Buffered(Mutex::new(Vec::new())),
        }
    }

    /// Status line for an operation that is starting.
    pub fn progress(&self, message: &str) {
        self.emit(Stream::Out, format!("{} {}", style("Info:").cyan(), message));
    }

    pub fn success(&self, message: &str) {
        self.emit(
            Stream::Out,
            format!("{} {}", style("Success:").green().bold(), message),
        );
    }

    pub fn warning(&self, message: &str) {
        self.emit(
            Stream::Err,
            format!("{} {}", style("Warning:").yellow().bold(), message),
        );
    }

    pub fn error(&self, message: &str) {
        self.emit(
            Stream::Err,
            format!("{} {}", style("Error:").red().bold(), message),
        );
    }

    fn emit(&self, stream: Stream, text: String) {
        match &self.sink {
            Sink::Direct { out, err } => {
                let term = match stream {
                    Stream::Out => out,
                    Stream::Err => err,
                };
                let _ = term.write_line(&text);
            }
            Sink::Buffered(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(Line { stream, text });
                }
            }
        }
    }

    /// Replay all buffered lines to the real terminal streams, in the
    /// order they were recorded. No-op for a direct reporter.
    pub fn flush(&self) {
        let Sink::Buffered(lines) = &self.sink else {
            return;
        };

        let drained: Vec<Line> = match lines.lock() {
            Ok(mut lines) => lines.drain(..).collect(),
            Err(_) => return,
        };

        let out = Term::stdout();
        let err = Term::stderr();
        for line in drained {
            let term = match line.stream {
                Stream::Out => &out,
                Stream::Err => &err,
            };
            let _ = term.write_line(&line.text);
        }
    }

    /// Number of lines waiting in the buffer. Always zero for a direct
    /// reporter.
    pub fn pending(&self) -> usize {
        match &self.sink {
            Sink::Direct { .. } => 0,
            Sink::Buffered(lines) => lines.lock().map(|l| l.len()).unwrap_or(0),
        }
    }
}
