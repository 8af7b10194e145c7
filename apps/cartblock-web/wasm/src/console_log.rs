//! Forward `tracing` output to the browser console
//!
//! The fmt subscriber formats each event into a fresh [`ConsoleWriter`]; the
//! writer hands the finished line to `console.*` when it is dropped, choosing
//! the console method from the event level.

use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;

/// Level of the installed subscriber
static INSTALLED_LEVEL: OnceLock<Level> = OnceLock::new();

/// Install the console subscriber and return the level in effect.
///
/// The subscriber is global, so only the first call sets the level; later
/// calls return that level unchanged.
pub fn init_logging(level: Level) -> Level {
    *INSTALLED_LEVEL.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_writer(ConsoleMakeWriter)
            .with_max_level(level)
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .try_init();
        level
    })
}

pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level())
    }
}

/// Buffers one formatted event
pub struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Level) -> Self {
        Self {
            level,
            buf: Vec::new(),
        }
    }

    fn take_message(&mut self) -> Option<String> {
        let message = String::from_utf8_lossy(&self.buf).trim_end().to_string();
        self.buf.clear();
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

impl Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let Some(message) = self.take_message() else {
            return;
        };
        let message = JsValue::from_str(&message);
        if self.level == Level::ERROR {
            web_sys::console::error_1(&message);
        } else if self.level == Level::WARN {
            web_sys::console::warn_1(&message);
        } else if self.level == Level::INFO {
            web_sys::console::log_1(&message);
        } else {
            web_sys::console::debug_1(&message);
        }
    }
}
