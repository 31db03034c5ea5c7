//! Cooperative cancellation from the terminal.
//!
//! A background thread reads raw key events into an unbounded channel; the
//! scheduler polls the channel once per epoch without blocking. The thread
//! is started lazily on the first poll and stopped when the run reaches a
//! terminal state; polling again after a stop starts a fresh thread, so
//! one listener serves any number of runs.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        mpsc::{channel, Receiver, TryRecvError},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal,
};
use tracing::warn;

/// Aborts the optimization.
pub const ABORT_KEY: char = 'q';
/// Logs an on-demand estimate of the finishing time.
pub const ESTIMATE_KEY: char = 't';
/// Prints the key bindings.
pub const HELP_KEY: char = 'h';

/// Non-blocking source of cancellation/interaction keys.
pub trait CancelSource {
    /// Check for a pending key without waiting.
    fn poll(&mut self) -> Option<char>;

    /// Tear the source down. Idempotent; a later poll may start it again.
    fn stop(&mut self);

    /// Whether a human can actually press the bound keys. The scheduler
    /// only announces the key bindings for interactive sources.
    fn is_interactive(&self) -> bool {
        true
    }
}

/// Inert source for non-interactive runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCancel;

impl CancelSource for NoCancel {
    fn poll(&mut self) -> Option<char> {
        None
    }

    fn stop(&mut self) {}

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Raw-mode terminal state plus the thread feeding the channel.
struct Reader {
    rx: Receiver<char>,
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl Reader {
    fn start() -> io::Result<Self> {
        terminal::enable_raw_mode()?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let (tx, rx) = channel();

        let handle = std::thread::spawn(move || {
            while flag.load(Relaxed) {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key)) = event::read() {
                            if key.kind != KeyEventKind::Press {
                                continue;
                            }
                            if let KeyCode::Char(c) = key.code {
                                if tx.send(c).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        Ok(Self { rx, handle, running })
    }

    fn shutdown(self) {
        self.running.store(false, Relaxed);
        let _ = self.handle.join();

        if let Err(e) = terminal::disable_raw_mode() {
            warn!("could not restore terminal mode: {e}");
        }
    }
}

/// Background reader of raw terminal input. Dormant until first polled.
#[derive(Default)]
pub struct KeyListener {
    reader: Option<Reader>,
    failed: bool,
}

impl KeyListener {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CancelSource for KeyListener {
    fn poll(&mut self) -> Option<char> {
        if self.reader.is_none() {
            if self.failed {
                return None;
            }
            match Reader::start() {
                Ok(reader) => self.reader = Some(reader),
                Err(e) => {
                    warn!("keyboard listener unavailable: {e}");
                    self.failed = true;
                    return None;
                }
            }
        }

        match self.reader.as_ref()?.rx.try_recv() {
            Ok(c) => Some(c),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn stop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.shutdown();
        }
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted source standing in for a terminal.
    struct ScriptedKeys {
        keys: VecDeque<Option<char>>,
    }

    impl CancelSource for ScriptedKeys {
        fn poll(&mut self) -> Option<char> {
            self.keys.pop_front().flatten()
        }

        fn stop(&mut self) {}
    }

    #[test]
    fn test_no_cancel_is_silent() {
        let mut source = NoCancel;
        assert_eq!(source.poll(), None);
        source.stop();
        assert_eq!(source.poll(), None);
        assert!(!source.is_interactive());
    }

    #[test]
    fn test_scripted_keys_drain() {
        let mut source = ScriptedKeys { keys: VecDeque::from([None, Some('q')]) };
        assert_eq!(source.poll(), None);
        assert_eq!(source.poll(), Some('q'));
        assert_eq!(source.poll(), None);
        assert!(source.is_interactive());
    }
}
