//! Terminal alert surface.
//!
//! A dedicated thread owns stdout and executes [`SurfaceCommand`]s one at a
//! time, so the countdown line is only ever touched from one place.

use std::io::{self, Write};
use std::sync::mpsc;

use async_trait::async_trait;

use super::{AlertSink, SurfaceError};
use crate::types::Notice;

/// Render commands executed serially by the surface owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCommand {
    Notice(Notice),
    Show(u32),
    Update { seconds_left: u32, visible: bool },
    Close,
}

/// Draws notices and the countdown line onto a writer.
#[derive(Debug)]
pub struct SurfaceRenderer<W: Write> {
    out: W,
    snooze_minutes: u32,
    open: bool,
    visible: bool,
}

impl<W: Write> SurfaceRenderer<W> {
    pub fn new(out: W, snooze_secs: u32) -> Self {
        Self {
            out,
            snooze_minutes: snooze_secs.div_ceil(60),
            open: false,
            visible: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_visible(&self) -> bool {
        self.open && self.visible
    }

    pub fn apply(&mut self, cmd: SurfaceCommand) -> io::Result<()> {
        match cmd {
            SurfaceCommand::Notice(notice) => {
                self.clear_line()?;
                writeln!(self.out, "*** {}: {}", notice.title(), notice.message())?;
            }
            SurfaceCommand::Show(initial) => {
                if self.open {
                    return Ok(());
                }
                self.open = true;
                self.visible = false;
                self.clear_line()?;
                writeln!(
                    self.out,
                    "!!! CRITICAL BATTERY: shutdown in {initial}s. \
                     Type 's' to snooze (+{} min) or 'c' to cancel protection.",
                    self.snooze_minutes
                )?;
            }
            SurfaceCommand::Update { seconds_left, visible } => {
                if !self.open {
                    return Ok(());
                }
                if visible {
                    self.clear_line()?;
                    write!(
                        self.out,
                        "Shutdown in {seconds_left}s  [s]nooze +{} min / [c]ancel",
                        self.snooze_minutes
                    )?;
                } else if self.visible {
                    self.clear_line()?;
                }
                self.visible = visible;
            }
            SurfaceCommand::Close => {
                if !self.open {
                    return Ok(());
                }
                self.clear_line()?;
                self.open = false;
                self.visible = false;
            }
        }
        self.out.flush()
    }

    fn clear_line(&mut self) -> io::Result<()> {
        write!(self.out, "\r\x1b[2K")
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// [`AlertSink`] backed by the terminal surface thread.
#[derive(Debug, Clone)]
pub struct ConsoleAlerts {
    tx: mpsc::Sender<SurfaceCommand>,
}

impl ConsoleAlerts {
    /// Spawn the surface owner thread writing to stdout.
    pub fn spawn(snooze_secs: u32) -> Self {
        let (tx, rx) = mpsc::channel::<SurfaceCommand>();
        std::thread::spawn(move || {
            let mut renderer = SurfaceRenderer::new(io::stdout(), snooze_secs);
            while let Ok(cmd) = rx.recv() {
                if let Err(e) = renderer.apply(cmd) {
                    tracing::debug!(error = %e, ?cmd, "surface render failed");
                }
            }
        });
        Self { tx }
    }

    fn send(&self, cmd: SurfaceCommand) -> Result<(), SurfaceError> {
        self.tx.send(cmd).map_err(|_| SurfaceError::OwnerGone)
    }
}

#[async_trait]
impl AlertSink for ConsoleAlerts {
    fn notify(&self, notice: Notice) {
        tracing::info!(title = notice.title(), message = %notice.message(), "notice");
        let _ = self.send(SurfaceCommand::Notice(notice));
    }

    async fn show_countdown(&self, initial_seconds: u32) -> Result<(), SurfaceError> {
        self.send(SurfaceCommand::Show(initial_seconds))
    }

    async fn update_countdown(&self, seconds_left: u32, visible: bool) -> Result<(), SurfaceError> {
        self.send(SurfaceCommand::Update { seconds_left, visible })
    }

    async fn close_countdown(&self) -> Result<(), SurfaceError> {
        self.send(SurfaceCommand::Close)
    }
}
