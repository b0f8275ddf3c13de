//! Console input: the Snooze / Cancel buttons of the countdown surface.

use rustyline::error::ReadlineError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::input::{EventSender, HELP, UserCommand};
use crate::types::GuardStatus;

/// Read commands from the terminal on a dedicated thread.
///
/// Snooze and Cancel are forwarded to the runtime; `status` prints the latest
/// snapshot. The thread ends on EOF or when the runtime is gone; Ctrl+C
/// (swallowed by the line editor) stops the whole monitor.
pub fn spawn_input_thread(
    event_tx: EventSender,
    status_rx: watch::Receiver<GuardStatus>,
    token: CancellationToken,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                tracing::warn!(error = %e, "console input unavailable");
                return;
            }
        };

        loop {
            match editor.readline("") {
                Ok(line) => {
                    let Some(cmd) = UserCommand::parse(&line) else {
                        if !line.trim().is_empty() {
                            println!("unknown command; {HELP}");
                        }
                        continue;
                    };
                    match cmd.event() {
                        Some(event) => {
                            if event_tx.blocking_send(event).is_err() {
                                break;
                            }
                        }
                        None if cmd == UserCommand::Status => {
                            println!("{}", status_rx.borrow().summary());
                        }
                        None => println!("{HELP}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    token.cancel();
                    break;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "console input error");
                    break;
                }
            }
        }
        tracing::debug!("console input closed");
    });
}
