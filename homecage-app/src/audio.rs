use homecage_trial::{AudioCue, PeripheralError};
use std::io::{self, Write};

/// Rings the terminal bell.
pub struct TerminalBell<W: Write = io::Stderr> {
    out: W,
}

impl TerminalBell {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> AudioCue for TerminalBell<W> {
    fn play(&mut self) -> Result<(), PeripheralError> {
        self.out
            .write_all(b"\x07")
            .and_then(|()| self.out.flush())
            .map_err(|err| PeripheralError::Audio(err.to_string()))
    }
}
