use homecage_trial::{PeripheralError, RewardPulse};
use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;
use tracing::info;

const WRITE_TIMEOUT: Duration = Duration::from_millis(200);

/// Writes a fixed newline-terminated token per pulse. Nothing is read back.
pub struct LinePulse<W: Write> {
    sink: W,
    device: String,
    frame: Vec<u8>,
}

impl<W: Write> LinePulse<W> {
    pub fn new(sink: W, device: impl Into<String>, token: &str) -> Self {
        let mut frame = token.as_bytes().to_vec();
        frame.push(b'\n');
        Self {
            sink,
            device: device.into(),
            frame,
        }
    }
}

impl<W: Write> RewardPulse for LinePulse<W> {
    fn pulse(&mut self) -> Result<(), PeripheralError> {
        self.sink
            .write_all(&self.frame)
            .and_then(|()| self.sink.flush())
            .map_err(|source| PeripheralError::Write {
                device: self.device.clone(),
                source,
            })
    }
}

pub fn open(
    device: &str,
    baud: u32,
    token: &str,
) -> Result<LinePulse<Box<dyn SerialPort>>, PeripheralError> {
    let port = serialport::new(device, baud)
        .timeout(WRITE_TIMEOUT)
        .open()
        .map_err(|err| PeripheralError::Open {
            device: device.to_string(),
            reason: err.to_string(),
        })?;
    info!(device, baud, token, "reward pulse port open");
    Ok(LinePulse::new(port, device, token))
}

/// Stands in for the serial device when no hardware is attached.
#[derive(Debug, Default)]
pub struct DryRunPulse {
    fired: u64,
}

impl RewardPulse for DryRunPulse {
    fn pulse(&mut self) -> Result<(), PeripheralError> {
        self.fired += 1;
        info!(fired = self.fired, "reward pulse (dry run)");
        Ok(())
    }
}
