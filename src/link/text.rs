//! Line-oriented controller link.

use std::io::{self, Write};

use robobot_mission_core::controller::{Controller, ControllerCommand, LinkError};

/// Writes each command as one `\n` terminated line and flushes.
pub struct TextLink<W: Write> {
    out: W,
    sent: u64,
}

impl<W: Write> TextLink<W> {
    pub fn new(out: W) -> Self {
        Self { out, sent: 0 }
    }

    /// Commands written so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn link_error(e: &io::Error) -> LinkError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => LinkError::Disconnected,
        _ => LinkError::WriteFailed,
    }
}

impl<W: Write> Controller for TextLink<W> {
    fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError> {
        writeln!(self.out, "{}", command)
            .and_then(|()| self.out.flush())
            .map_err(|e| {
                crate::log_error!("controller write failed: {}", e);
                link_error(&e)
            })?;
        self.sent += 1;
        crate::log_trace!(command = %command, "sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robobot_mission_core::controller::DisplayRow;
    use robobot_mission_core::snippet::MissionLine;

    struct Broken(io::ErrorKind);

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(self.0))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_line_per_command() {
        let mut link = TextLink::new(Vec::new());
        link.send(&ControllerCommand::Halt).unwrap();
        link.send(&ControllerCommand::ModifyLine {
            thread: 101,
            line_no: 1,
            line: MissionLine::new("vel=0.2, acc=2: dist=0.5").unwrap(),
        })
        .unwrap();
        link.send(&ControllerCommand::RaiseEvent(31)).unwrap();
        link.send(&ControllerCommand::display(DisplayRow::Status, "finished"))
            .unwrap();

        assert_eq!(link.sent(), 4);
        let text = String::from_utf8(link.into_inner()).unwrap();
        assert_eq!(
            text,
            "robot stop\n<mod 101 1 vel=0.2, acc=2: dist=0.5\n<event=31\noled 3 finished\n"
        );
    }

    #[test]
    fn test_broken_pipe_is_disconnect() {
        let mut link = TextLink::new(Broken(io::ErrorKind::BrokenPipe));
        assert_eq!(link.send(&ControllerCommand::Start), Err(LinkError::Disconnected));
        assert_eq!(link.sent(), 0);
    }

    #[test]
    fn test_other_io_error_is_write_failure() {
        let mut link = TextLink::new(Broken(io::ErrorKind::Other));
        assert_eq!(link.send(&ControllerCommand::Stop), Err(LinkError::WriteFailed));
    }
}
