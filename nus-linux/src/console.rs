//! Foreground line console served over the link.
//!
//! Minimal interpreter: line editing with echo and backspace, plus a few
//! built-in commands. Runs on its own thread since `read_byte` blocks.

use std::sync::Arc;

use nus_core::{ConsoleIo, StatsSnapshot};

use crate::radio::EmulatedRadio;

const PROMPT: &[u8] = b">>> ";
const MAX_LINE: usize = 256;

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

const HELP_TEXT: &str = "\
Welcome to the NUS console.\r\n\
\r\n\
Commands:\r\n\
  help        - show this text\r\n\
  stats       - link counters\r\n\
  echo <text> - print text back\r\n\
\r\n\
Control commands:\r\n\
  CTRL-C - discard the current line\r\n\
  Ctrl-D - soft reset the console\r\n";

/// Line state. Fed one byte at a time; returns what to send back.
#[derive(Debug, Default)]
pub struct LineConsole {
    line: Vec<u8>,
}

impl LineConsole {
    pub fn banner(&self) -> Vec<u8> {
        let mut out = format!("NUS console {}\r\n", env!("CARGO_PKG_VERSION")).into_bytes();
        out.extend_from_slice(PROMPT);
        out
    }

    pub fn feed(&mut self, byte: u8, stats: impl FnOnce() -> StatsSnapshot) -> Vec<u8> {
        match byte {
            b'\r' | b'\n' => {
                let line = std::mem::take(&mut self.line);
                let mut out = b"\r\n".to_vec();
                out.extend(run_command(&String::from_utf8_lossy(&line), stats));
                out.extend_from_slice(PROMPT);
                out
            }
            BACKSPACE | DELETE => match self.line.pop() {
                Some(_) => b"\x08 \x08".to_vec(),
                None => Vec::new(),
            },
            CTRL_C => {
                self.line.clear();
                let mut out = b"\r\nKeyboardInterrupt\r\n".to_vec();
                out.extend_from_slice(PROMPT);
                out
            }
            CTRL_D => {
                self.line.clear();
                let mut out = b"\r\nsoft reset\r\n".to_vec();
                out.extend(self.banner());
                out
            }
            0x20..=0x7E if self.line.len() < MAX_LINE => {
                self.line.push(byte);
                vec![byte]
            }
            _ => Vec::new(),
        }
    }
}

fn run_command(line: &str, stats: impl FnOnce() -> StatsSnapshot) -> Vec<u8> {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        "" => Vec::new(),
        "help" => HELP_TEXT.as_bytes().to_vec(),
        "echo" => format!("{}\r\n", rest.trim_start()).into_bytes(),
        "stats" => {
            let s = stats();
            format!(
                "sent {} retries {} discarded {} in-dropped {} out-dropped {}\r\n",
                s.notifications_sent,
                s.congestion_retries,
                s.chunks_discarded,
                s.inbound_dropped,
                s.outbound_dropped
            )
            .into_bytes()
        }
        other => format!("unknown command: {}\r\n", other).into_bytes(),
    }
}

/// Foreground loop. Never returns; the process exits from the runtime side.
pub fn run_console(mut io: ConsoleIo<Arc<EmulatedRadio>>) {
    let mut console = LineConsole::default();
    io.write_bytes(&console.banner());
    loop {
        let byte = io.read_byte();
        let out = console.feed(byte, || io.stats_snapshot());
        io.write_bytes(&out);
    }
}
