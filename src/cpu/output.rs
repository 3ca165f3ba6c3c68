//! Where PRN and PRA send their output.

use std::io::Write;

/// Receives values printed by a running program.
pub trait Output {
    /// PRN: a register printed as a decimal number.
    fn print_number(&mut self, value: u8);

    /// PRA: a register printed as an ASCII character.
    fn print_char(&mut self, value: u8);
}

/// Writes program output to stdout, one line per PRN.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Output for Stdout {
    fn print_number(&mut self, value: u8) {
        println!("{}", value);
    }

    fn print_char(&mut self, value: u8) {
        let mut out = std::io::stdout().lock();
        // Console output is best-effort.
        let _ = out.write_all(&[value]);
        let _ = out.flush();
    }
}

/// Collects program output in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Everything printed, rendered as text.
    pub text: String,
    /// Values printed with PRN, in order.
    pub numbers: Vec<u8>,
}

impl Output for Captured {
    fn print_number(&mut self, value: u8) {
        self.numbers.push(value);
        self.text.push_str(&value.to_string());
        self.text.push('\n');
    }

    fn print_char(&mut self, value: u8) {
        self.text.push(char::from(value));
    }
}

/// Discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Output for Discard {
    fn print_number(&mut self, _value: u8) {}

    fn print_char(&mut self, _value: u8) {}
}
