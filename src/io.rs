//! Output plumbing for the `Print` opcode.
//!
//! The core never writes to a process stream itself (spec.md §7): `Print`
//! goes through a `PrintWriter` the host supplies, exactly like the
//! teacher's own `io.rs`.

use std::fmt;

/// Implemented by hosts that want to capture or redirect `print()` output.
pub trait PrintWriter {
    /// Writes one line of already-formatted output (no trailing newline —
    /// the VM adds it).
    fn write_line(&mut self, line: &str);

    /// Enables downcasting a `&dyn PrintWriter` back to a concrete sink —
    /// tests use this to reach `CollectStringPrint::lines` through
    /// `VM::print_writer`.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Writes to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Captures every line into a `Vec<String>`. The default choice in tests.
#[derive(Debug, Default)]
pub struct CollectStringPrint {
    pub lines: Vec<String>,
}

impl PrintWriter for CollectStringPrint {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl fmt::Display for CollectStringPrint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Discards all output. Useful when a host only cares about the return
/// value or side effects observable through native callables.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_line(&mut self, _line: &str) {}

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
