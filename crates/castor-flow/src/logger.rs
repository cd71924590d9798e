// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use std::io::Write;

/// Logger used by task actions to write into their output sink. Writes are
/// best-effort : implementations never report failures back to the action.
pub trait FlowLogger: Send + Sync {
    fn log(&self, output: &mut dyn Write, message: &str);
    fn error(&self, output: &mut dyn Write, message: &str);
    fn fatal(&self, output: &mut dyn Write, message: &str);
    fn skip(&self, output: &mut dyn Write, message: &str);

    /// Marks the calling function as attribution-transparent. Loggers that
    /// do not attribute log lines to source locations ignore this.
    fn helper(&self) {}
}

/// Default logger : the bare message plus a final newline.
pub struct PlainLogger;

impl FlowLogger for PlainLogger {
    fn log(&self, output: &mut dyn Write, message: &str) {
        let _ = writeln!(output, "{message}");
    }

    fn error(&self, output: &mut dyn Write, message: &str) {
        let _ = writeln!(output, "{message}");
    }

    fn fatal(&self, output: &mut dyn Write, message: &str) {
        let _ = writeln!(output, "{message}");
    }

    fn skip(&self, output: &mut dyn Write, message: &str) {
        let _ = writeln!(output, "{message}");
    }
}
