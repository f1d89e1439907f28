// ABOUTME: Fatal/warning reporter in the original model's ReportError/ReportWarning idiom

use crate::engine::error::CoreError;

/// Prints a fatal error to stderr with its exit code, mirroring the
/// original model's `ReportError` convention. Callers exit the
/// process with `err.exit_code()` after calling this.
pub fn report_fatal(err: &CoreError) {
    eprintln!("fatal (exit {}): {err}", err.exit_code());
}

/// Prints a non-fatal warning to stderr; execution continues.
pub fn report_warning(message: &str) {
    eprintln!("warning: {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_fatal_does_not_panic() {
        report_fatal(&CoreError::RootMaxIter);
    }

    #[test]
    fn report_warning_does_not_panic() {
        report_warning("station record gap filled by persistence");
    }
}
