//! Consistent output formatting for the CLI.
//!
//! Every helper has a `_to` variant taking a writer, so output can be
//! asserted on in tests. Stdout write failures are ignored.

use dialoguer::console::style;
use std::io::{self, Write};

const HEADER_WIDTH: usize = 48;

/// Draws a boxed header with the given title.
pub fn print_header(title: &str) {
    let _ = print_header_to(&mut io::stdout(), title);
}

pub fn print_header_to<W: Write>(w: &mut W, title: &str) -> io::Result<()> {
    let border = "─".repeat(HEADER_WIDTH);
    writeln!(w, "┌{}┐", border)?;
    writeln!(w, "│ {:<width$} │", title, width = HEADER_WIDTH - 2)?;
    writeln!(w, "└{}┘", border)?;
    writeln!(w)
}

/// Prints a step message with a trailing space and no newline, so the
/// outcome can follow on the same line.
pub fn print_step(message: &str) {
    let _ = print_step_to(&mut io::stdout(), message);
}

pub fn print_step_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    write!(w, "{} ", message)?;
    w.flush()
}

/// Prints a success message with a green checkmark.
pub fn print_success(message: &str) {
    let _ = print_success_to(&mut io::stdout(), message);
}

pub fn print_success_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(
        w,
        "{} {}",
        style("✓").green().bold(),
        style(message).green()
    )
}

/// Prints an error message with a red X to stderr.
pub fn print_error(message: &str) {
    let _ = print_error_to(&mut io::stderr(), message);
}

pub fn print_error_to<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    writeln!(w, "{} {}", style("✗").red().bold(), style(message).red())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut output = Vec::new();
        f(&mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn header_is_boxed_and_fixed_width() {
        let result = render(|w| print_header_to(w, "TUNNLER SETUP"));
        let lines: Vec<&str> = result.lines().collect();

        assert!(lines[0].starts_with('┌') && lines[0].ends_with('┐'));
        assert!(lines[1].contains("TUNNLER SETUP"));
        assert!(lines[2].starts_with('└') && lines[2].ends_with('┘'));
        assert_eq!(lines[0].chars().filter(|&c| c == '─').count(), HEADER_WIDTH);
    }

    #[test]
    fn step_ends_with_space_no_newline() {
        let result = render(|w| print_step_to(w, "Saving credentials..."));
        assert!(result.ends_with(' '));
        assert!(!result.ends_with('\n'));
    }

    #[test]
    fn success_and_error_markers() {
        let success = render(|w| print_success_to(w, "Saved"));
        assert!(success.contains('✓') && success.contains("Saved"));
        assert!(success.ends_with('\n'));

        let error = render(|w| print_error_to(w, "Failed"));
        assert!(error.contains('✗') && error.contains("Failed"));
    }
}
