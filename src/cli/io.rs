//! Output handling for the CLI
//!
//! Results go to stdout as JSON, one value per command; errors go to
//! stderr as `CODE: message`.

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Render a value as compact or indented JSON
pub fn render(data: &Value, pretty: bool) -> CliResult<String> {
    let text = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    text.map_err(|e| CliError::io_error(format!("JSON error: {}", e)))
}

/// Write a result value to stdout
pub fn write_value(data: &Value, pretty: bool) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", render(data, pretty)?)?;
    stdout.flush()?;
    Ok(())
}

/// Write an error to stderr
pub fn write_error(err: &CliError) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}: {}", err.code_str(), err.message());
}

/// Print `prompt` and read one line from stdin; `None` at end of input
pub fn prompt_line(prompt: &str) -> CliResult<Option<String>> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;
    drop(stdout);

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Ask a yes/no question; anything but `y` is no
pub fn confirm(question: &str) -> CliResult<bool> {
    let answer = prompt_line(&format!("{} [y/N]: ", question))?;
    Ok(answer.is_some_and(|a| a.trim().eq_ignore_ascii_case("y")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_compact_and_pretty() {
        let value = json!({"a": [1, 2]});
        assert_eq!(render(&value, false).unwrap(), r#"{"a":[1,2]}"#);
        assert!(render(&value, true).unwrap().contains('\n'));
    }
}
