//! JSON output for the CLI
//!
//! - Output: single JSON object via stdout
//! - Logs go to stderr while a command runs, keeping stdout parseable
//! - UTF-8 only

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

/// Write a success response to `out`
pub fn write_response_to(out: &mut impl Write, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_response_to(&mut io::stdout().lock(), data)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_envelope() {
        let mut out = Vec::new();
        write_response_to(&mut out, serde_json::json!({"online": [1]})).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["data"]["online"][0], 1);
    }
}
