use owo_colors::OwoColorize;

use avro_syntax::{Error, ErrorKind};

fn heading(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Lexical => "Lex error",
        ErrorKind::Syntax => "Syntax error",
        ErrorKind::ResourceLimit => "Resource limit",
    }
}

/// Prints `err` with the offending source line and a caret under the column.
pub fn render_error(path: &str, source: &str, err: &Error) {
    eprintln!("{}: {}", heading(err.kind).red().bold(), err.msg.red());
    if let (Some(line), Some(col)) = (err.line, err.col) {
        eprintln!("  --> {}:{}:{}", path, line, col);
        if let Some(src_line) = source.lines().nth(line - 1) {
            let line_num_str = format!("{:3} | ", line);
            eprintln!("     |");
            eprintln!("{}{}", line_num_str.bright_black(), src_line);

            let mut marker = " ".repeat(line_num_str.len());
            marker.push_str(&" ".repeat(col.saturating_sub(1)));
            marker.push('^');
            eprintln!("{}{}", marker.red(), " here".red());
            eprintln!("     |");
        }
    } else {
        eprintln!("  --> {}", path);
    }

    if let Some(help) = suggestion(&err.msg) {
        eprintln!("{}", format!("Help: {help}").yellow());
    }
}

/// Prints a failure that has no source position.
pub fn render_failure(msg: &str) {
    eprintln!("{}: {}", "error".red().bold(), msg.red());
}

fn suggestion(msg: &str) -> Option<&'static str> {
    if msg.contains("missing `;`") {
        Some("fields, messages and most declarations end with `;`")
    } else if msg.contains("missing `}`") {
        Some("check that every `{` opened by a record, enum or protocol is closed")
    } else if msg.contains("trailing comma") {
        Some("only enum symbol lists accept a comma before the closing brace")
    } else if msg.contains("unterminated string") {
        Some("strings cannot span lines; close the quote on the same line")
    } else if msg.contains("unterminated") && msg.contains("comment") {
        Some("block comments run until `*/`")
    } else if msg.contains("nesting is deeper") {
        Some("raise the limit with --max-depth or AVRO_MAX_DEPTH")
    } else if msg.contains("byte limit") {
        Some("raise the limit with AVRO_MAX_INPUT_BYTES or a config file")
    } else if msg.contains("cannot be annotated") {
        Some("annotations apply to protocols, named types, fields and messages")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions() {
        assert!(suggestion("missing `;`").is_some());
        assert!(suggestion("unterminated comment").is_some());
        assert_eq!(suggestion("unexpected `)`"), None);
        assert_eq!(heading(ErrorKind::ResourceLimit), "Resource limit");
    }
}
