//! Shell-safe construction of driver launch command lines.
//!
//! Every token spliced into a generated command line goes through [`escape`]
//! so that user-supplied arguments can never break out of their shell word.

use crate::scheduler::DriverCommand;

/// Escape a raw string into a single shell-safe token.
///
/// Strings that are already quoted by the caller, or that contain only
/// characters with no special meaning in a shell word, pass through
/// unchanged. Everything else is wrapped in double quotes; inside the
/// quotes only `"`, `$` and backtick keep special meaning, so exactly
/// those three are backslash-escaped.
pub fn escape(raw: &str) -> String {
    if is_quoted(raw) || is_plain_word(raw) {
        return raw.to_string();
    }

    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('"');
    for c in raw.chars() {
        match c {
            '"' | '$' | '`' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped.push('"');
    escaped
}

/// Materialize the full launch command line for a driver.
///
/// Tokens are escaped individually and joined with single spaces:
/// environment assignments first, then classpath and library-path
/// exports, then the entry point and its arguments. Each original
/// argument stays a single shell word in the output.
pub fn launch_command(command: &DriverCommand) -> String {
    let mut parts: Vec<String> = Vec::new();

    for (key, value) in &command.environment {
        parts.push(format!("{}={}", key, escape(value)));
    }
    if !command.classpath_entries.is_empty() {
        parts.push(format!(
            "CLASSPATH={}",
            escape(&command.classpath_entries.join(":"))
        ));
    }
    if !command.library_path_entries.is_empty() {
        parts.push(format!(
            "LD_LIBRARY_PATH={}",
            escape(&command.library_path_entries.join(":"))
        ));
    }
    parts.push(escape(&command.entrypoint));
    parts.extend(command.arguments.iter().map(|arg| escape(arg)));

    parts.join(" ")
}

/// Already fully enclosed in a matching pair of single or double quotes.
fn is_quoted(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2
        && ((bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"'))
}

/// Empty, or made only of characters that are never special in a shell word.
fn is_plain_word(raw: &str) -> bool {
    raw.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::DriverCommand;

    #[test]
    fn leaves_single_quoted_strings_untouched() {
        assert_eq!(
            escape("'should be left untouched'"),
            "'should be left untouched'"
        );
    }

    #[test]
    fn leaves_double_quoted_strings_untouched() {
        assert_eq!(escape("\"already quoted\""), "\"already quoted\"");
    }

    #[test]
    fn leaves_plain_words_untouched() {
        assert_eq!(escape("harmless"), "harmless");
        assert_eq!(escape("v1.2.3-rc"), "v1.2.3-rc");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn escapes_double_quote() {
        assert_eq!(
            escape("should escape this \" quote"),
            "\"should escape this \\\" quote\""
        );
    }

    #[test]
    fn escapes_dollar() {
        assert_eq!(
            escape("should escape this $ dollar"),
            "\"should escape this \\$ dollar\""
        );
    }

    #[test]
    fn escapes_backtick() {
        assert_eq!(escape("a `b` c"), "\"a \\`b\\` c\"");
    }

    #[test]
    fn wraps_without_escaping_internals() {
        // The surrounding double quotes alone neutralize the space; no
        // internal escaping happens.
        assert_eq!(escape("onlywrap this"), "\"onlywrap this\"");
        assert_eq!(escape("a|b;c&d"), "\"a|b;c&d\"");
        assert_eq!(escape("back\\slash"), "\"back\\slash\"");
    }

    #[test]
    fn launch_command_joins_escaped_tokens() {
        let command = DriverCommand {
            entrypoint: "org.example.Main".to_string(),
            arguments: vec!["--input".to_string(), "my file.txt".to_string()],
            environment: [("APP_MODE".to_string(), "batch run".to_string())]
                .into_iter()
                .collect(),
            classpath_entries: vec!["/opt/app/lib".to_string()],
            library_path_entries: vec![],
        };
        assert_eq!(
            launch_command(&command),
            "APP_MODE=\"batch run\" CLASSPATH=\"/opt/app/lib\" org.example.Main --input \"my file.txt\""
        );
    }

    #[test]
    fn launch_command_keeps_each_argument_a_single_word() {
        let command = DriverCommand {
            entrypoint: "run.sh".to_string(),
            arguments: vec!["$(rm -rf /)".to_string()],
            environment: Default::default(),
            classpath_entries: vec![],
            library_path_entries: vec![],
        };
        assert_eq!(launch_command(&command), "run.sh \"\\$(rm -rf /)\"");
    }
}
