//! Shell-free command line tokenizer.
//!
//! Splits a raw command string into an argv the way a POSIX shell would split
//! words, but performs no expansion of any kind: no variables, no globbing, no
//! command substitution. What this returns is exactly what gets executed.

use super::GuardError;

/// Tokenize `input` into an argument vector.
///
/// - Unquoted spaces and tabs separate tokens.
/// - `'...'` keeps its contents literally, backslashes included.
/// - `"..."` keeps whitespace but still honors backslash escapes.
/// - A backslash outside single quotes escapes the next character.
///
/// Empty tokens are dropped, so `''` alone yields nothing. Blank input gives
/// an empty vector; deciding whether that is an error is up to the caller.
pub fn parse_command_line(input: &str) -> Result<Vec<String>, GuardError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ' ' | '\t' if !in_single && !in_double => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if escaped {
        return Err(GuardError::MalformedCommand("unterminated escape in command".to_string()));
    }
    if in_single || in_double {
        return Err(GuardError::MalformedCommand("unterminated quote in command".to_string()));
    }
    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_words() {
        let args = parse_command_line("ls -la  /tmp").unwrap();
        assert_eq!(args, vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_parse_tabs_separate_tokens() {
        let args = parse_command_line("echo\ta\t\tb").unwrap();
        assert_eq!(args, vec!["echo", "a", "b"]);
    }

    #[test]
    fn test_parse_single_quotes_are_literal() {
        let args = parse_command_line(r#"echo 'hello \n world'"#).unwrap();
        assert_eq!(args, vec!["echo", r"hello \n world"]);
    }

    #[test]
    fn test_parse_double_quotes_keep_spaces() {
        let args = parse_command_line(r#"grep "two words" file.txt"#).unwrap();
        assert_eq!(args, vec!["grep", "two words", "file.txt"]);
    }

    #[test]
    fn test_parse_escape_inside_double_quotes() {
        let args = parse_command_line(r#"echo "say \"hi\"""#).unwrap();
        assert_eq!(args, vec!["echo", r#"say "hi""#]);
    }

    #[test]
    fn test_parse_backslash_escapes_space() {
        let args = parse_command_line(r"cat my\ file.txt").unwrap();
        assert_eq!(args, vec!["cat", "my file.txt"]);
    }

    #[test]
    fn test_parse_adjacent_quotes_join() {
        let args = parse_command_line(r#"echo a'b c'"d e""#).unwrap();
        assert_eq!(args, vec!["echo", "ab cd e"]);
    }

    #[test]
    fn test_parse_empty_quotes_are_dropped() {
        let args = parse_command_line("printf ''").unwrap();
        assert_eq!(args, vec!["printf"]);
        assert!(parse_command_line("''").unwrap().is_empty());
        assert!(parse_command_line("'' \"\"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_no_expansion() {
        let args = parse_command_line("echo $HOME *.rs").unwrap();
        assert_eq!(args, vec!["echo", "$HOME", "*.rs"]);
    }

    #[test]
    fn test_parse_blank_input() {
        assert!(parse_command_line("").unwrap().is_empty());
        assert!(parse_command_line("   \t ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_unterminated_single_quote() {
        let result = parse_command_line("echo 'oops");
        assert!(matches!(result, Err(GuardError::MalformedCommand(_))));
    }

    #[test]
    fn test_parse_unterminated_double_quote() {
        let result = parse_command_line(r#"echo "oops"#);
        assert!(matches!(result, Err(GuardError::MalformedCommand(_))));
    }

    #[test]
    fn test_parse_trailing_escape() {
        let result = parse_command_line(r"echo oops\");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unterminated escape"));
    }
}
