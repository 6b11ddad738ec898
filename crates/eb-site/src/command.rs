//! Shell-style command line splitting.
//!
//! Configured commands are split once into an argument vector and run
//! without a shell, so user-supplied keywords substituted into an argument
//! can never be reinterpreted as shell syntax.

/// Error splitting a command line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command is empty")]
    Empty,
    #[error("unterminated {0} quote in command")]
    UnterminatedQuote(char),
    #[error("command ends with a dangling escape")]
    DanglingEscape,
}

/// Split `line` into words following POSIX shell quoting rules.
///
/// Single quotes are literal, double quotes allow `\"`, `\\` and `\$`
/// escapes, and a backslash outside quotes escapes the next character.
/// `${TOKEN}` placeholders pass through untouched.
pub fn split_command(line: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(CommandError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$')) => word.push(c),
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(CommandError::UnterminatedQuote('"')),
                        },
                        Some(c) => word.push(c),
                        None => return Err(CommandError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                word.push(chars.next().ok_or(CommandError::DanglingEscape)?);
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }

    if words.is_empty() {
        return Err(CommandError::Empty);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(line: &str) -> Vec<String> {
        split_command(line).unwrap()
    }

    #[test]
    fn test_plain_words() {
        assert_eq!(split("pandoc  -s\t--toc"), vec!["pandoc", "-s", "--toc"]);
    }

    #[test]
    fn test_quotes() {
        assert_eq!(
            split(r#"sh -c 'echo "$1"' -- "a b" c\ d"#),
            vec!["sh", "-c", r#"echo "$1""#, "--", "a b", "c d"]
        );
        assert_eq!(split(r#""" x"#), vec!["", "x"]);
        assert_eq!(split(r#""say \"hi\" \n""#), vec![r#"say "hi" \n"#]);
    }

    #[test]
    fn test_tokens_pass_through() {
        assert_eq!(
            split("grep -rl ${KEY_WORD} '${BLOG_PATH}'"),
            vec!["grep", "-rl", "${KEY_WORD}", "${BLOG_PATH}"]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(split_command("   "), Err(CommandError::Empty));
        assert_eq!(split_command("echo 'x"), Err(CommandError::UnterminatedQuote('\'')));
        assert_eq!(split_command("echo \"x"), Err(CommandError::UnterminatedQuote('"')));
        assert_eq!(split_command("echo \\"), Err(CommandError::DanglingEscape));
    }
}
