/// How a statement was terminated in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `;`: results in the current output mode.
    Horizontal,
    /// `\G`: results one column per line.
    Vertical,
    /// Trailing text with no terminator.
    None,
}

/// One statement cut from the input, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStatement {
    pub text: String,
    pub delimiter: Delimiter,
}

impl InputStatement {
    /// Terminated statements are trimmed. An unterminated tail keeps its
    /// trailing whitespace, which may belong to an open string literal.
    fn new(text: &str, delimiter: Delimiter) -> Self {
        let text = match delimiter {
            Delimiter::None => text.trim_start(),
            _ => text.trim(),
        };
        Self {
            text: text.to_string(),
            delimiter,
        }
    }
}

/// Split input into statements on `;` and `\G`.
///
/// Terminators inside quoted strings, quoted identifiers, dollar-quoted
/// bodies and comments do not count. Whitespace-only statements are dropped.
pub fn split_statements(input: &str) -> Vec<InputStatement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut i = 0;

    let mut push = |current: &mut String, delimiter: Delimiter| {
        if !current.trim().is_empty() {
            statements.push(InputStatement::new(current, delimiter));
        }
        current.clear();
    };

    while i < len {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();

        match ch {
            '-' if next == Some('-') => {
                while i < len && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                current.push_str("/*");
                i += 2;
                while i < len {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        current.push_str("*/");
                        i += 2;
                        break;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '\'' | '"' | '`' => {
                i = consume_quoted(&chars, i, &mut current);
            }
            '$' => match dollar_tag(&chars, i) {
                Some(tag) => {
                    i = consume_dollar_quoted(&chars, i, &tag, &mut current);
                }
                None => {
                    current.push(ch);
                    i += 1;
                }
            },
            ';' => {
                push(&mut current, Delimiter::Horizontal);
                i += 1;
            }
            '\\' if next == Some('G') => {
                push(&mut current, Delimiter::Vertical);
                i += 2;
            }
            _ => {
                current.push(ch);
                i += 1;
            }
        }
    }

    push(&mut current, Delimiter::None);
    statements
}

/// Copy a quoted run starting at `start`, honouring doubled quotes and
/// backslash escapes. Returns the index after the closing quote.
fn consume_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if c == '\\' && quote != '`' {
            if let Some(&escaped) = chars.get(i) {
                out.push(escaped);
                i += 1;
            }
        } else if c == quote {
            if chars.get(i) == Some(&quote) {
                out.push(quote);
                i += 1;
            } else {
                break;
            }
        }
    }
    i
}

/// `$tag$` opening at `start`, if any. The tag may be empty.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '$' {
            let tag: String = chars[start..=i].iter().collect();
            return Some(tag);
        }
        let valid = if i == start + 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        i += 1;
    }
    None
}

fn consume_dollar_quoted(chars: &[char], start: usize, tag: &str, out: &mut String) -> usize {
    let tag: Vec<char> = tag.chars().collect();
    out.extend(tag.iter());
    let mut i = start + tag.len();
    while i < chars.len() {
        if chars[i..].starts_with(&tag) {
            out.extend(tag.iter());
            return i + tag.len();
        }
        out.push(chars[i]);
        i += 1;
    }
    i
}
