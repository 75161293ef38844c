use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tracing::debug;

/// Words offered for tab completion.
static KEYWORDS: &[&str] = &[
    "SELECT",
    "FROM",
    "WHERE",
    "INSERT",
    "INTO",
    "VALUES",
    "UPDATE",
    "SET",
    "DELETE",
    "CREATE",
    "ALTER",
    "DROP",
    "TABLE",
    "DATABASE",
    "DATABASES",
    "TABLES",
    "INDEX",
    "INDEXES",
    "KEYS",
    "COLUMNS",
    "PRIMARY",
    "KEY",
    "NOT",
    "NULL",
    "JOIN",
    "LEFT",
    "INNER",
    "ON",
    "AND",
    "OR",
    "IN",
    "IS",
    "LIKE",
    "ORDER",
    "BY",
    "ASC",
    "DESC",
    "GROUP",
    "HAVING",
    "LIMIT",
    "OFFSET",
    "DISTINCT",
    "AS",
    "WITH",
    "UNION",
    "ALL",
    "EXPLAIN",
    "SHOW",
    "BEGIN",
    "RW",
    "RO",
    "COMMIT",
    "ROLLBACK",
    "CLOSE",
    "USE",
    "EXIT",
];

/// rustyline helper completing keywords in upper case.
pub struct SqlHelper;

impl Completer for SqlHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        let word_start = prefix
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = prefix[word_start..].to_ascii_uppercase();
        debug!("Completing word: {:?}", word);

        if word.is_empty() {
            return Ok((word_start, Vec::new()));
        }
        let candidates = KEYWORDS
            .iter()
            .filter(|kw| kw.starts_with(&word))
            .map(|kw| Pair {
                display: kw.to_string(),
                replacement: kw.to_string(),
            })
            .collect();
        Ok((word_start, candidates))
    }
}

impl Hinter for SqlHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for SqlHelper {}
impl Validator for SqlHelper {}
impl Helper for SqlHelper {}
