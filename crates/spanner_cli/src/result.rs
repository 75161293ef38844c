use std::time::Duration;

/// One output row, already rendered to display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub columns: Vec<String>,
}

impl Row {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl<S: Into<String>> From<Vec<S>> for Row {
    fn from(columns: Vec<S>) -> Self {
        Self::new(columns.into_iter().map(Into::into).collect())
    }
}

/// Execution statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Rows returned by a query, or rows written by a mutation.
    pub affected_rows: u64,
    /// Wall-clock time of the statement. Non-deterministic.
    pub elapsed_time: Duration,
}

/// Outcome of one executed statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub column_names: Vec<String>,
    pub rows: Vec<Row>,
    pub stats: Stats,
    pub is_mutation: bool,
}

impl ResultSet {
    /// Query-shaped result: affected rows equals the returned row count.
    pub fn query(column_names: Vec<String>, rows: Vec<Row>) -> Self {
        let affected_rows = rows.len() as u64;
        Self {
            column_names,
            rows,
            stats: Stats {
                affected_rows,
                ..Stats::default()
            },
            is_mutation: false,
        }
    }

    /// Mutation-shaped result: no columns, no rows.
    pub fn mutation(affected_rows: u64) -> Self {
        Self {
            column_names: Vec::new(),
            rows: Vec::new(),
            stats: Stats {
                affected_rows,
                ..Stats::default()
            },
            is_mutation: true,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.stats.elapsed_time = elapsed;
        self
    }

    /// Copy with elapsed time zeroed, so equality checks every other field.
    pub fn ignoring_timing(&self) -> Self {
        let mut out = self.clone();
        out.stats.elapsed_time = Duration::ZERO;
        out
    }
}
