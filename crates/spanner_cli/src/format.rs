use crate::result::ResultSet;

/// Output mode for result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Bordered table (interactive default).
    #[default]
    Table,
    /// One `column: value` line per column, for `\G`.
    Vertical,
    /// Tab-separated with a header line (batch default).
    Tab,
    Csv,
    Json,
}

/// Render the rows of `result`. Mutations and empty results render nothing,
/// except in CSV (header only) and JSON (`[]`).
pub fn render(result: &ResultSet, mode: OutputMode) -> String {
    if result.is_mutation {
        return String::new();
    }
    match mode {
        OutputMode::Table if !result.rows.is_empty() => format_table(result),
        OutputMode::Vertical if !result.rows.is_empty() => format_vertical(result),
        OutputMode::Tab if !result.rows.is_empty() => format_tab(result),
        OutputMode::Csv => format_csv(result),
        OutputMode::Json => format_json(result),
        _ => String::new(),
    }
}

/// `N rows in set`, `Empty set` or `Query OK, N rows affected`, with the
/// elapsed time in seconds.
pub fn summary_line(result: &ResultSet) -> String {
    let secs = result.stats.elapsed_time.as_secs_f64();
    if result.is_mutation {
        format!(
            "Query OK, {} rows affected ({:.2} sec)",
            result.stats.affected_rows, secs
        )
    } else if result.stats.affected_rows == 0 {
        format!("Empty set ({:.2} sec)", secs)
    } else {
        format!(
            "{} rows in set ({:.2} sec)",
            result.stats.affected_rows, secs
        )
    }
}

fn cell(result: &ResultSet, row: usize, col: usize) -> &str {
    result.rows[row]
        .columns
        .get(col)
        .map(String::as_str)
        .unwrap_or("")
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize) -> String {
    format!("{}{}", s, " ".repeat(w.saturating_sub(width(s))))
}

fn format_table(result: &ResultSet) -> String {
    let cols = &result.column_names;
    let mut widths: Vec<usize> = cols.iter().map(|c| width(c)).collect();
    for r in 0..result.rows.len() {
        for (i, w) in widths.iter_mut().enumerate() {
            *w = (*w).max(width(cell(result, r, i)));
        }
    }

    let border: String = {
        let parts: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+\n", parts.join("+"))
    };
    let line = |values: Vec<&str>| -> String {
        let cells: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {} ", pad(v, *w)))
            .collect();
        format!("|{}|\n", cells.join("|"))
    };

    let mut out = border.clone();
    out.push_str(&line(cols.iter().map(String::as_str).collect()));
    out.push_str(&border);
    for r in 0..result.rows.len() {
        out.push_str(&line((0..cols.len()).map(|i| cell(result, r, i)).collect()));
    }
    out.push_str(&border);
    out
}

fn format_vertical(result: &ResultSet) -> String {
    let cols = &result.column_names;
    let name_width = cols.iter().map(|c| width(c)).max().unwrap_or(0);
    let mut out = String::new();
    for r in 0..result.rows.len() {
        out.push_str(&format!(
            "*************************** {}. row ***************************\n",
            r + 1
        ));
        for (i, col) in cols.iter().enumerate() {
            let padding = " ".repeat(name_width - width(col));
            out.push_str(&format!("{}{}: {}\n", padding, col, cell(result, r, i)));
        }
    }
    out
}

fn format_tab(result: &ResultSet) -> String {
    let mut out = result.column_names.join("\t");
    out.push('\n');
    for row in &result.rows {
        out.push_str(&row.columns.join("\t"));
        out.push('\n');
    }
    out
}

fn csv_field(v: &str) -> String {
    if v.contains(',') || v.contains('"') || v.contains('\n') {
        format!("\"{}\"", v.replace('"', "\"\""))
    } else {
        v.to_string()
    }
}

fn format_csv(result: &ResultSet) -> String {
    let header: Vec<String> = result.column_names.iter().map(|c| csv_field(c)).collect();
    let mut out = header.join(",");
    out.push('\n');
    for row in &result.rows {
        let vals: Vec<String> = row.columns.iter().map(|v| csv_field(v)).collect();
        out.push_str(&vals.join(","));
        out.push('\n');
    }
    out
}

fn format_json(result: &ResultSet) -> String {
    let rows: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let map: serde_json::Map<String, serde_json::Value> = result
                .column_names
                .iter()
                .zip(&row.columns)
                .map(|(c, v)| (c.clone(), serde_json::Value::String(v.clone())))
                .collect();
            serde_json::Value::Object(map)
        })
        .collect();
    let mut out =
        serde_json::to_string_pretty(&serde_json::Value::Array(rows)).unwrap_or_default();
    out.push('\n');
    out
}
