use std::fmt;
use std::str::FromStr;

use crate::error::CliError;

/// Coordinates of one database: `projects/{p}/instances/{i}/databases/{d}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabasePath {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl DatabasePath {
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }

    /// Same project and instance, different database (used by `USE`).
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            project: self.project.clone(),
            instance: self.instance.clone(),
            database: database.into(),
        }
    }

    /// `projects/{p}/instances/{i}`
    pub fn instance_path(&self) -> String {
        format!("projects/{}/instances/{}", self.project, self.instance)
    }
}

impl fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/databases/{}", self.instance_path(), self.database)
    }
}

impl FromStr for DatabasePath {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            ["projects", p, "instances", i, "databases", d]
                if !p.is_empty() && !i.is_empty() && !d.is_empty() =>
            {
                Ok(Self::new(*p, *i, *d))
            }
            _ => Err(CliError::Config(format!("malformed database path: {}", s))),
        }
    }
}
