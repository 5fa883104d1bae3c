//! Config loading errors.

use super::FieldPath;
use owo_colors::OwoColorize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading `assetweave.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Validation(Problems),
}

/// A rejected setting.
#[derive(Debug, Clone)]
pub struct Problem {
    pub field: FieldPath,
    pub message: String,
    pub hint: Option<&'static str>,
}

/// Everything [`AssetConfig::validate`](crate::config::AssetConfig::validate)
/// rejected in one pass.
#[derive(Debug, Default)]
pub struct Problems(Vec<Problem>);

impl Problems {
    pub fn report(&mut self, field: FieldPath, message: impl Into<String>) {
        self.0.push(Problem {
            field,
            message: message.into(),
            hint: None,
        });
    }

    pub fn report_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: &'static str,
    ) {
        self.0.push(Problem {
            field,
            message: message.into(),
            hint: Some(hint),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(self))
        }
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "problem" } else { "problems" };
        write!(f, "{} {} {noun} in config", "invalid:".red().bold(), self.0.len())?;
        for problem in &self.0 {
            write!(f, "\n  {} {}", problem.field, problem.message)?;
            if let Some(hint) = problem.hint {
                write!(f, "\n    {} {hint}", "hint:".yellow())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_the_file() {
        let err = ConfigError::Io(
            PathBuf::from("assetweave.toml"),
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("assetweave.toml"));
    }

    #[test]
    fn test_problems_finish() {
        assert!(Problems::default().finish().is_ok());

        let mut problems = Problems::default();
        problems.report(FieldPath::new("paths.roots"), "empty");
        problems.report_with_hint(FieldPath::new("cache.dir"), "inside a root", "move it");
        assert_eq!(problems.len(), 2);

        let display = problems.to_string();
        assert!(display.contains("2 problems"));
        assert!(display.contains("paths.roots"));
        assert!(display.contains("move it"));
        assert!(matches!(problems.finish(), Err(ConfigError::Validation(_))));
    }
}
