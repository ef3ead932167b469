use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

/// Where a JSON document comes from.
#[derive(Debug, PartialEq, Eq)]
pub enum Source {
    /// `--input` given; relative paths are taken from the working directory
    File(PathBuf),
    /// Something piped on stdin
    Stdin,
    /// Interactive terminal, use the flags
    Flags,
}

impl Source {
    pub fn detect(path: Option<&str>) -> Self {
        match path {
            Some(p) => Source::File(PathBuf::from(p)),
            None if atty::is(atty::Stream::Stdin) => Source::Flags,
            None => Source::Stdin,
        }
    }

    /// Raw text of the document, `None` when there is none to read.
    fn text(&self) -> Result<Option<String>, Box<dyn std::error::Error>> {
        match self {
            Source::File(path) => fs::read_to_string(path)
                .map(Some)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e).into()),
            Source::Stdin => {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                Ok(Some(buffer))
            }
            Source::Flags => Ok(None),
        }
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<Option<T>, Box<dyn std::error::Error>> {
        let Some(text) = self.text()? else {
            return Ok(None);
        };
        let trimmed = text.trim();
        match self {
            // an empty pipe means the flags carry the terms
            Source::Stdin if trimmed.is_empty() => Ok(None),
            Source::File(path) => serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e).into()),
            _ => Ok(Some(serde_json::from_str(trimmed)?)),
        }
    }
}

/// A JSON document from `--input`, else from piped stdin, else `None` so the
/// caller falls back to individual flags.
pub fn document<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    Source::detect(path).parse()
}
