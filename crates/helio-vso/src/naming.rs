//! Destination paths for downloaded files.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::response::Record;

static DISPOSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'[^']*')?"?([^";]+)"?"#).unwrap());

/// File name announced in a `Content-Disposition` header value.
pub fn disposition_filename(header: &str) -> Option<String> {
    let raw = DISPOSITION.captures(header)?.get(1)?.as_str().trim();
    let name = Path::new(raw).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Resolves a path template such as `"{source}/{instrument}/{file}"` for one
/// record.
///
/// `{file}` is the downloaded file's name; any other placeholder names a
/// record field, with dots for nested fields (`{time.start}`,
/// `{extent.type}`). `{{` and `}}` are literal braces.
#[derive(Debug, Clone)]
pub struct FileNamer {
    template: String,
    fileid:   String,
    fields:   Json,
}

impl FileNamer {
    pub fn new(template: impl Into<String>, record: &Record) -> Result<Self> {
        Ok(Self {
            template: template.into(),
            fileid:   record.fileid.clone(),
            fields:   serde_json::to_value(record)?,
        })
    }

    /// Name of the file: the announced name, else the last URL segment, else
    /// the file id with `/` replaced by `_`.
    pub fn file_name(&self, disposition: Option<&str>, url: &str) -> String {
        if let Some(name) = disposition.and_then(disposition_filename) {
            return name;
        }
        let path = url.split(['?', '#']).next().unwrap_or_default();
        match path.trim_end_matches('/').rsplit('/').next() {
            Some(segment) if !segment.is_empty() && !segment.contains(':') => segment.to_string(),
            _ => self.fileid.replace('/', "_"),
        }
    }

    pub fn resolve(&self, disposition: Option<&str>, url: &str) -> Result<PathBuf> {
        self.render(&self.file_name(disposition, url)).map(PathBuf::from)
    }

    fn lookup(&self, name: &str, file: &str) -> Option<String> {
        if name == "file" {
            return Some(file.to_string());
        }
        let value = name
            .split('.')
            .try_fold(&self.fields, |node, segment| node.get(segment))?;
        match value {
            Json::String(s) => Some(s.clone()),
            Json::Number(n) => Some(n.to_string()),
            Json::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn render(&self, file: &str) -> Result<String> {
        let error = |reason: String| Error::Template {
            template: self.template.clone(),
            reason,
        };

        let mut out = String::with_capacity(self.template.len() + file.len());
        let mut chars = self.template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(error("unclosed placeholder".into())),
                        }
                    }
                    let value = self
                        .lookup(name.trim(), file)
                        .ok_or_else(|| error(format!("unknown field {name:?}")))?;
                    out.push_str(&value);
                }
                '}' => return Err(error("unmatched '}'".into())),
                c => out.push(c),
            }
        }
        Ok(out)
    }
}
