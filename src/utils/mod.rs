pub mod table {
    // Helper to render a separator line
    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    // Helper to render a row line
    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (i, cell) in cells.iter().enumerate() {
            let w = widths[i];
            let len = cell.chars().count();
            s.push(' ');
            s.push_str(cell);
            if len < w {
                s.push_str(&" ".repeat(w - len));
            }
            s.push(' ');
            s.push('|');
        }
        s
    }

    // Render a simple ASCII table given headers and rows
    #[must_use]
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (c, w) in widths.iter_mut().enumerate().take(cols) {
                *w = (*w).max(row.get(c).map_or(0, |s| s.chars().count()));
            }
        }

        let mut out = String::new();
        out.push_str(&sep(&widths));
        out.push('\n');
        let header_cells: Vec<String> = headers.iter().map(|s| (*s).to_string()).collect();
        out.push_str(&line(&header_cells, &widths));
        out.push('\n');
        out.push_str(&sep(&widths));
        out.push('\n');
        for row in rows {
            let mut cells = Vec::with_capacity(cols);
            for i in 0..cols {
                cells.push(row.get(i).cloned().unwrap_or_default());
            }
            out.push_str(&line(&cells, &widths));
            out.push('\n');
        }
        out.push_str(&sep(&widths));
        out
    }
}

/// Minimal RFC 4180 style reading and writing for the score matrix.
pub mod csv {
    use crate::errors::SrcTagError;

    fn needs_quotes(field: &str) -> bool {
        field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) || field.starts_with(' ') || field.ends_with(' ')
    }

    /// Append one record terminated by `\n`.
    pub fn write_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let f = field.as_ref();
            if needs_quotes(f) {
                out.push('"');
                out.push_str(&f.replace('"', "\"\""));
                out.push('"');
            } else {
                out.push_str(f);
            }
        }
        out.push('\n');
    }

    /// Split `text` into records, each tagged with the 1-based line it starts on.
    /// Blank lines are skipped and a leading UTF-8 BOM is ignored.
    ///
    /// # Errors
    /// Returns `SrcTagError::Csv` on an unterminated quoted field or stray characters after a closing quote.
    pub fn parse(text: &str) -> Result<Vec<(usize, Vec<String>)>, SrcTagError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records: Vec<(usize, Vec<String>)> = Vec::new();
        let mut fields: Vec<String> = Vec::new();
        let mut field = String::new();
        let mut line = 1usize;
        let mut record_line = 1usize;
        let mut in_quotes = false;
        let mut after_quote = false;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => {
                        in_quotes = false;
                        after_quote = true;
                    }
                    '\n' => {
                        line += 1;
                        field.push(c);
                    }
                    _ => field.push(c),
                }
                continue;
            }
            match c {
                ',' => {
                    fields.push(std::mem::take(&mut field));
                    after_quote = false;
                }
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' => {
                    fields.push(std::mem::take(&mut field));
                    if !(fields.len() == 1 && fields[0].is_empty()) {
                        records.push((record_line, std::mem::take(&mut fields)));
                    }
                    fields.clear();
                    after_quote = false;
                    line += 1;
                    record_line = line;
                }
                '"' if field.is_empty() && !after_quote => in_quotes = true,
                _ if after_quote => {
                    return Err(SrcTagError::Csv {
                        line,
                        message: format!("unexpected `{c}` after closing quote"),
                    });
                }
                _ => field.push(c),
            }
        }
        if in_quotes {
            return Err(SrcTagError::Csv { line: record_line, message: "unterminated quoted field".into() });
        }
        if !field.is_empty() || !fields.is_empty() || after_quote {
            fields.push(field);
            records.push((record_line, fields));
        }
        Ok(records)
    }
}

pub mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::collector::CollectorConfig;
    use crate::errors::{ConfigError, SrcTagError};
    use crate::index::storage::StorageConfig;
    use crate::tagger::TaggerConfig;

    pub const DEFAULT_CONFIG_NAME: &str = "srctag.toml";

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct DotConfig {
        pub legend: Option<bool>,
        pub theme: Option<String>,   // "light" | "dark"
        pub rankdir: Option<String>, // "LR" | "TB"
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct Config {
        pub collector: Option<CollectorConfig>,
        pub storage: Option<StorageConfig>,
        pub tagger: Option<TaggerConfig>,
        pub dot: Option<DotConfig>,
    }

    fn default_config_path(root: &Path) -> PathBuf {
        root.join(DEFAULT_CONFIG_NAME)
    }

    /// Parse the TOML file at `path`.
    ///
    /// # Errors
    /// Returns `SrcTagError::Io` if the file cannot be read and
    /// `ConfigError::Toml` if it is not a valid configuration.
    pub fn load_config_at(path: &Path) -> Result<Config, SrcTagError> {
        let data = fs::read_to_string(path)?;
        toml::from_str::<Config>(&data).map_err(|e| {
            SrcTagError::Config(ConfigError::Toml { path: path.to_path_buf(), message: e.to_string() })
        })
    }

    /// Load `srctag.toml` from `root` when present.
    ///
    /// # Errors
    /// Returns `SrcTagError` if the file exists but cannot be parsed.
    pub fn load_config_near(root: &Path) -> Result<Option<Config>, SrcTagError> {
        let p = default_config_path(root);
        if p.exists() {
            load_config_at(&p).map(Some)
        } else {
            Ok(None)
        }
    }
}
