// ABOUTME: Minimal dotenv-style file for handing the detected runtime to other processes.
// ABOUTME: Reads, merges and writes KEY="VALUE" lines with sorted keys.

use crate::runtime::DetectionOutcome;
use std::collections::BTreeMap;
use std::path::Path;

pub const CONTAINER_RUNTIME: &str = "CONTAINER_RUNTIME";
pub const CRI_ENDPOINT: &str = "CRI_ENDPOINT";

/// Key/value pairs of an env file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    vars: BTreeMap<String, String>,
}

impl EnvFile {
    /// Set the two keys describing a detected runtime, keeping every other key.
    pub fn record(&mut self, outcome: &DetectionOutcome) {
        self.set(CONTAINER_RUNTIME, outcome.kind.as_str());
        self.set(CRI_ENDPOINT, outcome.endpoint.as_str());
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Parse `KEY=VALUE` lines; values may be double or single quoted.
    /// Blank lines, `#` comments and lines without `=` are skipped.
    pub fn parse(content: &str) -> Self {
        let mut file = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            file.set(key, unquote(value.trim()));
        }
        file
    }

    /// One `KEY="VALUE"` line per key, sorted by key.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.vars {
            out.push_str(key);
            out.push_str("=\"");
            for c in value.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    c => out.push(c),
                }
            }
            out.push_str("\"\n");
        }
        out
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Like [`EnvFile::read`], but a missing file is an empty one.
    pub fn read_or_default(path: &Path) -> std::io::Result<Self> {
        match Self::read(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Replace the file at `path` with the rendered contents.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())
    }
}

fn unquote(value: &str) -> String {
    if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        out
    } else if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        inner.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sorted_quoted_lines() {
        let mut file = EnvFile::default();
        file.set(CRI_ENDPOINT, "unix:///var/run/docker.sock");
        file.set(CONTAINER_RUNTIME, "docker");
        assert_eq!(
            file.render(),
            "CONTAINER_RUNTIME=\"docker\"\nCRI_ENDPOINT=\"unix:///var/run/docker.sock\"\n"
        );
    }

    #[test]
    fn parse_skips_comments_and_unquotes() {
        let file = EnvFile::parse(
            "# written by keel\n\nA=\"x \\\"y\\\"\"\nexport B='z'\nC=plain\nnoise\n",
        );
        assert_eq!(file.get("A"), Some("x \"y\""));
        assert_eq!(file.get("B"), Some("z"));
        assert_eq!(file.get("C"), Some("plain"));
        assert_eq!(file.get("noise"), None);
    }

    #[test]
    fn rendered_output_parses_back() {
        let mut file = EnvFile::default();
        file.set("PATHISH", "C:\\tmp \"quoted\"\nnext");
        assert_eq!(EnvFile::parse(&file.render()), file);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = EnvFile::read_or_default(&dir.path().join("absent.env")).unwrap();
        assert_eq!(file, EnvFile::default());
    }

    #[test]
    fn record_keeps_unrelated_keys() {
        let mut file = EnvFile::parse("OTHER=\"1\"\nCONTAINER_RUNTIME=\"podman\"\n");
        let outcome = DetectionOutcome {
            kind: crate::runtime::RuntimeKind::Crio,
            endpoint: "unix:///var/run/crio/crio.sock".to_string(),
            selection: crate::runtime::Selection::Configured,
            warnings: Vec::new(),
        };
        file.record(&outcome);
        assert_eq!(file.get("OTHER"), Some("1"));
        assert_eq!(file.get(CONTAINER_RUNTIME), Some("crio"));
        assert_eq!(file.get(CRI_ENDPOINT), Some("unix:///var/run/crio/crio.sock"));
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".env");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "OLD=\"value\"\n").unwrap();

        let mut file = EnvFile::default();
        file.set(CONTAINER_RUNTIME, "crio");
        file.write(&path).unwrap();

        let back = EnvFile::read(&path).unwrap();
        assert_eq!(back.get("OLD"), None);
        assert_eq!(back.get(CONTAINER_RUNTIME), Some("crio"));
    }
}
