use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config;

/// Print the effective settings for `workspace_root` as TOML.
pub fn show<W: Write>(workspace_root: &Path, out: &mut W) -> Result<()> {
    let settings = config::load(workspace_root)?;
    let text = toml::to_string(&settings).context("failed to serialize settings")?;
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prints_defaults_as_toml() {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        show(dir.path(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("poll_interval_ms = 5000"));
        assert!(text.contains("timeout_code = \"CodeGenTimeout\""));
        let parsed: config::Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config::Settings::default());
    }
}
