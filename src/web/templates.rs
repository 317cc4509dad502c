//! Viewer page templates
//!
//! Pages are plain HTML with `${NAME}` placeholders, loaded from the assets
//! directory once at startup; unknown placeholders are left untouched.

use std::path::Path;

use crate::error::Result;

/// A loaded page template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Substitute `${KEY}` placeholders.
    pub fn render(&self, vars: &[(&str, String)]) -> String {
        let mut out = self.source.clone();
        for (key, value) in vars {
            out = out.replace(&format!("${{{key}}}"), value);
        }
        out
    }
}

/// Everything the control plane serves from disk.
#[derive(Debug, Clone)]
pub struct PageTemplates {
    pub index: Template,
    pub history: Template,
    pub player_script: String,
}

impl PageTemplates {
    /// Load the viewer page, history page and player script from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            index: Template::new(std::fs::read_to_string(dir.join("index.html"))?),
            history: Template::new(std::fs::read_to_string(dir.join("history.html"))?),
            player_script: std::fs::read_to_string(dir.join("jsmpg.js"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders() {
        let tpl = Template::new("<body bgcolor=\"${BGCOLOR}\">${WIDTH}x${HEIGHT}</body>");
        let out = tpl.render(&[
            ("BGCOLOR", "#333".to_string()),
            ("WIDTH", "640".to_string()),
            ("HEIGHT", "480".to_string()),
        ]);
        assert_eq!(out, "<body bgcolor=\"#333\">640x480</body>");
    }

    #[test]
    fn unknown_placeholders_survive() {
        let tpl = Template::new("${KNOWN} ${UNKNOWN}");
        let out = tpl.render(&[("KNOWN", "yes".to_string())]);
        assert_eq!(out, "yes ${UNKNOWN}");
    }
}
