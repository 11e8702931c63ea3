use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::ProjectConfig;

pub fn load_project_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No project config found, using defaults");
        return Ok(ProjectConfig::default());
    }

    let yaml_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file from {}", path.display()))?;

    parse_project_config(&yaml_content)
        .with_context(|| format!("Failed to deserialize config from {}", path.display()))
}

pub fn parse_project_config(yaml_content: &str) -> Result<ProjectConfig> {
    // An empty document deserializes to unit, not a mapping
    if yaml_content.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    let config: ProjectConfig = serde_yaml::from_str(yaml_content)?;
    Ok(config)
}
