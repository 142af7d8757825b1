use serde::Deserialize;
use std::{
    ffi::OsString,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use crate::error::RemapError;

/// Name of the optional settings file looked up next to the project.
pub const CONFIG_FILE_NAME: &str = "refremap.toml";

/// Run settings. File values come from `refremap.toml` (or an explicit `--config`), command
/// line flags are OR-ed on top by the caller.
///
/// ```toml
/// backup_infix = "orgRefMap"
/// schematic_extension = "sch"
/// mapping_extension = "refRemap"
/// overwrite_backup = false
/// dry_run = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemapConfig {
    /// Project name without extension, e.g. `boards/amp` for `boards/amp.sch`.
    #[serde(skip)]
    pub project: PathBuf,
    pub backup_infix: String,
    pub schematic_extension: String,
    pub mapping_extension: String,
    pub overwrite_backup: bool,
    pub dry_run: bool,
}

impl Default for RemapConfig {
    fn default() -> Self {
        RemapConfig {
            project: PathBuf::new(),
            backup_infix: "orgRefMap".to_string(),
            schematic_extension: "sch".to_string(),
            mapping_extension: "refRemap".to_string(),
            overwrite_backup: false,
            dry_run: false,
        }
    }
}

impl RemapConfig {
    pub fn new(project: impl Into<PathBuf>) -> Self {
        RemapConfig {
            project: project.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(project: impl Into<PathBuf>, content: &str) -> Result<Self, RemapError> {
        let mut config: RemapConfig = toml::from_str(content)?;
        config.project = project.into();
        Ok(config)
    }

    pub fn from_toml_file(project: impl Into<PathBuf>, path: &Path) -> Result<Self, RemapError> {
        tracing::debug!("Attempting to read settings from: {:?}", path);
        if !path.exists() {
            return Err(RemapError::MissingInput(path.to_path_buf()));
        }
        let content = read_to_string(path)?;
        Self::from_toml_str(project, &content)
    }

    /// Settings for `project`, read from `refremap.toml` in the project directory when present.
    pub fn discover(project: impl Into<PathBuf>) -> Result<Self, RemapError> {
        let project = project.into();
        let candidate = project
            .parent()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if candidate.is_file() {
            Self::from_toml_file(project, &candidate)
        } else {
            tracing::debug!("No {} found, using defaults.", CONFIG_FILE_NAME);
            Ok(Self::new(project))
        }
    }

    /// `<project>.<schematic_extension>`
    pub fn schematic_path(&self) -> PathBuf {
        self.with_extension(&self.schematic_extension)
    }

    /// `<project>.<mapping_extension>`
    pub fn mapping_path(&self) -> PathBuf {
        self.with_extension(&self.mapping_extension)
    }

    // appended rather than set: project names may contain dots
    fn with_extension(&self, ext: &str) -> PathBuf {
        let mut name = OsString::from(self.project.as_os_str());
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_append_extensions() {
        let config = RemapConfig::new("boards/amp.v2");
        assert_eq!(config.schematic_path(), PathBuf::from("boards/amp.v2.sch"));
        assert_eq!(
            config.mapping_path(),
            PathBuf::from("boards/amp.v2.refRemap")
        );
    }

    #[test]
    fn toml_overrides_defaults() {
        let config =
            RemapConfig::from_toml_str("amp", "backup_infix = \"bak\"\ndry_run = true\n").unwrap();
        assert_eq!(config.backup_infix, "bak");
        assert!(config.dry_run);
        assert_eq!(config.schematic_extension, "sch");
        assert_eq!(config.project, PathBuf::from("amp"));
    }

    #[test]
    fn unknown_setting_is_a_config_error() {
        let err = RemapConfig::from_toml_str("amp", "colour = \"red\"\n").unwrap_err();
        assert!(matches!(err, RemapError::Config(_)), "{err:?}");
    }
}
