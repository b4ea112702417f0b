use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ArchitectureDesign, CoreError};

const DESIGN_SUFFIX: &str = ".design.json";
const BASELINE_SUFFIX: &str = ".baseline.json";

// --- Designs ---

/// Directory-backed storage for designs, their baselines and scan settings.
#[derive(Debug, Clone)]
pub struct DesignStore {
    root: PathBuf,
}

impl DesignStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$STACKMAP_HOME`, else `~/.stackmap/`.
    pub fn default_location() -> Self {
        let root = std::env::var_os("STACKMAP_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".stackmap")
            });
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn design_path(&self, name: &str) -> Result<PathBuf, CoreError> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}{}", name, DESIGN_SUFFIX)))
    }

    fn baseline_path(&self, name: &str) -> Result<PathBuf, CoreError> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}{}", name, BASELINE_SUFFIX)))
    }

    /// List all design names, sorted.
    pub fn list(&self) -> Result<Vec<String>, CoreError> {
        if !self.root.exists() {
            return Ok(vec![]);
        }
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(DESIGN_SUFFIX).map(|n| n.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn read(&self, name: &str) -> Result<ArchitectureDesign, CoreError> {
        let raw = fs::read_to_string(self.design_path(name)?)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Atomic write (temp file + rename), so readers never see a half-written design.
    pub fn write(&self, name: &str, design: &ArchitectureDesign) -> Result<(), CoreError> {
        let path = self.design_path(name)?;
        let json = serde_json::to_string_pretty(design)?;
        fs::create_dir_all(&self.root)?;
        let tmp = self.root.join(format!(".{}{}.tmp", name, DESIGN_SUFFIX));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete a design and its baseline. Missing files are not an error.
    pub fn delete(&self, name: &str) -> Result<(), CoreError> {
        for path in [self.design_path(name)?, self.baseline_path(name)?] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    // --- Baselines (for change tracking) ---

    pub fn save_baseline(&self, name: &str, design: &ArchitectureDesign) -> Result<(), CoreError> {
        let path = self.baseline_path(name)?;
        fs::create_dir_all(&self.root)?;
        fs::write(path, serde_json::to_string_pretty(design)?)?;
        Ok(())
    }

    /// Returns None if no baseline exists or it cannot be parsed.
    pub fn read_baseline(&self, name: &str) -> Option<ArchitectureDesign> {
        let raw = fs::read_to_string(self.baseline_path(name).ok()?).ok()?;
        serde_json::from_str(&raw).ok()
    }

    // --- Settings ---

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Stored scan settings; defaults when the file is missing or unreadable.
    pub fn read_settings(&self) -> ScanSettings {
        fs::read_to_string(self.settings_path())
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn write_settings(&self, settings: &ScanSettings) -> Result<(), CoreError> {
        fs::create_dir_all(&self.root)?;
        fs::write(
            self.settings_path(),
            serde_json::to_string_pretty(settings)?,
        )?;
        Ok(())
    }
}

/// Design names double as file stems.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Settings for the inventory scanner. The inference core takes none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanSettings {
    /// Region to scan; falls back to the CLI's configured region
    pub region: Option<String>,
    /// Named credentials profile
    pub profile: Option<String>,
    /// Path or name of the `aws` executable
    pub aws_binary: String,
    /// Upper bound for each CLI invocation
    pub command_timeout_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            aws_binary: "aws".to_string(),
            command_timeout_secs: 30,
        }
    }
}

impl ScanSettings {
    /// Call-time values win over stored ones.
    pub fn with_overrides(mut self, region: Option<String>, profile: Option<String>) -> Self {
        if region.is_some() {
            self.region = region;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        self
    }
}
