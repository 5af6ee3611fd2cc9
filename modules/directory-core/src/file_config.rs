use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// TOML-backed tuning knobs. Every section is optional and falls back to
/// [`Default`], so an empty file (or no file) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub database: DatabaseConfig,
    pub allocator: AllocatorConfig,
    pub ranking: RankingConfig,
    pub proximity: ProximityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AllocatorConfig {
    /// Numeric suffixes tried (`-2`, `-3`, ...) before switching to the
    /// sequence-disambiguated slug.
    pub max_slug_probes: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self { max_slug_probes: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RankingConfig {
    pub default_limit: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProximityConfig {
    pub default_radius_miles: f64,
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            default_radius_miles: 25.0,
            default_limit: 50,
            max_limit: 500,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.allocator.max_slug_probes, 50);
        assert_eq!(config.proximity.default_limit, 50);
        assert_eq!(config.proximity.max_limit, 500);
        assert_eq!(config.ranking.default_limit, 100);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            [proximity]
            default_radius_miles = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.proximity.default_radius_miles, 10.0);
        assert_eq!(config.proximity.default_limit, 50);
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("[allocator]\nmax_probes = 3\n").is_err());
    }

    #[test]
    fn load_config_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[allocator]\nmax_slug_probes = 7").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.allocator.max_slug_probes, 7);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/directory.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/directory.toml"));
    }
}
