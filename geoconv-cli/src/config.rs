//! Preprocessing configuration: JSON file defaults, command line overrides.

use crate::CliError;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SUMMARY: &str = "preprocess.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub n_radial: usize,
    pub n_angular: usize,
    /// Neighbour whose distance bounds each GPC system.
    pub kth_neighbor: usize,
    /// Template radius relative to the mean `kth_neighbor` distance.
    pub template_scale: f32,
    /// Neighbours used for local reference frames of point clouds.
    pub lrf_neighbors: usize,
    /// Worker threads, 0 for one per core.
    pub processes: usize,
    pub output: PathBuf,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            n_radial: 5,
            n_angular: 8,
            kth_neighbor: 20,
            template_scale: 1.0,
            lrf_neighbors: 30,
            processes: 0,
            output: PathBuf::from("preprocessed"),
        }
    }
}

impl PreprocessConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        if self.n_radial == 0 || self.n_angular == 0 {
            return Err(CliError::InvalidConfig(format!(
                "template needs at least one point, got {}x{}",
                self.n_radial, self.n_angular
            )));
        }
        if self.kth_neighbor == 0 || self.lrf_neighbors == 0 {
            return Err(CliError::InvalidConfig(
                "neighbour counts must be positive".to_string(),
            ));
        }
        if !(self.template_scale.is_finite() && self.template_scale > 0.0) {
            return Err(CliError::InvalidConfig(format!(
                "template_scale must be positive, got {}",
                self.template_scale
            )));
        }
        Ok(())
    }

    pub fn gpc_dir(&self) -> PathBuf {
        self.output.join("gpc")
    }

    pub fn barycentric_stem(&self) -> PathBuf {
        self.output
            .join(format!("barycentric_{}x{}", self.n_radial, self.n_angular))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output.join(SUMMARY)
    }
}

/// Settings shared by every preprocessing command.
#[derive(Args, Debug, Clone, Default)]
pub struct PreprocessArgs {
    /// Path to the PLY mesh or point cloud
    #[arg(short, long)]
    pub mesh: PathBuf,

    /// JSON file with preprocessing settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub n_radial: Option<usize>,

    #[arg(long)]
    pub n_angular: Option<usize>,

    #[arg(long)]
    pub kth_neighbor: Option<usize>,

    #[arg(long)]
    pub template_scale: Option<f32>,

    #[arg(long)]
    pub lrf_neighbors: Option<usize>,

    #[arg(short, long)]
    pub processes: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl PreprocessArgs {
    /// The config file (or defaults) with command line values on top.
    pub fn resolve(&self) -> Result<PreprocessConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => PreprocessConfig::load(path)?,
            None => PreprocessConfig::default(),
        };
        if let Some(v) = self.n_radial {
            config.n_radial = v;
        }
        if let Some(v) = self.n_angular {
            config.n_angular = v;
        }
        if let Some(v) = self.kth_neighbor {
            config.kth_neighbor = v;
        }
        if let Some(v) = self.template_scale {
            config.template_scale = v;
        }
        if let Some(v) = self.lrf_neighbors {
            config.lrf_neighbors = v;
        }
        if let Some(v) = self.processes {
            config.processes = v;
        }
        if let Some(v) = &self.output {
            config.output = v.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Written next to the outputs so later commands reuse the same radii.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSummary {
    pub vertex_count: usize,
    pub template_radius: f32,
    pub config: PreprocessConfig,
}

impl PreprocessSummary {
    pub fn save(&self) -> Result<(), CliError> {
        fs::create_dir_all(&self.config.output)?;
        fs::write(self.config.summary_path(), serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// The summary under `config.output`, if one was written.
    pub fn load(config: &PreprocessConfig) -> Result<Option<Self>, CliError> {
        let path = config.summary_path();
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: PreprocessConfig = serde_json::from_str(r#"{"n_radial": 3}"#).unwrap();
        assert_eq!(config.n_radial, 3);
        assert_eq!(config.n_angular, PreprocessConfig::default().n_angular);
    }

    #[test]
    fn test_command_line_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"n_angular": 12, "kth_neighbor": 4}"#).unwrap();

        let args = PreprocessArgs {
            config: Some(path),
            kth_neighbor: Some(6),
            output: Some(dir.path().join("out")),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.n_angular, 12);
        assert_eq!(config.kth_neighbor, 6);
        assert_eq!(config.gpc_dir(), dir.path().join("out").join("gpc"));
        assert_eq!(
            config.barycentric_stem(),
            dir.path().join("out").join("barycentric_5x12")
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let args = PreprocessArgs {
            template_scale: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(args.resolve(), Err(CliError::InvalidConfig(_))));

        let args = PreprocessArgs {
            n_angular: Some(0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_summary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = PreprocessConfig {
            output: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(PreprocessSummary::load(&config).unwrap().is_none());

        let summary = PreprocessSummary {
            vertex_count: 10,
            template_radius: 0.25,
            config: config.clone(),
        };
        summary.save().unwrap();
        assert_eq!(PreprocessSummary::load(&config).unwrap(), Some(summary));
    }
}
