// src/core/config_manager.rs
//! Run configuration resolved from CLI flags, environment and an optional YAML file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::Cli;
use crate::core::FsOps;
use crate::job_analysis::description_fetcher::DEFAULT_MAX_RETRIES;
use crate::job_analysis::oracle::{DEFAULT_BASE_URL as DEFAULT_ORACLE_URL, DEFAULT_MODEL};
use crate::job_analysis::pipeline::{Pacing, PipelineSettings, DEFAULT_BASE_URL};
use crate::utils::split_list;

pub const DEFAULT_SEARCH_CATEGORIES: [&str; 6] = [
    "strategy",
    "project",
    "consultant",
    "business",
    "product",
    "marketing",
];

const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const DEFAULT_RESUME_PATH: &str = "resume.txt";
const DEFAULT_MAX_PAGES: u32 = 2;
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_LOGS_DIR: &str = "logs";

/// Keys accepted in the YAML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub resume_path: Option<PathBuf>,
    pub search_categories: Option<Vec<String>>,
    pub max_pages: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    pub max_retries: Option<u32>,
    pub oracle_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub oracle: OracleConfig,
    pub resume_path: PathBuf,
    pub search_categories: Vec<String>,
    pub max_pages: u32,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub base_url: String,
    pub max_retries: u32,
    pub no_delay: bool,
}

impl ConfigManager {
    /// Load configuration for this process: CLI > environment > file > defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = Self::load_file(cli.config.as_deref())?;
        Self::resolve(cli, file, |key| std::env::var(key).ok())
    }

    fn load_file(explicit: Option<&Path>) -> Result<FileConfig> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(FileConfig::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse_file(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse_file(content: &str) -> Result<FileConfig> {
        if content.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn resolve<E>(cli: &Cli, file: FileConfig, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let api_key = env("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable is required")?;

        let resume_path = cli
            .resume
            .clone()
            .or_else(|| env("RESUME_PATH").map(PathBuf::from))
            .or(file.resume_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESUME_PATH));
        if !resume_path.exists() {
            anyhow::bail!("Resume file not found at {}", resume_path.display());
        }

        let search_categories = cli
            .categories
            .as_deref()
            .map(split_list)
            .filter(|list| !list.is_empty())
            .or_else(|| env("SEARCH_CATEGORIES").map(|v| split_list(&v)).filter(|l| !l.is_empty()))
            .or(file.search_categories.filter(|list| !list.is_empty()))
            .unwrap_or_else(|| DEFAULT_SEARCH_CATEGORIES.iter().map(|c| c.to_string()).collect());

        let max_pages = match cli.max_pages {
            Some(pages) => pages,
            None => match env("MAX_PAGES") {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("MAX_PAGES must be a non-negative integer, got '{}'", value))?,
                None => file.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            },
        };

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| env("OUTPUT_DIR").map(PathBuf::from))
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let logs_dir = cli
            .logs_dir
            .clone()
            .or_else(|| env("LOGS_DIR").map(PathBuf::from))
            .or(file.logs_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR));

        let oracle = OracleConfig {
            api_key,
            base_url: env("OPENAI_BASE_URL")
                .or(file.oracle_url)
                .unwrap_or_else(|| DEFAULT_ORACLE_URL.to_string()),
            model: env("OPENAI_MODEL")
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        Ok(Self {
            oracle,
            resume_path,
            search_categories,
            max_pages,
            output_dir,
            logs_dir,
            base_url: file.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_retries: file.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            no_delay: cli.no_delay,
        })
    }

    pub async fn ensure_directories(&self) -> Result<()> {
        FsOps::ensure_dir_exists(&self.output_dir).await?;
        FsOps::ensure_dir_exists(&self.logs_dir).await?;
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let pacing = if self.no_delay {
            Pacing::none()
        } else {
            Pacing::default()
        };

        PipelineSettings::new(self.output_dir.clone())
            .with_base_url(self.base_url.clone())
            .with_max_retries(self.max_retries)
            .with_pacing(pacing)
    }

    pub fn log_summary(&self) {
        info!("Resume: {}", self.resume_path.display());
        info!("Categories: {}", self.search_categories.join(", "));
        info!("Max pages per category: {}", self.max_pages);
        info!("Output directory: {}", self.output_dir.display());
        info!("Listings site: {}", self.base_url);
        info!("Model: {}", self.oracle.model);
    }
}
