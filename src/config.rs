use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::io::{DEFAULT_BUFFER_CAPACITY, DEFAULT_READ_CHUNK, DEFAULT_SINK_HIGH_WATER, MAX_BUFFER_CAPACITY};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Directory holding the packaged resources.
    pub resources: PathBuf,
    /// Logical name of the resource to copy.
    pub resource: String,
    pub extension: String,
    pub io_params: IoParams,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            resources: PathBuf::from("resources"),
            resource: "Alamofire".to_string(),
            extension: "md".to_string(),
            io_params: IoParams::default(),
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let s = tokio::fs::read(path)
            .await
            .with_context(|| format!("read file {}", path))?;
        let s = String::from_utf8(s).context("parse utf8")?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: Config = serde_yaml_ng::from_str(s).context("parse yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource.is_empty() {
            bail!("resource name must not be empty");
        }
        self.io_params.validate()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IoParams {
    /// Transfer buffer capacity used per read call.
    pub buffer_size: usize,
    /// Bytes the sink accepts ahead of the writer.
    pub sink_high_water: usize,
    /// Bytes pulled from the source per readiness poll.
    pub read_chunk: usize,
    /// Append to the output instead of truncating it.
    pub append: bool,
}

impl Default for IoParams {
    fn default() -> Self {
        IoParams {
            buffer_size: DEFAULT_BUFFER_CAPACITY,
            sink_high_water: DEFAULT_SINK_HIGH_WATER,
            read_chunk: DEFAULT_READ_CHUNK,
            append: true,
        }
    }
}

impl IoParams {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        IoParams {
            buffer_size,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_CAPACITY {
            bail!(
                "bufferSize must be between 1 and {}, got {}",
                MAX_BUFFER_CAPACITY,
                self.buffer_size
            );
        }
        if self.sink_high_water == 0 {
            bail!("sinkHighWater must be positive");
        }
        if self.read_chunk == 0 {
            bail!("readChunk must be positive");
        }
        Ok(())
    }
}
