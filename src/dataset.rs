//! Crawled-dataset payload consumed read-only by the list views.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUrl {
    pub url: String,
    pub rank: f64,
    pub in_degree: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlDataset {
    pub total_urls_crawled: u64,
    #[serde(default)]
    pub data: Vec<RankedUrl>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl CrawlDataset {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read dataset {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid dataset {}", path.display()))
    }

    // Most linked-to pages first; ties keep payload order
    pub fn ranking(&self) -> Vec<&RankedUrl> {
        let mut sorted: Vec<&RankedUrl> = self.data.iter().collect();
        sorted.sort_by(|a, b| b.in_degree.cmp(&a.in_degree));
        sorted
    }

    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.blacklist.iter().any(|b| b == url)
    }
}
