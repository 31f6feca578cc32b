//! Pipeline tuning: worker pool sizes, queue capacity, embedding knobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Parse pool size.
    #[serde(default = "default_cpu_workers")]
    pub cpu_workers: usize,
    /// Embed pool size.
    #[serde(default = "default_network_workers")]
    pub network_workers: usize,
    /// Save pool size.
    #[serde(default = "default_disk_workers")]
    pub disk_workers: usize,
    /// Capacity of each of the two inter-stage queues.
    #[serde(default = "default_queue_maxsize")]
    pub queue_maxsize: usize,
    /// Max articles per embed sub-task before scatter-gather kicks in.
    #[serde(default = "default_scatter_chunk_size")]
    pub scatter_chunk_size: usize,
    /// Bypass the embed stage entirely.
    #[serde(default)]
    pub skip_embeddings: bool,
    /// Use deterministic fake vectors instead of a real provider.
    #[serde(default)]
    pub simulate_embeddings: bool,
    /// Output embedding vector dimension.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Upper bound for a single provider batch call.
    #[serde(default = "default_embedding_batch_max")]
    pub embedding_batch_max: usize,
    /// Max retry attempts per embed batch on transient failure.
    #[serde(default = "default_embed_retries")]
    pub embed_retries: u32,
    /// Reference linker batch size.
    #[serde(default = "default_link_batch_size")]
    pub link_batch_size: usize,
}

const fn default_cpu_workers() -> usize {
    5
}
const fn default_network_workers() -> usize {
    20
}
const fn default_disk_workers() -> usize {
    2
}
const fn default_queue_maxsize() -> usize {
    50
}
const fn default_scatter_chunk_size() -> usize {
    500
}
const fn default_embedding_dim() -> usize {
    768
}
const fn default_embedding_batch_max() -> usize {
    100
}
const fn default_embed_retries() -> u32 {
    3
}
const fn default_link_batch_size() -> usize {
    5_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cpu_workers: default_cpu_workers(),
            network_workers: default_network_workers(),
            disk_workers: default_disk_workers(),
            queue_maxsize: default_queue_maxsize(),
            scatter_chunk_size: default_scatter_chunk_size(),
            skip_embeddings: false,
            simulate_embeddings: false,
            embedding_dim: default_embedding_dim(),
            embedding_batch_max: default_embedding_batch_max(),
            embed_retries: default_embed_retries(),
            link_batch_size: default_link_batch_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_table() {
        let config = PipelineConfig::default();
        assert_eq!(config.cpu_workers, 5);
        assert_eq!(config.network_workers, 20);
        assert_eq!(config.disk_workers, 2);
        assert_eq!(config.queue_maxsize, 50);
        assert_eq!(config.scatter_chunk_size, 500);
        assert_eq!(config.embedding_dim, 768);
        assert_eq!(config.embedding_batch_max, 100);
        assert_eq!(config.embed_retries, 3);
        assert_eq!(config.link_batch_size, 5_000);
        assert!(!config.skip_embeddings);
        assert!(!config.simulate_embeddings);
    }
}
