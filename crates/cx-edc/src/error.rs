use cx_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum EdcError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{step} request to {url} failed: {source}")]
    Transport {
        step: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}
