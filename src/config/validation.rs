use anyhow::{bail, Result};

use super::Config;

/// Check cross-field constraints the type system cannot express.
pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.max_tokens == 0 {
        bail!("chunking.maxTokens must be at least 1");
    }
    if chunking.overlap >= chunking.max_tokens {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.maxTokens ({})",
            chunking.overlap,
            chunking.max_tokens
        );
    }

    if let Some(0) = config.embedding.dimensions {
        bail!("embedding.dimensions must be at least 1");
    }

    if config.retrieval.context_budget == 0 {
        bail!("retrieval.contextBudget must be at least 1");
    }

    Ok(())
}
