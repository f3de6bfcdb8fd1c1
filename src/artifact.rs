use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Model artifact bytes with their integrity fingerprint.
///
/// The fingerprint is a hex SHA-256 of the raw file. When an expected digest is
/// configured the artifact is refused on mismatch, so a swapped or truncated
/// model file fails startup instead of silently scoring customers.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    /// Raw artifact contents.
    pub bytes: Vec<u8>,
    /// SHA-256 checksum of the contents (hex encoded).
    pub checksum: String,
}

impl ModelArtifact {
    /// Wraps artifact bytes and computes their checksum.
    pub fn new(bytes: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&bytes);
        Self { bytes, checksum }
    }

    /// Reads an artifact from disk, verifying it against `expected_sha256` if given.
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let artifact = Self::new(bytes);

        if let Some(expected) = expected_sha256 {
            if !artifact.matches(expected) {
                tracing::error!(
                    "Model artifact checksum mismatch. Expected: {}, computed: {}",
                    expected,
                    artifact.checksum
                );
                anyhow::bail!(
                    "Model artifact {} does not match MODEL_SHA256",
                    path.display()
                );
            }
            tracing::info!("Model artifact checksum verified");
        }

        Ok(artifact)
    }

    /// Computes SHA-256 checksum of the data
    fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Returns true if the checksum matches `expected` (hex, case-insensitive).
    pub fn matches(&self, expected: &str) -> bool {
        self.checksum.eq_ignore_ascii_case(expected.trim())
    }

    /// Short form of the checksum for logs and health output.
    pub fn short_fingerprint(&self) -> &str {
        &self.checksum[..12]
    }
}
