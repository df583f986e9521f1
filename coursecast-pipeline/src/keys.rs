//! Per-asset key material for AES-128 segment encryption
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use coursecast_types::{PipelineError, PipelineResult};
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key file name inside an asset's output directory.
pub const KEY_FILE: &str = "enc.key";
/// Transient encoder input; deleted after a successful encode.
pub const KEY_INFO_FILE: &str = "enc.keyinfo";
/// AES-128 key length in bytes.
pub const KEY_LEN: usize = 16;

/// One asset's symmetric key plus the ephemeral key-info descriptor the
/// encoder consumes. Exactly one key per asset; all renditions share it.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub key_path: PathBuf,
    pub keyinfo_path: PathBuf,
    /// 16-byte IV rendered as 32 hex characters.
    pub iv_hex: String,
}

impl KeyMaterial {
    /// Generate fresh key material under `output_dir`.
    ///
    /// Writes the 16-byte key file and the three-line key-info descriptor
    /// (key URI, key file path, IV) that `-hls_key_info_file` expects.
    pub fn generate(output_dir: &Path, key_uri: &str) -> PipelineResult<Self> {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);

        let mut iv = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut iv);
        let iv_hex = hex::encode(iv);

        let key_path = output_dir.join(KEY_FILE);
        let keyinfo_path = output_dir.join(KEY_INFO_FILE);

        fs::write(&key_path, key)?;
        let keyinfo = format!("{}\n{}\n{}\n", key_uri, key_path.display(), iv_hex);
        fs::write(&keyinfo_path, keyinfo)?;

        debug!(
            key_file = %key_path.display(),
            "Generated per-asset key material"
        );

        Ok(Self {
            key_path,
            keyinfo_path,
            iv_hex,
        })
    }

    /// Load existing key material, verifying the key-length invariant.
    pub fn verify_key_file(output_dir: &Path) -> PipelineResult<()> {
        let key_path = output_dir.join(KEY_FILE);
        let meta = fs::metadata(&key_path).map_err(|_| {
            PipelineError::OutputVerificationFailed(format!(
                "key file missing: {}",
                key_path.display()
            ))
        })?;
        if meta.len() != KEY_LEN as u64 {
            return Err(PipelineError::OutputVerificationFailed(format!(
                "key file is {} bytes, expected {}",
                meta.len(),
                KEY_LEN
            )));
        }
        Ok(())
    }

    /// Remove the key-info descriptor. It binds the key file to an encode
    /// run and must not outlive it.
    pub fn discard_keyinfo(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.keyinfo_path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generate_writes_16_byte_key_and_descriptor() {
        let dir = TempDir::new().unwrap();
        let material = KeyMaterial::generate(dir.path(), "/videos/42/key").unwrap();

        let key = fs::read(&material.key_path).unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert_eq!(material.iv_hex.len(), 32);
        assert!(material.iv_hex.chars().all(|c| c.is_ascii_hexdigit()));

        let keyinfo = fs::read_to_string(&material.keyinfo_path).unwrap();
        let lines: Vec<&str> = keyinfo.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "/videos/42/key");
        assert!(lines[1].ends_with(KEY_FILE));
        assert_eq!(lines[2], material.iv_hex);

        KeyMaterial::verify_key_file(dir.path()).unwrap();
    }

    #[test]
    fn discard_keyinfo_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let material = KeyMaterial::generate(dir.path(), "key").unwrap();
        material.discard_keyinfo().unwrap();
        assert!(!material.keyinfo_path.exists());
        // A second discard must not fail.
        material.discard_keyinfo().unwrap();
    }

    #[test]
    fn verify_rejects_truncated_key() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(KEY_FILE), [0u8; 8]).unwrap();
        assert!(KeyMaterial::verify_key_file(dir.path()).is_err());
    }
}
