/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! artifact upload/download. The production adapter rides on
//! `odin_common::s3` (already a workspace dependency behind the `s3` feature, used elsewhere
//! in the pack for read-side object listing/download); we add the write-side `put_object`
//! call `odin_common::s3` doesn't need for its own read-only use cases.

use crate::errors::{op_failed, Result};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// uploads `local_path` under `dest_prefix` and returns a public HTTPS URI suitable for
    /// notification payloads.
    async fn copy_file(&self, local_path: &Path, dest_prefix: &str) -> Result<String>;

    async fn download_bucket_file(&self, bucket: &str, name: &str, local_path: &Path) -> Result<()>;
}

#[cfg(feature = "s3")]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

#[cfg(feature = "s3")]
impl S3BlobStore {
    pub async fn new(region: String, bucket: String, public_base_url: String) -> Result<Self> {
        let client = odin_common::s3::create_s3_client(region).await.map_err(|e| op_failed(e))?;
        Ok(S3BlobStore { client, bucket, public_base_url })
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl BlobStore for S3BlobStore {
    async fn copy_file(&self, local_path: &Path, dest_prefix: &str) -> Result<String> {
        let file_name = local_path.file_name()
        .ok_or_else(|| op_failed("local path has no file name"))?
        .to_string_lossy().to_string();
        let key = format!("{}/{}", dest_prefix.trim_end_matches('/'), file_name);

        let body = aws_sdk_s3::primitives::ByteStream::from_path(local_path).await.map_err(|e| op_failed(e))?;
        self.client.put_object()
        .bucket(&self.bucket)
        .key(&key)
        .body(body)
        .send().await
        .map_err(|e| op_failed(e))?;

        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), key))
    }

    async fn download_bucket_file(&self, bucket: &str, name: &str, local_path: &Path) -> Result<()> {
        let object = self.client.get_object().bucket(bucket).key(name).send().await.map_err(|e| op_failed(e))?;
        let data = object.body.collect().await.map_err(|e| op_failed(e))?;
        tokio::fs::write(local_path, data.into_bytes()).await?;
        Ok(())
    }
}

/// local-filesystem test double: "uploads" by copying into a directory and returning a
/// `file://` URI, "downloads" are no-ops that just touch the destination.
pub struct LocalBlobStore {
    root: std::path::PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self { LocalBlobStore { root: root.into() } }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn copy_file(&self, local_path: &Path, dest_prefix: &str) -> Result<String> {
        let file_name = local_path.file_name()
        .ok_or_else(|| op_failed("local path has no file name"))?;
        let dest_dir = self.root.join(dest_prefix);
        tokio::fs::create_dir_all(&dest_dir).await?;
        let dest_path = dest_dir.join(file_name);
        tokio::fs::copy(local_path, &dest_path).await?;
        Ok(format!("file://{}", dest_path.display()))
    }

    async fn download_bucket_file(&self, _bucket: &str, name: &str, local_path: &Path) -> Result<()> {
        let source = self.root.join(name);
        tokio::fs::copy(&source, local_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_blob_store_round_trips() {
        let dir = std::env::temp_dir().join(format!("odin_firecam_blob_test_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let src = dir.join("source.jpg");
        tokio::fs::write(&src, b"hello").await.unwrap();

        let store = LocalBlobStore::new(dir.join("blobs"));
        let uri = store.copy_file(&src, "2026-07-28").await.unwrap();
        assert!(uri.starts_with("file://"));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
