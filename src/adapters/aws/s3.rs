use crate::ports::storage::{object_address, ObjectKind, StoragePort};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use std::error::Error;
use std::path::Path;
use tracing::debug;

/// `DeleteObjects` accepts at most this many keys per request.
const DELETE_BATCH: usize = 1000;

/// S3Adapter implements StoragePort for AWS S3.
#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Adapter {
    pub fn new(client: Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }
        Ok(keys)
    }
}

fn folder_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

#[async_trait]
impl StoragePort for S3Adapter {
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        kind: ObjectKind,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let body = tokio::fs::read(local_path).await?;
        let byte_stream = ByteStream::from(body);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(kind.object_name(key))
            .content_type(kind.content_type())
            .body(byte_stream)
            .send()
            .await?;
        Ok(object_address(&self.public_base_url, key, kind))
    }

    async fn delete_prefix(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let keys: Vec<String> = self
            .list_keys(&folder_prefix(prefix))
            .await?
            .into_iter()
            .filter(|key| key.ends_with(kind.extension()))
            .collect();

        for batch in keys.chunks(DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()?;

            let resp = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await?;

            if let Some(failed) = resp.errors().first() {
                return Err(format!(
                    "could not delete {}: {}",
                    failed.key().unwrap_or_default(),
                    failed.message().unwrap_or_default()
                )
                .into());
            }
            debug!("Deleted {} objects under {}", batch.len(), prefix);
        }
        Ok(())
    }

    async fn delete_folder(&self, prefix: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let marker = folder_prefix(prefix);
        let remaining: Vec<String> = self
            .list_keys(&marker)
            .await?
            .into_iter()
            .filter(|key| *key != marker)
            .collect();
        if let Some(key) = remaining.first() {
            return Err(format!("folder {} still holds {}", prefix, key).into());
        }

        // S3 has no directories; this drops the console-style marker if one exists.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(marker)
            .send()
            .await?;
        Ok(())
    }
}
