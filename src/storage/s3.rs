use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region, RequestChecksumCalculation},
    error::DisplayErrorContext,
    primitives::ByteStream as S3Body,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use crate::{
    errors::{AppError, Result},
    storage::{ByteStream, ObjectStorage},
};

/// Multipart chunk size; every part but the last is exactly this long.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// S3-compatible object storage (AWS S3, Cloudflare R2, MinIO).
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_host: String,
}

impl S3Storage {
    pub fn new(
        endpoint: Option<&str>,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_host: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .force_path_style(true);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            public_host: public_host.trim_end_matches('/').to_string(),
        }
    }

    async fn put_object(&self, key: &str, content_type: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(S3Body::from(body))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("PutObject {} failed: {}", key, DisplayErrorContext(&e))))?;

        Ok(())
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        mut buffer: BytesMut,
        mut body: ByteStream,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut exhausted = false;

        loop {
            while !exhausted && buffer.len() < PART_SIZE {
                match body.next().await {
                    Some(chunk) => buffer.extend_from_slice(&chunk.map_err(read_error)?),
                    None => exhausted = true,
                }
            }

            if buffer.is_empty() {
                break;
            }

            let part_len = buffer.len().min(PART_SIZE);
            let part = buffer.split_to(part_len).freeze();
            let part_number = parts.len() as i32 + 1;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(S3Body::from(part))
                .send()
                .await
                .map_err(|e| {
                    AppError::Storage(format!(
                        "UploadPart {} of {} failed: {}",
                        part_number,
                        key,
                        DisplayErrorContext(&e)
                    ))
                })?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );

            if exhausted && buffer.is_empty() {
                break;
            }
        }

        Ok(parts)
    }

    async fn multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        first_part: BytesMut,
        body: ByteStream,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!("CreateMultipartUpload {} failed: {}", key, DisplayErrorContext(&e)))
            })?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| AppError::Storage(format!("No upload id returned for {}", key)))?
            .to_string();

        let result = async {
            let parts = self.upload_parts(key, &upload_id, first_part, body).await?;

            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
                .send()
                .await
                .map_err(|e| {
                    AppError::Storage(format!(
                        "CompleteMultipartUpload {} failed: {}",
                        key,
                        DisplayErrorContext(&e)
                    ))
                })?;

            Ok::<(), AppError>(())
        }
        .await;

        if result.is_err() {
            if let Err(e) = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(key, "Failed to abort multipart upload: {}", DisplayErrorContext(&e));
            }
        }

        result
    }
}

fn read_error(e: std::io::Error) -> AppError {
    AppError::Storage(format!("Failed to read source image: {}", e))
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_stream(&self, key: &str, content_type: &str, mut body: ByteStream) -> Result<()> {
        let mut buffer = BytesMut::with_capacity(PART_SIZE);

        // Bodies that end within the first part go up in a single request.
        while buffer.len() < PART_SIZE {
            match body.next().await {
                Some(chunk) => buffer.extend_from_slice(&chunk.map_err(read_error)?),
                None => return self.put_object(key, content_type, buffer.freeze()).await,
            }
        }

        self.multipart_upload(key, content_type, buffer, body).await
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_host, key)
    }
}
