use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::{
    errors::{AppError, Result},
    storage::{ByteStream, ObjectStorage},
};

pub struct LocalStorage {
    base_path: PathBuf,
    public_host: String,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P, public_host: &str) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self {
            base_path,
            public_host: public_host.trim_end_matches('/').to_string(),
        })
    }

    /// Keys are stored under their percent-decoded name, the same path a
    /// static file server resolves the public URL to.
    fn get_full_path(&self, key: &str) -> Result<PathBuf> {
        let decoded = urlencoding::decode(key)
            .map_err(|e| AppError::Storage(format!("Invalid object key {}: {}", key, e)))?;

        if decoded
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\'))
        {
            return Err(AppError::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.base_path.join(&*decoded))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put_stream(&self, key: &str, _content_type: &str, body: ByteStream) -> Result<()> {
        let full_path = self.get_full_path(key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let mut file = fs::File::create(&full_path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create file: {}", e)))?;

        let mut reader = StreamReader::new(body);
        tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to flush file: {}", e)))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_host, key)
    }
}
