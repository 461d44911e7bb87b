use std::collections::HashMap;
use std::io;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::RwLock;

use crate::application::ports::{StagingStore, StagingStoreError};
use crate::domain::InputRef;

#[derive(Default)]
pub struct InMemoryStagingStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: &InputRef, data: impl Into<Bytes>) {
        self.objects
            .write()
            .await
            .insert(path.as_str().to_string(), data.into());
    }

    pub async fn contains(&self, path: &InputRef) -> bool {
        self.objects.read().await.contains_key(path.as_str())
    }
}

#[async_trait::async_trait]
impl StagingStore for InMemoryStagingStore {
    async fn store(
        &self,
        path: &InputRef,
        mut stream: BoxStream<'_, Result<Bytes, io::Error>>,
    ) -> Result<u64, StagingStoreError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        let size = buffer.len() as u64;
        self.insert(path, buffer.freeze()).await;
        Ok(size)
    }

    async fn fetch(&self, path: &InputRef) -> Result<Vec<u8>, StagingStoreError> {
        self.objects
            .read()
            .await
            .get(path.as_str())
            .map(|b| b.to_vec())
            .ok_or_else(|| StagingStoreError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &InputRef) -> Result<(), StagingStoreError> {
        self.objects.write().await.remove(path.as_str());
        Ok(())
    }

    async fn head(&self, path: &InputRef) -> Result<u64, StagingStoreError> {
        self.objects
            .read()
            .await
            .get(path.as_str())
            .map(|b| b.len() as u64)
            .ok_or_else(|| StagingStoreError::NotFound(path.to_string()))
    }
}
