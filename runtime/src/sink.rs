use std::{
    path::Path,
    pin::Pin,
    sync::Arc,
};

use tokio::{
    io::{
        AsyncWrite,
        AsyncWriteExt,
    },
    sync::Mutex,
};

/// Append-only destination for spacecraft chatter and rendered responses.
///
/// Cloning shares the underlying writer.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Pin<Box<dyn AsyncWrite + Send>>>>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

impl LogSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::pin(writer))),
        }
    }

    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()), err(Display))]
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;

        Ok(Self::new(file))
    }

    pub async fn append(&self, data: &[u8]) -> std::io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut writer = self.inner.lock().await;
        writer.write_all(data).await?;
        writer.flush().await
    }
}
