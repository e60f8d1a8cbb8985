use super::{read_error, RawDocument, TextSource};
use async_trait::async_trait;
use fable_core::AppResult;

/// Reads a UTF-8 text file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

#[async_trait]
impl TextSource for PlainTextSource {
    fn name(&self) -> &str {
        "text"
    }

    async fn extract(&self, location: &str) -> AppResult<RawDocument> {
        let bytes = tokio::fs::read(location)
            .await
            .map_err(|e| read_error(location, e.to_string()))?;

        let text = String::from_utf8(bytes)
            .map_err(|e| read_error(location, format!("not valid UTF-8: {}", e)))?;

        Ok(RawDocument::new(location, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_utf8_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nota.txt");
        std::fs::write(&path, "El río crece.\n").unwrap();

        let location = path.to_str().unwrap();
        let doc = PlainTextSource.extract(location).await.unwrap();
        assert_eq!(doc.source_id, location);
        assert_eq!(doc.text, "El río crece.\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_source_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [0x52, 0xED, 0x6F]).unwrap();

        let err = PlainTextSource
            .extract(path.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "source_read");
        assert!(err.to_string().contains("UTF-8"));
    }
}
