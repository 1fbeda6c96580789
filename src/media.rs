use std::path::PathBuf;

use uuid::Uuid;

use crate::{
    constants::MEDIA_PREFIX,
    error::{Error, ErrorKind, TypeError},
    form::UploadedFile,
};

/// File extension of a supported image, recognised by its leading bytes.
pub fn detect_image_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        Some("png")
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// Public URL of a stored media path.
pub fn media_url(domain: &str, path: &str) -> String {
    format!("{domain}/{MEDIA_PREFIX}/{path}")
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes an uploaded image under `folder` and returns its relative path.
    pub async fn save_image(
        &self,
        field: &str,
        folder: &str,
        file: &UploadedFile,
    ) -> Result<String, Error> {
        if file.bytes.is_empty() {
            return Err(TypeError::new(field, "The submitted file is empty").into());
        }
        let extension = detect_image_format(&file.bytes).ok_or_else(|| {
            TypeError::new(field, "Upload a valid image (png, jpeg, gif or webp)")
        })?;

        let relative = format!("{folder}/{}.{extension}", Uuid::new_v4());
        let directory = self.root.join(folder);
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            log::error!("Failed to create media directory {directory:?}: {e}");
            ErrorKind::InternalServerError.new("Failed to store image")
        })?;

        let path = self.root.join(&relative);
        tokio::fs::write(&path, &file.bytes).await.map_err(|e| {
            log::error!("Failed to write image {path:?}: {e}");
            ErrorKind::InternalServerError.new("Failed to store image")
        })?;

        log::debug!("Stored image {relative} ({} bytes)", file.bytes.len());
        Ok(relative)
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) {
        let path = self.root.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => log::debug!("Removed image {relative}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove image {path:?}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13];

    fn upload(bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: Some(String::from("soup.png")),
            content_type: Some(String::from("image/png")),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn detects_supported_formats() {
        assert_eq!(detect_image_format(PNG), Some("png"));
        assert_eq!(detect_image_format(&[0xff, 0xd8, 0xff, 0xe0]), Some("jpg"));
        assert_eq!(detect_image_format(b"GIF89a..."), Some("gif"));
        assert_eq!(detect_image_format(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(detect_image_format(b"<svg></svg>"), None);
    }

    #[test]
    fn media_url_joins_domain_and_path() {
        assert_eq!(
            media_url("http://localhost:8000", "recipes/a.png"),
            "http://localhost:8000/media/recipes/a.png"
        );
    }

    #[tokio::test]
    async fn saves_and_removes_images() {
        let root = tempfile::tempdir().unwrap();
        let store = MediaStore::new(root.path());

        let relative = store.save_image("image", "recipes", &upload(PNG)).await.unwrap();

        assert!(relative.starts_with("recipes/") && relative.ends_with(".png"));
        assert_eq!(std::fs::read(root.path().join(&relative)).unwrap(), PNG);

        store.remove(&relative).await;
        assert!(!root.path().join(&relative).exists());
        store.remove(&relative).await;
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let root = tempfile::tempdir().unwrap();
        let store = MediaStore::new(root.path());

        let error = store
            .save_image("avatar", "avatars", &upload(b"plain text"))
            .await
            .unwrap_err();

        assert!(error.fields.contains_key("avatar"));
    }
}
