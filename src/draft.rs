use crate::{
    collaborator::Collaborator,
    diary_entry::{paragraph, DiaryEntry, Mood, NewEntry, Weather},
    error::{DiaryError, ValidationError},
};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// The new-entry form. Kept intact until a submission succeeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub weather: Weather,
    pub location: String,
    pub image: Option<PathBuf>,
}

impl Draft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingContent);
        }
        Ok(())
    }

    pub fn to_new_entry(&self, images: Vec<String>) -> NewEntry {
        let location = self.location.trim();
        NewEntry {
            title: self.title.trim().to_string(),
            content: paragraph(self.content.trim()),
            mood: self.mood,
            weather: self.weather,
            location: (!location.is_empty()).then(|| location.to_string()),
            images,
        }
    }
}

/// Random storage key that keeps the original extension.
pub fn image_key(path: &Path) -> String {
    let stem = Uuid::new_v4().to_string();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{stem}.{}", ext.to_ascii_lowercase()),
        _ => stem,
    }
}

/// Uploads the image at `path` and returns its public URL.
pub async fn upload_image(
    backend: &dyn Collaborator,
    bucket: &str,
    path: &Path,
) -> Result<String, DiaryError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DiaryError::Upload(format!("cannot read {}: {e}", path.display())))?;
    let key = image_key(path);
    let content_type = mime_guess::from_path(path).first_or_octet_stream();

    backend
        .upload(bucket, &key, bytes, content_type.essence_str())
        .await?;
    Ok(backend.public_url(bucket, &key))
}

/// Upload then insert. Validation runs again here so nothing reaches the
/// backend for an incomplete draft.
pub async fn submit(
    backend: &dyn Collaborator,
    bucket: &str,
    draft: &Draft,
) -> Result<DiaryEntry, DiaryError> {
    draft.validate()?;

    let mut images = Vec::new();
    if let Some(path) = &draft.image {
        images.push(upload_image(backend, bucket, path).await?);
    }

    let entry = backend.insert_entry(&draft.to_new_entry(images)).await?;
    info!(id = entry.id, "Entry created");
    Ok(entry)
}
