use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use inkpost_core::models::{ListMediaQuery, Media, MediaResponse, NewMedia, OffsetPage};
use inkpost_core::AppError;
use inkpost_db::MediaRepository;
use inkpost_storage::{media_key, Storage};
use inkpost_worker::{FileDeleteQueue, PublishOutcome};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Canonical MIME type of an image extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Accepted upload: lowercase extension and the MIME type to record.
#[derive(Debug, PartialEq, Eq)]
struct UploadKind {
    ext: String,
    mime: &'static str,
}

fn check_upload(
    file_name: &str,
    content_type: Option<&str>,
    size: usize,
    max_size: usize,
    allowed: &[String],
) -> Result<UploadKind, AppError> {
    if size == 0 {
        return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
    }
    if size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File is {} bytes; the limit is {} bytes",
            size, max_size
        )));
    }

    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        return Err(AppError::InvalidInput(format!(
            "File type '.{}' is not allowed (allowed: {})",
            ext,
            allowed.join(", ")
        )));
    }
    let mime = mime_for_extension(&ext).ok_or_else(|| {
        AppError::InvalidInput(format!("No known content type for '.{}'", ext))
    })?;

    // a generic or missing content type is taken from the extension
    match content_type.map(|ct| ct.split(';').next().unwrap_or("").trim()) {
        None | Some("") | Some("application/octet-stream") => {}
        Some(ct) if ct.eq_ignore_ascii_case(mime) => {}
        Some(ct) => {
            return Err(AppError::InvalidInput(format!(
                "Content type '{}' does not match extension '.{}'",
                ct, ext
            )))
        }
    }

    Ok(UploadKind { ext, mime })
}

/// Media library: content-addressed uploads on [`Storage`] with rows in
/// `media`, and deletes that hand the file to the [`FileDeleteQueue`].
#[derive(Clone)]
pub struct MediaService {
    repository: MediaRepository,
    storage: Arc<dyn Storage>,
    queue: FileDeleteQueue,
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl MediaService {
    pub fn new(
        repository: MediaRepository,
        storage: Arc<dyn Storage>,
        queue: FileDeleteQueue,
        max_file_size: usize,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            repository,
            storage,
            queue,
            max_file_size,
            allowed_extensions,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    fn respond(&self, media: Media) -> MediaResponse {
        let url = self.storage.url_for(&media.file_path);
        MediaResponse { media, url }
    }

    /// Store an upload. Identical content returns the existing record.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<MediaResponse, AppError> {
        let kind = check_upload(
            file_name,
            content_type,
            data.len(),
            self.max_file_size,
            &self.allowed_extensions,
        )?;

        let hash = hex::encode(Sha256::digest(&data));
        if let Some(existing) = self.repository.find_by_hash(&hash).await? {
            tracing::debug!(media_id = existing.id, "Upload matches existing media");
            return Ok(self.respond(existing));
        }

        let key = media_key(&hash, &kind.ext, Utc::now());
        let size = i64::try_from(data.len()).unwrap_or(i64::MAX);
        self.storage.put(&key, data).await?;

        let new_media = NewMedia {
            file_name: file_name.to_string(),
            file_path: key.clone(),
            file_hash: hash.clone(),
            mime_type: kind.mime.to_string(),
            size,
        };
        let media = match self.repository.create(&new_media).await {
            Ok(media) => media,
            // lost a race against an identical upload; both wrote the same bytes
            Err(e) if e.is_unique_violation() => self
                .repository
                .find_by_hash(&hash)
                .await?
                .ok_or_else(|| AppError::Internal("Media row missing after conflict".to_string()))?,
            Err(e) => {
                if !self.repository.is_file_referenced(&key).await.unwrap_or(true) {
                    self.queue.publish(&key).await;
                }
                return Err(e);
            }
        };

        tracing::info!(media_id = media.id, file_path = %media.file_path, "Media uploaded");
        Ok(self.respond(media))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, query: &ListMediaQuery) -> Result<OffsetPage<MediaResponse>, AppError> {
        let page = query.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);

        let (rows, total) = self.repository.list(limit, offset).await?;
        Ok(OffsetPage {
            data: rows.into_iter().map(|m| self.respond(m)).collect(),
            total,
            page,
            limit,
        })
    }

    pub async fn get(&self, id: i64) -> Result<MediaResponse, AppError> {
        self.repository
            .get(id)
            .await?
            .map(|m| self.respond(m))
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))
    }

    /// Bytes and content type of a stored file.
    pub async fn read(&self, file_path: &str) -> Result<(Vec<u8>, &'static str), AppError> {
        let data = self.storage.read(file_path).await?;
        let mime = file_path
            .rsplit_once('.')
            .and_then(|(_, ext)| mime_for_extension(&ext.to_ascii_lowercase()))
            .unwrap_or("application/octet-stream");
        Ok((data, mime))
    }

    /// Delete the row, then schedule the file for removal unless another row
    /// still points at it. File cleanup never fails the request.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let media = self
            .repository
            .delete(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {} not found", id)))?;

        match self.repository.is_file_referenced(&media.file_path).await {
            Ok(true) => {
                tracing::debug!(file_path = %media.file_path, "File still referenced, keeping it");
            }
            Ok(false) => match self.queue.publish(&media.file_path).await {
                PublishOutcome::Queued(entry_id) => {
                    tracing::debug!(entry_id = %entry_id, "File delete queued");
                }
                PublishOutcome::Fallback(_) => {
                    tracing::debug!("File delete running in-process");
                }
            },
            Err(e) => {
                // the orphan sweep picks the file up later
                tracing::warn!(error = %e, file_path = %media.file_path, "Could not check file references");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["jpg", "jpeg", "png", "gif", "webp", "svg"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_accepts_matching_upload() {
        let kind = check_upload("Photo.JPG", Some("image/jpeg"), 10, 100, &allowed()).unwrap();
        assert_eq!(kind.ext, "jpg");
        assert_eq!(kind.mime, "image/jpeg");
    }

    #[test]
    fn test_generic_content_type_uses_extension() {
        let kind = check_upload("a.svg", Some("application/octet-stream"), 10, 100, &allowed()).unwrap();
        assert_eq!(kind.mime, "image/svg+xml");
        assert!(check_upload("a.png", None, 10, 100, &allowed()).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_content_type() {
        let err = check_upload("a.png", Some("image/gif"), 10, 100, &allowed()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        assert!(check_upload("run.exe", None, 10, 100, &allowed()).is_err());
        assert!(check_upload("noext", None, 10, 100, &allowed()).is_err());
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(
            check_upload("a.png", None, 101, 100, &allowed()),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            check_upload("a.png", None, 0, 100, &allowed()),
            Err(AppError::InvalidInput(_))
        ));
        assert!(check_upload("a.png", None, 100, 100, &allowed()).is_ok());
    }

    #[test]
    fn test_content_type_parameters_are_ignored() {
        assert!(check_upload("a.svg", Some("image/svg+xml; charset=utf-8"), 1, 10, &allowed()).is_ok());
    }
}
