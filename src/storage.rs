use actix_web::{HttpResponse, Responder, web};
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::error;

const PHOTO_DIR: &str = "profile-photos";

/// Filesystem-backed store for employee profile photos, addressed by
/// public URL.
#[derive(Clone)]
pub struct PhotoStore {
    root: PathBuf,
    public_base_url: String,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn extension_for(content_type: &str) -> Option<&'static str> {
        match content_type {
            "image/png" => Some("png"),
            "image/jpeg" => Some("jpg"),
            "image/webp" => Some("webp"),
            "image/gif" => Some("gif"),
            _ => None,
        }
    }

    pub fn content_type_for(filename: &str) -> Option<&'static str> {
        match filename.rsplit_once('.')?.1 {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "webp" => Some("image/webp"),
            "gif" => Some("image/gif"),
            _ => None,
        }
    }

    /// Write a photo for `employee_id`, replacing any previous one with the
    /// same extension, and return its public URL.
    pub async fn save(
        &self,
        employee_id: i64,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let Some(ext) = Self::extension_for(content_type) else {
            bail!("unsupported content type: {content_type}");
        };

        let dir = self.root.join(PHOTO_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;

        let filename = format!("{employee_id}.{ext}");
        let path = dir.join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        Ok(format!(
            "{}/media/{}/{}",
            self.public_base_url, PHOTO_DIR, filename
        ))
    }

    /// Resolve a requested filename to a path on disk. Rejects anything
    /// that is not a bare, known-extension filename.
    pub fn resolve(&self, filename: &str) -> Option<(PathBuf, &'static str)> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return None;
        }
        let content_type = Self::content_type_for(filename)?;
        Some((self.root.join(PHOTO_DIR).join(filename), content_type))
    }
}

/// Public photo serving: `GET /media/profile-photos/{filename}`.
pub async fn serve_photo(
    store: web::Data<PhotoStore>,
    path: web::Path<String>,
) -> impl Responder {
    let filename = path.into_inner();

    let Some((path, content_type)) = store.resolve(&filename) else {
        return HttpResponse::NotFound().finish();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => HttpResponse::Ok().content_type(content_type).body(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HttpResponse::NotFound().finish(),
        Err(e) => {
            error!(error = %e, file = %filename, "Failed to read photo");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_map_both_ways() {
        assert_eq!(PhotoStore::extension_for("image/png"), Some("png"));
        assert_eq!(PhotoStore::extension_for("application/pdf"), None);
        assert_eq!(PhotoStore::content_type_for("1.jpg"), Some("image/jpeg"));
        assert_eq!(PhotoStore::content_type_for("1.exe"), None);
        assert_eq!(PhotoStore::content_type_for("noext"), None);
    }

    #[test]
    fn traversal_attempts_do_not_resolve() {
        let store = PhotoStore::new("/tmp/media", "http://localhost:8080");
        assert!(store.resolve("../../etc/passwd").is_none());
        assert!(store.resolve("a/b.png").is_none());
        assert!(store.resolve("").is_none());
        assert!(store.resolve("7.png").is_some());
    }

    #[actix_web::test]
    async fn save_writes_bytes_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path(), "http://localhost:8080/");

        let url = store.save(7, "image/png", b"pngbytes").await.unwrap();
        assert_eq!(url, "http://localhost:8080/media/profile-photos/7.png");

        let on_disk = std::fs::read(dir.path().join("profile-photos/7.png")).unwrap();
        assert_eq!(on_disk, b"pngbytes");
    }

    #[actix_web::test]
    async fn save_rejects_unknown_content_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path(), "http://localhost:8080");
        assert!(store.save(7, "text/plain", b"nope").await.is_err());
    }
}
