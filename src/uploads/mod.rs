mod kind;
mod multipart;

pub use kind::{content_type_for, ImageKind};
pub use multipart::{read_form, FormData, UploadedFile};

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use chrono::Utc;

use crate::{app::FieldErrors, database::models::user::DEFAULT_PROFILE_IMAGE};

/// 4096 KiB
pub const MAX_IMAGE_BYTES: usize = 4096 * 1024;
/// Prefix of every public path handed out by the store
pub const PUBLIC_PREFIX: &str = "/storage/";

pub const BLOG_PREVIEWS: &str = "uploads/blogs";
pub const PROFILE_IMAGES: &str = "uploads/profile";

/// Files under the public storage root.
///
/// All methods do blocking file I/O, call them through `web::block`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: PathBuf) -> UploadStore {
        UploadStore { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` to `<dir>/<unix millis>_<sanitized name>` and returns its public path.
    /// An existing file is never overwritten, a numeric suffix is added instead.
    pub fn save(&self, dir: &str, original_name: &str, bytes: &[u8]) -> io::Result<String> {
        let target_dir = self.root.join(dir);
        fs::create_dir_all(&target_dir)?;

        let (stem, extension) = split_extension(sanitize_file_name(original_name));
        let prefix = Utc::now().timestamp_millis();

        let mut attempt = 0u32;
        loop {
            let file_name = match attempt {
                0 => format!("{}_{}{}", prefix, stem, extension),
                n => format!("{}_{}_{}{}", prefix, stem, n, extension),
            };
            let path = target_dir.join(&file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(err) = file.write_all(bytes).and_then(|_| file.sync_all()) {
                        let _ = fs::remove_file(&path);
                        return Err(err);
                    }
                    log::info!("stored upload {}", path.display());
                    return Ok(format!("{}{}/{}", PUBLIC_PREFIX, dir, file_name));
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && attempt < 100 => attempt += 1,
                Err(err) => return Err(err),
            }
        }
    }

    /// Removes the file behind a public path. Returns `false` when there was nothing to
    /// remove, the shared default profile image is never removed.
    pub fn delete(&self, public_path: &str) -> io::Result<bool> {
        if public_path == DEFAULT_PROFILE_IMAGE {
            return Ok(false);
        }
        let relative = match public_path.strip_prefix(PUBLIC_PREFIX) {
            Some(relative) => relative,
            None => {
                log::warn!("refusing to delete '{}', not a storage path", public_path);
                return Ok(false);
            }
        };
        let path = match self.resolve(relative) {
            Some(path) => path,
            None => {
                log::warn!("refusing to delete '{}', it leaves the storage root", public_path);
                return Ok(false);
            }
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("removed upload {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Deletes every path, logging failures instead of stopping at the first one
    pub fn delete_all(&self, public_paths: &[String]) {
        for public_path in public_paths {
            if let Err(err) = self.delete(public_path) {
                log::warn!("could not remove {}: {}", public_path, err);
            }
        }
    }

    /// Maps a path relative to the storage root onto the file system.
    /// `None` for anything that could escape the root.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        if relative.is_empty() || relative.contains('\\') {
            return None;
        }

        let relative = Path::new(relative);
        if !relative.components().all(|component| matches!(component, Component::Normal(_))) {
            return None;
        }

        Some(self.root.join(relative))
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_` of the base name
pub fn sanitize_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn split_extension(name: String) -> (String, String) {
    match name.rfind('.') {
        Some(index) if index > 0 => (name[..index].to_string(), name[index..].to_string()),
        _ => (name, String::new()),
    }
}

/// Adds validation messages for an image field.
/// A missing file only counts as an error when `required` is set.
pub fn validate_image(errors: &mut FieldErrors, field: &str, file: Option<&UploadedFile>, required: bool) {
    let label = field.replace('_', " ");
    let file = match file {
        Some(file) => file,
        None => {
            if required {
                errors.missing(field);
            }
            return;
        }
    };

    if file.oversized {
        errors.add(
            field,
            format!("The {} field must not be greater than {} kilobytes.", label, MAX_IMAGE_BYTES / 1024),
        );
        return;
    }
    if ImageKind::detect(&file.bytes).is_none() {
        errors.add(field, format!("The {} field must be an image.", label));
        errors.add(
            field,
            format!("The {} field must be a file of type: jpeg, png, jpg, gif, svg.", label),
        );
    }
}
