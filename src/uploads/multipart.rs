use std::collections::HashMap;

use actix_multipart::Multipart;
use futures::TryStreamExt;

use super::MAX_IMAGE_BYTES;
use crate::app::AppError;

/// Text fields longer than this make the whole request a bad request
const MAX_TEXT_BYTES: usize = 1024 * 1024;

/// A file part, held in memory until it has been validated
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Set when the part was larger than the upload limit, `bytes` is then truncated
    pub oversized: bool,
}

/// Parsed multipart form. `name[]` fields are stored under `name`.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// First value of a text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value sent for a repeated field
    pub fn list(&self, name: &str) -> Vec<String> {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    #[cfg(test)]
    pub fn with_text(mut self, name: &str, value: &str) -> FormData {
        self.fields.entry(name.to_string()).or_default().push(value.to_string());
        self
    }
}

fn field_key(name: &str) -> String {
    name.strip_suffix("[]").unwrap_or(name).to_string()
}

/// Reads the whole multipart payload.
///
/// File parts are kept in memory up to the upload limit, the rest of an oversized part
/// is drained and dropped. Parts without a name are ignored.
pub async fn read_form(payload: &mut Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = match disposition.get_name() {
            Some(name) => field_key(name),
            None => continue,
        };
        let file_name = disposition.get_filename().map(str::to_owned);

        match file_name {
            Some(file_name) => {
                let mut file = UploadedFile {
                    file_name,
                    ..Default::default()
                };
                while let Some(chunk) = field.try_next().await? {
                    if file.oversized {
                        continue;
                    }
                    if file.bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                        file.oversized = true;
                        continue;
                    }
                    file.bytes.extend_from_slice(&chunk);
                }

                // An empty file input arrives as a nameless, empty part
                if file.file_name.is_empty() && file.bytes.is_empty() {
                    continue;
                }
                form.files.insert(name, file);
            }
            None => {
                let mut buffer = Vec::new();
                while let Some(chunk) = field.try_next().await? {
                    if buffer.len() + chunk.len() > MAX_TEXT_BYTES {
                        log::warn!("multipart field '{}' exceeds the text limit", name);
                        return Err(AppError::BadRequest);
                    }
                    buffer.extend_from_slice(&chunk);
                }
                let value = String::from_utf8(buffer).map_err(|_| AppError::BadRequest)?;
                form.fields.entry(name).or_default().push(value);
            }
        }
    }

    Ok(form)
}
