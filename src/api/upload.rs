//! Multipart packaging for driver documents and photos.

use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            ClientError::Validation(format!("could not read {}: {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::Validation(format!("{} has no usable file name", path.display()))
            })?;
        Ok(Self::new(file_name, bytes))
    }

    fn into_part(self) -> Result<Part, ClientError> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.content_type)
            .map_err(|err| ClientError::Validation(format!("invalid content type: {err}")))
    }
}

fn guess_content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text { name: String, value: String },
    File { name: String, file: FileUpload },
}

/// Ordered multipart body that can be inspected before it is handed to
/// reqwest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    fields: Vec<FormField>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FileUpload) -> Self {
        self.fields.push(FormField::File {
            name: name.into(),
            file,
        });
        self
    }

    pub fn maybe_file(self, name: impl Into<String>, file: Option<FileUpload>) -> Self {
        match file {
            Some(file) => self.file(name, file),
            None => self,
        }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn text_values(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter_map(|field| match field {
                FormField::Text { name: key, value } if key == name => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|field| matches!(field, FormField::File { name: key, .. } if key == name))
    }

    pub fn into_form(self) -> Result<Form, ClientError> {
        self.fields
            .into_iter()
            .try_fold(Form::new(), |form, field| match field {
                FormField::Text { name, value } => Ok(form.text(name, value)),
                FormField::File { name, file } => Ok(form.part(name, file.into_part()?)),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn guesses_common_image_types() {
        assert_eq!(FileUpload::new("me.JPG", vec![]).content_type, "image/jpeg");
        assert_eq!(FileUpload::new("licence.png", vec![]).content_type, "image/png");
        assert_eq!(FileUpload::new("scan.pdf", vec![]).content_type, "application/pdf");
        assert_eq!(
            FileUpload::new("noext", vec![]).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn form_keeps_field_order_and_lookups() {
        let form = MultipartForm::new()
            .text("carMake", "Toyota")
            .text("preferredRoutes[]", "Lagos-Ibadan")
            .text("preferredRoutes[]", "Lagos-Abuja")
            .maybe_file("profilePhoto", Some(FileUpload::new("me.png", vec![1, 2])))
            .maybe_file("driverLicenseImage", None);

        assert_eq!(form.fields().len(), 4);
        assert_eq!(
            form.text_values("preferredRoutes[]"),
            vec!["Lagos-Ibadan", "Lagos-Abuja"]
        );
        assert!(form.has_file("profilePhoto"));
        assert!(!form.has_file("driverLicenseImage"));
        assert!(form.into_form().is_ok());
    }

    #[tokio::test]
    async fn reads_upload_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG").unwrap();

        let upload = FileUpload::from_path(file.path()).await.unwrap();
        assert_eq!(upload.bytes, b"\x89PNG");
        assert_eq!(upload.content_type, "image/png");
        assert!(upload.file_name.ends_with(".png"));
    }

    #[tokio::test]
    async fn missing_file_is_a_validation_error() {
        let result = FileUpload::from_path("/definitely/not/here.png").await;
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }
}
