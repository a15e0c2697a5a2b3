use std::borrow::Cow;

use serde::{Deserialize, Deserializer};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    error::FieldErrors,
    models::{ComplaintCategory, ComplaintFilter, ComplaintStatus, StatusChange},
};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const IMAGE_TOO_LARGE: &str = "Ukuran gambar maksimal 5MB";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "png", "jpg", "gif"];

/// Complaint form as submitted by a citizen. Every field is optional here so
/// that missing values surface as per-field messages rather than a decode error.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ComplaintSubmission {
    #[validate(
        required(message = "Nama wajib diisi"),
        length(max = 255, message = "Nama maksimal 255 karakter")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "Email wajib diisi"),
        email(message = "Format email tidak valid"),
        length(max = 255, message = "Email maksimal 255 karakter")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "Nomor HP wajib diisi"),
        length(max = 20, message = "Nomor HP maksimal 20 karakter")
    )]
    pub phone: Option<String>,

    #[validate(required(message = "Alamat wajib diisi"))]
    pub address: Option<String>,

    #[validate(
        required(message = "Kategori wajib dipilih"),
        custom(function = "validate_category")
    )]
    #[schema(example = "sampah")]
    pub category: Option<String>,

    #[validate(
        required(message = "Deskripsi wajib diisi"),
        length(min = 20, message = "Deskripsi minimal 20 karakter")
    )]
    pub description: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone)]
pub struct ValidSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub category: ComplaintCategory,
    pub description: String,
}

impl ComplaintSubmission {
    fn normalized(self) -> Self {
        Self {
            name: present(self.name),
            email: present(self.email),
            phone: present(self.phone),
            address: present(self.address),
            category: present(self.category),
            description: present(self.description),
        }
    }

    fn into_valid(self) -> Option<ValidSubmission> {
        Some(ValidSubmission {
            name: self.name?,
            email: self.email?,
            phone: self.phone?,
            address: self.address?,
            category: self.category?.parse().ok()?,
            description: self.description?,
        })
    }
}

/// Raw bytes of an uploaded image together with the client's file name.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// Detects the image format from the file signature.
pub fn sniff_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else {
        None
    }
}

pub fn validate_image(upload: ImageUpload) -> Result<ValidImage, Vec<String>> {
    let mut messages = Vec::new();

    let format = sniff_image_format(&upload.bytes);
    if format.is_none() {
        messages.push("File harus berupa gambar".to_owned());
    }

    let extension_allowed = upload
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map_or(true, |(_, ext)| {
            IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        });
    if format.is_none() || !extension_allowed {
        messages.push("Format gambar harus: jpeg, png, jpg, gif".to_owned());
    }

    if upload.bytes.len() > MAX_IMAGE_BYTES {
        messages.push(IMAGE_TOO_LARGE.to_owned());
    }

    match format {
        Some(format) if messages.is_empty() => Ok(ValidImage {
            bytes: upload.bytes,
            format,
        }),
        _ => Err(messages),
    }
}

/// Validates a complaint submission and its optional image together so the
/// caller receives every field error at once.
pub fn validate_submission(
    submission: ComplaintSubmission,
    image: Option<ImageUpload>,
) -> Result<(ValidSubmission, Option<ValidImage>), FieldErrors> {
    let submission = submission.normalized();
    let mut errors = match submission.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => field_errors(&errors),
    };

    let image = match image.map(validate_image).transpose() {
        Ok(image) => image,
        Err(messages) => {
            errors.insert("image".to_owned(), messages);
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    match submission.into_valid() {
        Some(valid) => Ok((valid, image)),
        None => Err(single("category", "Kategori tidak valid")),
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct StatusUpdate {
    #[validate(
        required(message = "Status wajib dipilih"),
        custom(function = "validate_status")
    )]
    #[schema(example = "completed")]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "deserialize_present")]
    #[schema(value_type = Option<String>, example = "Sudah dibersihkan")]
    pub admin_notes: Option<Option<String>>,
}

impl StatusUpdate {
    pub fn validated(self) -> Result<StatusChange, FieldErrors> {
        let update = StatusUpdate {
            status: present(self.status),
            admin_notes: self.admin_notes.map(present),
        };
        update.validate().map_err(|errors| field_errors(&errors))?;

        let status = update
            .status
            .as_deref()
            .and_then(|status| status.parse().ok())
            .ok_or_else(|| single("status", "Status tidak valid"))?;

        Ok(StatusChange {
            status,
            admin_notes: update.admin_notes,
        })
    }
}

/// Query parameters accepted by the admin listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// One of the four statuses, or `all`.
    pub status: Option<String>,
    pub category: Option<String>,
    /// Matched against ticket number, name and address.
    pub search: Option<String>,
    pub page: Option<i64>,
}

impl ListQuery {
    pub fn into_filter(self) -> Result<(ComplaintFilter, i64), FieldErrors> {
        let mut errors = FieldErrors::new();

        let status = match present(self.status).as_deref() {
            None | Some("all") => None,
            Some(value) => match value.parse::<ComplaintStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    push(&mut errors, "status", "Status tidak valid");
                    None
                }
            },
        };

        let category = match present(self.category) {
            None => None,
            Some(value) => match value.parse::<ComplaintCategory>() {
                Ok(category) => Some(category),
                Err(_) => {
                    push(&mut errors, "category", "Kategori tidak valid");
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let filter = ComplaintFilter {
            status,
            category,
            search: present(self.search),
        };
        Ok((filter, self.page.unwrap_or(1).max(1)))
    }
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    match category.parse::<ComplaintCategory>() {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("in").with_message(Cow::Borrowed("Kategori tidak valid"))),
    }
}

fn validate_status(status: &str) -> Result<(), ValidationError> {
    match status.parse::<ComplaintStatus>() {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("in").with_message(Cow::Borrowed("Status tidak valid"))),
    }
}

/// Trims a submitted value; blank strings count as absent.
pub fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|error| match &error.message {
                    Some(message) => message.to_string(),
                    None => error.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

pub fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_owned())
        .or_default()
        .push(message.to_owned());
}

fn single(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    push(&mut errors, field, message);
    errors
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
