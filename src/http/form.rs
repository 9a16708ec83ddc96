//! Request bodies that may arrive as JSON, urlencoded forms or multipart uploads
//!
//! Form keys use bracket notation (`tags[]`, `coordinates[0]`,
//! `coordinates[coordinates][1]`) and are folded into one JSON object so the
//! same request models serve every encoding.

use crate::http::errors::{HttpError, HttpResult};
use crate::storage::media::UploadedImage;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A parsed request body: text fields as JSON plus any uploaded files
#[derive(Debug, Default)]
pub struct BodyInput {
    fields: Map<String, Value>,
    files: Vec<(String, UploadedImage)>,
}

/// Larger bracket indices are kept as plain object keys
const MAX_FORM_INDEX: usize = 64;

#[derive(Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Push,
}

impl BodyInput {
    pub fn from_json(value: Value) -> HttpResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields,
                files: Vec::new(),
            }),
            Value::Null => Ok(Self::default()),
            _ => Err(HttpError::BadRequest(
                "Request body must be a JSON object.".to_string(),
            )),
        }
    }

    /// Add a form value under a possibly bracketed key
    pub fn insert_field(&mut self, key: &str, value: Value) {
        let segments = parse_key(key);
        let Some((Segment::Key(base), rest)) = segments.split_first() else {
            return;
        };
        let slot = self.fields.entry(base.clone()).or_insert(Value::Null);
        insert_at(slot, rest, value);
    }

    pub fn insert_file(&mut self, field: &str, image: UploadedImage) {
        self.files.push((field.trim_end_matches("[]").to_string(), image));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Take the files uploaded under `field`
    pub fn files_for(&mut self, field: &str) -> Vec<UploadedImage> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(name, _)| name == field);
        self.files = kept;
        taken.into_iter().map(|(_, image)| image).collect()
    }

    /// Reject uploads under any field other than `allowed`
    pub fn ensure_only_files(&self, allowed: &[&str]) -> HttpResult<()> {
        match self.files.iter().find(|(name, _)| !allowed.contains(&name.as_str())) {
            Some((name, _)) => Err(HttpError::BadRequest(format!("Unexpected field '{}'.", name))),
            None => Ok(()),
        }
    }

    /// Deserialize the text fields into a request model
    pub fn parse<T: DeserializeOwned>(&self) -> HttpResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| HttpError::BadRequest(format!("Invalid request body: {}", e)))
    }

    async fn from_multipart(mut multipart: Multipart) -> HttpResult<Self> {
        let mut input = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| HttpError::BadRequest(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if let Some(file_name) = field.file_name().map(str::to_string) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    HttpError::BadRequest(format!("Failed to read file content: {}", e))
                })?;
                input.insert_file(
                    &name,
                    UploadedImage {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    },
                );
            } else {
                let text = field.text().await.map_err(|e| {
                    HttpError::BadRequest(format!("Failed to read multipart field: {}", e))
                })?;
                input.insert_field(&name, Value::String(text));
            }
        }
        Ok(input)
    }
}

#[axum::async_trait]
impl<S> FromRequest<S> for BodyInput
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| HttpError::BadRequest(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| HttpError::BadRequest(e.body_text()))?;
            let mut input = Self::default();
            for (key, value) in pairs {
                input.insert_field(&key, Value::String(value));
            }
            return Ok(input);
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| HttpError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| HttpError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        Self::from_json(value)
    }
}

fn parse_key(key: &str) -> Vec<Segment> {
    let Some(open) = key.find('[') else {
        return vec![Segment::Key(key.to_string())];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![Segment::Key(key.to_string())];
    }

    let mut segments = vec![Segment::Key(key[..open].to_string())];
    for part in key[open + 1..key.len() - 1].split("][") {
        segments.push(if part.is_empty() {
            Segment::Push
        } else if let Some(index) = part.parse::<usize>().ok().filter(|i| *i < MAX_FORM_INDEX) {
            Segment::Index(index)
        } else {
            Segment::Key(part.to_string())
        });
    }
    segments
}

fn insert_at(slot: &mut Value, path: &[Segment], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        // repeated plain keys collect into an array
        match slot {
            Value::Null => *slot = value,
            Value::Array(items) => items.push(value),
            other => {
                let previous = other.take();
                *other = Value::Array(vec![previous, value]);
            }
        }
        return;
    };

    match head {
        Segment::Push | Segment::Index(_) => {
            if !slot.is_array() {
                *slot = match slot.take() {
                    Value::Null => Value::Array(Vec::new()),
                    other => Value::Array(vec![other]),
                };
            }
            if let Value::Array(items) = slot {
                let index = match head {
                    Segment::Index(i) => *i,
                    _ => items.len(),
                };
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                insert_at(&mut items[index], rest, value);
            }
        }
        Segment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                insert_at(child, rest, value);
            }
        }
    }
}
