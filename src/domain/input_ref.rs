use std::fmt;

use uuid::Uuid;

/// Handle of the source audio. The pipeline never interprets it; the staging
/// store resolves it to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef(String);

impl InputRef {
    pub fn for_upload(upload_id: Uuid, filename: &str) -> Self {
        Self(format!("{}/{}", upload_id, sanitize_filename(filename)))
    }

    pub fn from_raw(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "audio".to_string(),
        _ => cleaned,
    }
}
