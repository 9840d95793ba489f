//! Envelope and serde helpers shared by the Runscope API types

use serde::{Deserialize, Deserializer};

/// Every Runscope response is wrapped as `{"data": ..., "meta": ..., "error": ...}`
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub more_info: Option<String>,
}

/// Error bodies only need the `error` member; `data` is usually empty
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<ResponseError>,
}

impl ApiErrorResponse {
    pub fn message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        match (&error.message, &error.more_info) {
            (Some(message), Some(info)) if !info.is_empty() => {
                Some(format!("{} ({})", message, info))
            }
            (Some(message), _) => Some(message.clone()),
            (None, _) => None,
        }
    }
}

/// Percent-encodes a value for use as one URL path segment
pub fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Runscope sends `null` for empty strings, lists and maps
pub fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Assertion values come back as strings, numbers or booleans depending on the comparison
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        String(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => String::new(),
        Some(Scalar::String(s)) => s,
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
    })
}

/// Integer fields that may arrive as `null`, a number or a numeric string
pub fn deserialize_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Float(f64),
        String(String),
    }

    match Option::<IntOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(IntOrString::Int(i)) => Ok(i),
        Some(IntOrString::Float(f)) => Ok(f as i64),
        Some(IntOrString::String(s)) if s.is_empty() => Ok(0),
        Some(IntOrString::String(s)) => s
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected integer, got {:?}", s))),
    }
}
