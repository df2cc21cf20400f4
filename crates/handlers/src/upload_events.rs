use serde_json::{json, Value};
use tracing::info;

/// A grocery-list image landed in object storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
}

impl ObjectCreated {
    /// Reads the first record of an object-created notification.
    pub fn from_notification(event: &Value) -> Result<Self, String> {
        let record = event
            .pointer("/Records/0/s3")
            .ok_or_else(|| "notification has no Records[0].s3 entry".to_string())?;
        let bucket = record
            .pointer("/bucket/name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| "notification is missing the bucket name".to_string())?;
        let key = record
            .pointer("/object/key")
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| "notification is missing the object key".to_string())?;

        Ok(Self { bucket: bucket.to_string(), key: decode_key(key) })
    }

    /// Invocation payload handed to the orchestrator.
    pub fn payload(&self) -> Value {
        json!({ "s3_bucket": self.bucket, "s3_key": self.key })
    }
}

pub fn session_id(request_id: &str) -> String {
    format!("session-{request_id}")
}

#[derive(Clone, Debug, PartialEq)]
pub struct UploadInvocation {
    pub object: ObjectCreated,
    pub session_id: String,
}

pub fn prepare(event: &Value, request_id: &str) -> Result<UploadInvocation, String> {
    let object = ObjectCreated::from_notification(event)?;
    info!(
        event_name = "handler.upload.received",
        bucket = %object.bucket,
        key = %object.key,
        request_id,
        "processing uploaded grocery list"
    );
    Ok(UploadInvocation { object, session_id: session_id(request_id) })
}

/// Notification keys are form-encoded: `+` is a space and `%XX` a byte.
fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
