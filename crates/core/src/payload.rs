//! Inbound invocation payloads.
//!
//! The agent entry point accepts several payload shapes from different
//! callers (upload triggers, chat front-ends, scripted clients). Every shape
//! reduces to an ordered list of instruction strings; normalization never
//! fails and unrecognized input simply yields no instructions.

use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationPayload {
    /// Bare JSON array; elements are used verbatim.
    Items(Vec<String>),
    /// Object-storage pointer to an uploaded grocery-list image.
    ImageUpload { bucket: String, key: String },
    GroceryItems(Vec<String>),
    Instruction { instruction: String, action: Option<String>, customer_id: Option<String> },
    /// `prompt` or `inputText` free text, one instruction per non-blank line.
    FreeText(String),
    /// A string that did not parse as a JSON object or array.
    Literal(String),
    Unrecognized,
}

impl InvocationPayload {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::Items(items.iter().map(stringify).collect()),
            Value::Object(fields) => Self::from_object(fields),
            Value::String(raw) => Self::from_text(raw),
            _ => Self::Unrecognized,
        }
    }

    /// Raw request body; JSON is attempted first, anything else is literal text.
    /// A JSON string body is unwrapped and its contents read the same way.
    pub fn from_text(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => Self::from_value(&parsed),
            Ok(Value::String(inner)) => Self::from_text(&inner),
            _ => Self::Literal(raw.to_string()),
        }
    }

    fn from_object(fields: &Map<String, Value>) -> Self {
        if let (Some(Value::String(bucket)), Some(Value::String(key))) =
            (fields.get("s3_bucket"), fields.get("s3_key"))
        {
            return Self::ImageUpload { bucket: bucket.clone(), key: key.clone() };
        }

        if let Some(Value::Array(items)) = fields.get("grocery_items") {
            return Self::GroceryItems(items.iter().map(stringify).collect());
        }

        if let Some(instruction) = fields.get("instruction").filter(|value| !value.is_null()) {
            return Self::Instruction {
                instruction: stringify(instruction),
                action: optional_string(fields.get("action")),
                customer_id: optional_string(fields.get("customer_id")),
            };
        }

        let free_text = ["prompt", "inputText"]
            .iter()
            .find_map(|field| fields.get(*field).and_then(Value::as_str));
        match free_text {
            Some(text) => Self::FreeText(text.to_string()),
            None => Self::Unrecognized,
        }
    }

    pub fn instructions(&self) -> Vec<String> {
        match self {
            Self::Items(items) | Self::GroceryItems(items) => items.clone(),
            Self::ImageUpload { bucket, key } => vec![image_instruction(bucket, key)],
            Self::Instruction { instruction, .. } => vec![instruction.clone()],
            Self::FreeText(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect(),
            Self::Literal(text) if text.trim().is_empty() => Vec::new(),
            Self::Literal(text) => vec![text.clone()],
            Self::Unrecognized => Vec::new(),
        }
    }

    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::Instruction { customer_id, .. } => customer_id.as_deref(),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<&str> {
        match self {
            Self::Instruction { action, .. } => action.as_deref(),
            _ => None,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::Items(_) => "items",
            Self::ImageUpload { .. } => "image_upload",
            Self::GroceryItems(_) => "grocery_items",
            Self::Instruction { .. } => "instruction",
            Self::FreeText(_) => "free_text",
            Self::Literal(_) => "literal",
            Self::Unrecognized => "unrecognized",
        }
    }
}

pub fn normalize(value: &Value) -> Vec<String> {
    InvocationPayload::from_value(value).instructions()
}

pub fn image_instruction(bucket: &str, key: &str) -> String {
    format!("Extract the grocery list from the image at s3://{bucket}/{key}")
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(ToString::to_string)
}
