//! Declarative mapping from learning-material attributes onto whatever
//! properties a database actually declares.

use chrono::{DateTime, NaiveDate, Utc};
use dl_core::storage::{PropertyType, Schema};
use serde_json::{json, Map, Value};

/// Maximum characters in one rich text segment.
pub const RICH_TEXT_SEGMENT_LIMIT: usize = 2000;
pub const TITLE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Title,
    Topic,
    Summary,
    SourceUrl,
    DateAdded,
    Status,
    Priority,
    QuizQuestions,
    Flashcards,
    Answers,
    KeyPoints,
    LearningObjectives,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub attribute: Attribute,
    pub candidates: &'static [&'static str],
    pub types: &'static [&'static str],
}

pub const FIELD_RULES: [FieldRule; 12] = [
    FieldRule {
        attribute: Attribute::Title,
        candidates: &["Title", "Name"],
        types: &["title"],
    },
    FieldRule {
        attribute: Attribute::Topic,
        candidates: &["Topic"],
        types: &["select", "multi_select", "rich_text"],
    },
    FieldRule {
        attribute: Attribute::Summary,
        candidates: &["Summary", "Notes", "Content"],
        types: &["rich_text"],
    },
    FieldRule {
        attribute: Attribute::SourceUrl,
        candidates: &["Source Link", "Source URL", "URL", "Link", "Source"],
        types: &["url"],
    },
    FieldRule {
        attribute: Attribute::DateAdded,
        candidates: &["Date", "Date Added", "Created", "Added"],
        types: &["date"],
    },
    FieldRule {
        attribute: Attribute::Status,
        candidates: &["Status"],
        types: &["select", "status", "rich_text"],
    },
    FieldRule {
        attribute: Attribute::Priority,
        candidates: &["Priority", "Difficulty"],
        types: &["select"],
    },
    FieldRule {
        attribute: Attribute::QuizQuestions,
        candidates: &["Quiz Questions", "Quiz", "Questions"],
        types: &["rich_text"],
    },
    FieldRule {
        attribute: Attribute::Flashcards,
        candidates: &["Flashcards", "Cards", "Flash Cards"],
        types: &["rich_text"],
    },
    FieldRule {
        attribute: Attribute::Answers,
        candidates: &["Answers"],
        types: &["rich_text"],
    },
    FieldRule {
        attribute: Attribute::KeyPoints,
        candidates: &["Key Points", "Key Insights", "Points"],
        types: &["rich_text"],
    },
    FieldRule {
        attribute: Attribute::LearningObjectives,
        candidates: &["Learning Objectives", "Objectives", "Goals"],
        types: &["rich_text"],
    },
];

impl FieldRule {
    pub fn for_attribute(attribute: Attribute) -> &'static FieldRule {
        FIELD_RULES
            .iter()
            .find(|rule| rule.attribute == attribute)
            .unwrap_or_else(|| unreachable!("every attribute has a rule"))
    }

    /// First candidate present in the schema with a compatible type.
    pub fn resolve<'s>(&self, schema: &'s Schema) -> Option<(&'s str, &'s PropertyType)> {
        self.candidates.iter().find_map(|candidate| {
            schema
                .get_key_value(*candidate)
                .filter(|(_, ty)| self.types.contains(&ty.as_str()))
                .map(|(name, ty)| (name.as_str(), ty))
        })
    }
}

pub fn resolve(schema: &Schema, attribute: Attribute) -> Option<(&str, &PropertyType)> {
    FieldRule::for_attribute(attribute).resolve(schema)
}

const TOPIC_DISPLAY: [(&str, &str); 4] = [
    ("artificial intelligence", "Artificial Intelligence"),
    ("machine learning", "Machine Learning"),
    ("software development", "Software Development"),
    ("data science", "Data Science"),
];

/// Display tag for a topic; unknown topics become `General`.
pub fn display_topic(topic: &str) -> &'static str {
    let key = topic.trim().to_lowercase();
    TOPIC_DISPLAY
        .iter()
        .find(|(raw, _)| *raw == key)
        .map(|(_, display)| *display)
        .unwrap_or("General")
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Url(String),
    Date(DateTime<Utc>),
}

/// Rich text segments, each at most [`RICH_TEXT_SEGMENT_LIMIT`] characters.
pub fn rich_text(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    let segments: Vec<Value> = chars
        .chunks(RICH_TEXT_SEGMENT_LIMIT)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({"type": "text", "text": {"content": content}})
        })
        .collect();
    Value::Array(segments)
}

/// Encode a value for a declared property type. `None` when the type
/// cannot hold the value.
pub fn encode(ty: &PropertyType, value: &FieldValue) -> Option<Value> {
    let encoded = match (ty, value) {
        (PropertyType::Title, FieldValue::Text(text)) => json!({ "title": rich_text(text) }),
        (PropertyType::RichText, FieldValue::Text(text) | FieldValue::Url(text)) => {
            json!({ "rich_text": rich_text(text) })
        }
        (PropertyType::Select, FieldValue::Text(name)) => json!({ "select": { "name": name } }),
        (PropertyType::MultiSelect, FieldValue::Text(name)) => {
            json!({ "multi_select": [{ "name": name }] })
        }
        (PropertyType::Status, FieldValue::Text(name)) => json!({ "status": { "name": name } }),
        (PropertyType::Url, FieldValue::Url(url)) => json!({ "url": url }),
        (PropertyType::Date, FieldValue::Date(at)) => json!({ "date": { "start": at.to_rfc3339() } }),
        _ => return None,
    };
    Some(encoded)
}

/// Writes `value` under the attribute's resolved field, if any.
pub fn assign(
    properties: &mut Map<String, Value>,
    schema: &Schema,
    attribute: Attribute,
    value: FieldValue,
) -> Option<String> {
    let (field, ty) = resolve(schema, attribute)?;
    let encoded = encode(ty, &value)?;
    properties.insert(field.to_string(), encoded);
    Some(field.to_string())
}

fn plain_text(segments: &Value) -> Option<String> {
    let segments = segments.as_array()?;
    Some(
        segments
            .iter()
            .filter_map(|segment| {
                segment
                    .get("plain_text")
                    .or_else(|| segment.get("text").and_then(|text| text.get("content")))
                    .and_then(Value::as_str)
            })
            .collect(),
    )
}

/// Tag names held by a stored property value, whatever its type.
pub fn tag_names(property: &Value) -> Vec<String> {
    if let Some(options) = property.get("multi_select").and_then(Value::as_array) {
        return options
            .iter()
            .filter_map(|option| option.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
    }
    for key in ["select", "status"] {
        if let Some(name) = property.get(key).and_then(|v| v.get("name")).and_then(Value::as_str) {
            return vec![name.to_string()];
        }
    }
    for key in ["rich_text", "title"] {
        if let Some(text) = property.get(key).and_then(plain_text).filter(|t| !t.is_empty()) {
            return vec![text];
        }
    }
    Vec::new()
}

/// Start of a stored date property value.
pub fn date_start(property: &Value) -> Option<DateTime<Utc>> {
    let start = property.get("date")?.get("start")?.as_str()?;
    if let Ok(at) = DateTime::parse_from_rfc3339(start) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

/// Property definitions for a fresh learning database.
pub fn full_schema() -> Map<String, Value> {
    fn options(pairs: &[(&str, &str)]) -> Value {
        Value::Array(
            pairs
                .iter()
                .map(|(name, color)| json!({ "name": name, "color": color }))
                .collect(),
        )
    }

    let mut properties = Map::new();
    properties.insert("Title".into(), json!({ "title": {} }));
    properties.insert(
        "Topic".into(),
        json!({ "multi_select": { "options": options(&[
            ("Artificial Intelligence", "blue"),
            ("Machine Learning", "green"),
            ("Software Development", "purple"),
            ("Data Science", "orange"),
            ("General", "gray"),
        ]) } }),
    );
    properties.insert("Summary".into(), json!({ "rich_text": {} }));
    properties.insert("Source URL".into(), json!({ "url": {} }));
    properties.insert("Date Added".into(), json!({ "date": {} }));
    properties.insert("Quiz Questions".into(), json!({ "rich_text": {} }));
    properties.insert("Flashcards".into(), json!({ "rich_text": {} }));
    properties.insert(
        "Status".into(),
        json!({ "select": { "options": options(&[
            ("New", "blue"),
            ("Reviewed", "green"),
            ("Archived", "gray"),
        ]) } }),
    );
    properties.insert(
        "Priority".into(),
        json!({ "select": { "options": options(&[
            ("High", "red"),
            ("Medium", "yellow"),
            ("Low", "gray"),
        ]) } }),
    );
    properties.insert("Tags".into(), json!({ "multi_select": {} }));
    properties.insert("Key Points".into(), json!({ "rich_text": {} }));
    properties.insert("Learning Objectives".into(), json!({ "rich_text": {} }));
    properties
}

/// Declared type of a property definition as sent to or read from the API.
pub fn definition_type(definition: &Value) -> Option<PropertyType> {
    if let Some(ty) = definition.get("type").and_then(Value::as_str) {
        return Some(PropertyType::from_api(ty));
    }
    definition
        .as_object()?
        .keys()
        .find(|key| !matches!(key.as_str(), "id" | "name" | "description"))
        .map(|key| PropertyType::from_api(key))
}
