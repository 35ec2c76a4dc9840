//! Bilingual field resolution.
//!
//! Text-bearing entities expose paired fields `<base>` and `<base>_ar`. Each
//! entity type registers its fields in an explicit accessor table, so lookups
//! never construct attribute names at runtime.

use serde_json::Value;

use crate::model::{Page, Question, QuestionType};

/// The language used when a requested code is missing or unsupported.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Closed set of supported language codes.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ar"];

/// Languages rendered right-to-left.
pub const RTL_LANGUAGES: &[&str] = &["ar", "he", "fa", "ur"];

/// Normalize a language code to one of [`SUPPORTED_LANGUAGES`].
///
/// Never fails: `None`, blank, and unsupported codes all become `"en"`.
pub fn validate_language(code: Option<&str>) -> String {
    let normalized = code.map(|c| c.trim().to_lowercase()).unwrap_or_default();
    if SUPPORTED_LANGUAGES.contains(&normalized.as_str()) {
        normalized
    } else {
        DEFAULT_LANGUAGE.to_string()
    }
}

/// Whether `code` is written right-to-left. Layout only; scoring ignores it.
pub fn is_rtl_language(code: &str) -> bool {
    let normalized = code.trim().to_lowercase();
    RTL_LANGUAGES.contains(&normalized.as_str())
}

fn wants_arabic(lang: Option<&str>) -> bool {
    validate_language(lang) == "ar"
}

/// English and Arabic accessors for one text field.
pub struct TextField<E> {
    pub name: &'static str,
    pub english: fn(&E) -> Option<&str>,
    pub arabic: fn(&E) -> Option<&str>,
}

/// English and Arabic accessors for one structured field.
pub struct JsonField<E> {
    pub name: &'static str,
    pub english: fn(&E) -> Option<Value>,
    pub arabic: fn(&E) -> Option<Value>,
}

/// An entity with bilingual fields.
pub trait Localized: Sized + 'static {
    fn text_fields() -> &'static [TextField<Self>];

    fn json_fields() -> &'static [JsonField<Self>] {
        &[]
    }
}

/// Resolve a text field in the requested language.
///
/// The Arabic variant is used only when it exists and is not blank after
/// trimming; otherwise the English value is returned as-is, which may be absent.
pub fn get_localized_text<'a, E: Localized>(
    entity: &'a E,
    base: &str,
    lang: Option<&str>,
) -> Option<&'a str> {
    let field = E::text_fields().iter().find(|f| f.name == base)?;
    if wants_arabic(lang) {
        if let Some(value) = (field.arabic)(entity) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    (field.english)(entity)
}

/// Resolve a structured field in the requested language.
///
/// Unlike text, an Arabic value is accepted whenever it is present, even an
/// empty list. Only an absent or `null` Arabic value falls back to English.
pub fn get_localized_json<E: Localized>(
    entity: &E,
    base: &str,
    lang: Option<&str>,
) -> Option<Value> {
    let field = E::json_fields().iter().find(|f| f.name == base)?;
    if wants_arabic(lang) {
        match (field.arabic)(entity) {
            Some(Value::Null) | None => {}
            Some(value) => return Some(value),
        }
    }
    (field.english)(entity)
}

fn option_labels(question: &Question) -> Option<Value> {
    if question.options.is_empty() {
        return None;
    }
    Some(Value::Array(
        question
            .options
            .iter()
            .map(|o| Value::String(o.label.clone()))
            .collect(),
    ))
}

fn arabic_option_labels(question: &Question) -> Option<Value> {
    question
        .options_ar
        .as_ref()
        .map(|labels| Value::Array(labels.iter().cloned().map(Value::String).collect()))
}

fn when_type(
    question: &Question,
    accepts: fn(QuestionType) -> bool,
    value: fn(&Question) -> Option<Value>,
) -> Option<Value> {
    if accepts(question.question_type) {
        value(question)
    } else {
        None
    }
}

impl Localized for Question {
    fn text_fields() -> &'static [TextField<Self>] {
        const FIELDS: &[TextField<Question>] = &[TextField {
            name: "question_text",
            english: |q| Some(q.text.as_str()),
            arabic: |q| q.text_ar.as_deref(),
        }];
        FIELDS
    }

    fn json_fields() -> &'static [JsonField<Self>] {
        const FIELDS: &[JsonField<Question>] = &[
            JsonField {
                name: "mcq_options",
                english: |q| when_type(q, |t| t.is_choice(), option_labels),
                arabic: |q| when_type(q, |t| t.is_choice(), arabic_option_labels),
            },
            JsonField {
                name: "ordering_options",
                english: |q| when_type(q, |t| t == QuestionType::Ordering, option_labels),
                arabic: |q| when_type(q, |t| t == QuestionType::Ordering, arabic_option_labels),
            },
        ];
        FIELDS
    }
}

impl Localized for Page {
    fn text_fields() -> &'static [TextField<Self>] {
        const FIELDS: &[TextField<Page>] = &[
            TextField {
                name: "title",
                english: |p| Some(p.title.as_str()),
                arabic: |p| p.title_ar.as_deref(),
            },
            TextField {
                name: "description",
                english: |p| p.description.as_deref(),
                arabic: |p| p.description_ar.as_deref(),
            },
        ];
        FIELDS
    }
}
