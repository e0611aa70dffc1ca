use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw submitted form fields. Field names may repeat; `get` returns the first value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, keeping any earlier values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Error buckets of the create-post form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub enum FormField {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "content")]
    Content,
    /// Errors that belong to the form as a whole.
    #[serde(rename = "_form")]
    Form,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Title => "title",
            FormField::Content => "content",
            FormField::Form => "_form",
        }
    }
}

/// Field errors returned to the form when the submission does not go through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct FormState {
    pub errors: BTreeMap<FormField, Vec<String>>,
}

impl FormState {
    /// State of a form that has not been submitted yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// State carrying a single form-level message.
    pub fn form_error(message: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.push(FormField::Form, message);
        state
    }

    pub fn push(&mut self, field: FormField, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    pub fn field(&self, field: FormField) -> &[String] {
        self.errors.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }
}
