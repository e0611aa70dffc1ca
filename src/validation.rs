use crate::form::{FormData, FormField, FormState};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

pub const TITLE_MIN_LEN: usize = 3;
pub const CONTENT_MIN_LEN: usize = 10;

const MISSING_STRING: &str = "Expected string, received null";

/// Title and content that passed the create-post schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidPostInput {
    pub title: String,
    pub content: String,
}

/// Raw create-post fields as submitted. A field is `None` when the form did not carry it.
#[derive(Debug, Validate)]
struct PostInput {
    #[validate(
        required(message = "Expected string, received null"),
        custom(function = "title_length")
    )]
    title: Option<String>,
    #[validate(
        required(message = "Expected string, received null"),
        custom(function = "content_length")
    )]
    content: Option<String>,
}

/// Validates the `title` and `content` fields, collecting every failure before returning.
pub fn validate_post_input(form: &FormData) -> Result<ValidPostInput, FormState> {
    let input = PostInput {
        title: form.get("title").map(str::to_owned),
        content: form.get("content").map(str::to_owned),
    };
    if let Err(errors) = input.validate() {
        return Err(form_state(&errors));
    }
    match (input.title, input.content) {
        (Some(title), Some(content)) => Ok(ValidPostInput { title, content }),
        (title, content) => {
            let mut errors = FormState::empty();
            if title.is_none() {
                errors.push(FormField::Title, MISSING_STRING);
            }
            if content.is_none() {
                errors.push(FormField::Content, MISSING_STRING);
            }
            Err(errors)
        }
    }
}

fn form_state(errors: &ValidationErrors) -> FormState {
    let mut state = FormState::empty();
    for (field, field_errors) in errors.field_errors() {
        let name: &str = field.as_ref();
        let bucket = match name {
            "title" => FormField::Title,
            "content" => FormField::Content,
            _ => FormField::Form,
        };
        for error in field_errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| error.code.to_string());
            state.push(bucket, message);
        }
    }
    state
}

fn title_length(title: &str) -> Result<(), ValidationError> {
    min_utf16_length(title, TITLE_MIN_LEN)
}

fn content_length(content: &str) -> Result<(), ValidationError> {
    min_utf16_length(content, CONTENT_MIN_LEN)
}

// Browser form lengths are counted in UTF-16 code units.
fn min_utf16_length(value: &str, min: usize) -> Result<(), ValidationError> {
    if value.encode_utf16().count() >= min {
        return Ok(());
    }
    let mut error = ValidationError::new("too_small");
    error.message = Some(Cow::Owned(format!(
        "String must contain at least {min} character(s)"
    )));
    Err(error)
}
