use crate::model::PostId;
use serde::{Deserialize, Deserializer, Serialize};

/// Builds the routes of topic and post pages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    /// Prefix prepended to every route, e.g. `/forum`. Empty by default.
    #[serde(default, deserialize_with = "deserialize_base")]
    pub base: String,
}

fn deserialize_base<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let base = String::deserialize(deserializer)?;
    Ok(normalize_base(&base))
}

fn normalize_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

impl Paths {
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: normalize_base(&base.into()),
        }
    }

    pub fn topic_show(&self, slug: &str) -> String {
        format!("{}/topics/{slug}", self.base)
    }

    pub fn post_show(&self, slug: &str, post_id: &PostId) -> String {
        format!("{}/topics/{slug}/posts/{post_id}", self.base)
    }
}
