use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Identifier of a signed-in user, as issued by the auth provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId(pub Uuid);

impl TopicId {
    /// Generates a fresh topic identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TopicId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub Uuid);

impl PostId {
    /// Generates a fresh post identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque credential presented by the client (cookie or bearer value).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Issues a random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: Option<String>,
}

/// Authenticated identity attached to a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
}

impl Session {
    /// Builds a session for `user` that expires after `ttl`, or never when `ttl` is `None`.
    pub fn for_user(user: SessionUser, ttl: Option<Duration>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            user: Some(user),
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        }
    }

    /// Returns the user id when the session carries an identity.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|user| &user.id)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        match self.expires_at {
            Some(exp) => now >= exp,
            None => false,
        }
    }
}

/// Ambient request information handed to the session provider.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub session_token: Option<SessionToken>,
}

impl RequestContext {
    /// Context for an anonymous request.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            session_token: Some(token),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub slug: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTopic {
    pub slug: String,
    pub description: String,
}

impl NewTopic {
    pub fn new(slug: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            description: description.into(),
        }
    }

    pub(crate) fn into_topic(self, now: OffsetDateTime) -> Topic {
        Topic {
            id: TopicId::new(),
            slug: self.slug,
            description: self.description,
            created_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Insert payload for a post. Ids and timestamps are assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user_id: UserId,
    pub topic_id: TopicId,
}

impl NewPost {
    pub(crate) fn into_post(self, now: OffsetDateTime) -> Post {
        Post {
            id: PostId::new(),
            title: self.title,
            content: self.content,
            user_id: self.user_id,
            topic_id: self.topic_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Cached rendering of a page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPage {
    pub body: String,
    pub rendered_at: OffsetDateTime,
}
