use crate::error::{conflict, invalid_argument, redis_error, serde_error, StoreResult};
use crate::inmemory::{SLUG_UNIQUE_VIOLATION, TOPIC_FOREIGN_KEY_VIOLATION};
use crate::mapping::session_storage_key;
use crate::model::{
    CachedPage, NewPost, NewTopic, Post, PostId, RequestContext, Session, SessionToken,
    SessionUser, Topic, TopicId,
};
use crate::store::{
    PageCache, PathRevalidator, PostRepository, SessionProvider, SessionRegistry, TopicCatalog,
};
use redis::{Client, Commands, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use time::{Duration, OffsetDateTime};

pub const DEFAULT_NAMESPACE: &str = "topic-posts";

/// Redis-backed topics, posts, sessions and page cache, all under one namespace prefix.
///
/// Layout:
/// * `{ns}:topic:slug:{slug}` → topic JSON
/// * `{ns}:topic:id:{id}` → slug
/// * `{ns}:post:{id}` → post JSON
/// * `{ns}:topic:{id}:posts` → sorted set of post ids scored by creation time in microseconds
/// * `{ns}:session:{sha256(token)}` → session JSON, written with `PSETEX` when the session expires
/// * `{ns}:page:{path}` → cached page JSON
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    namespace: String,
}

impl RedisStore {
    /// Creates a store using a Redis URL and the default namespace prefix.
    pub fn from_url(url: impl AsRef<str>) -> StoreResult<Self> {
        Self::from_url_with_namespace(url, DEFAULT_NAMESPACE)
    }

    /// Creates a store using a Redis URL and a custom namespace prefix.
    pub fn from_url_with_namespace(
        url: impl AsRef<str>,
        namespace: impl Into<String>,
    ) -> StoreResult<Self> {
        let client = Client::open(url.as_ref()).map_err(redis_error)?;
        Ok(Self::with_namespace(client, namespace))
    }

    pub fn with_namespace(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn conn(&self) -> StoreResult<Connection> {
        self.client.get_connection().map_err(redis_error)
    }

    fn topic_slug_key(&self, slug: &str) -> String {
        format!("{}:topic:slug:{slug}", self.namespace)
    }

    fn topic_id_key(&self, id: &TopicId) -> String {
        format!("{}:topic:id:{id}", self.namespace)
    }

    fn topic_posts_key(&self, id: &TopicId) -> String {
        format!("{}:topic:{id}:posts", self.namespace)
    }

    fn post_key(&self, id: impl fmt::Display) -> String {
        format!("{}:post:{id}", self.namespace)
    }

    fn session_key(&self, token: &SessionToken) -> String {
        format!("{}:session:{}", self.namespace, session_storage_key(token))
    }

    fn page_key(&self, path: &str) -> String {
        format!("{}:page:{path}", self.namespace)
    }

    fn release_topic_id(&self, conn: &mut Connection, id_key: &str) {
        if let Err(err) = conn.del::<_, ()>(id_key) {
            tracing::warn!(
                namespace = %self.namespace,
                key = id_key,
                error = %err,
                "failed to release topic id after losing slug claim"
            );
        }
    }

    fn serialize<T: Serialize>(value: &T) -> StoreResult<String> {
        serde_json::to_string(value).map_err(serde_error)
    }

    fn deserialize<T: DeserializeOwned>(payload: String) -> StoreResult<T> {
        serde_json::from_str(&payload).map_err(serde_error)
    }

    fn get_json<T: DeserializeOwned>(conn: &mut Connection, key: &str) -> StoreResult<Option<T>> {
        let payload: Option<String> = conn.get(key).map_err(redis_error)?;
        payload.map(Self::deserialize).transpose()
    }
}

/// Sorted-set score for a post: microseconds since the epoch, exact in an `f64`.
fn post_score(created_at: &OffsetDateTime) -> f64 {
    (created_at.unix_timestamp_nanos() / 1_000) as f64
}

/// Millisecond TTL for `PSETEX`, rounded up to at least one millisecond.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.whole_milliseconds()).unwrap_or(u64::MAX).max(1)
}

impl SessionProvider for RedisStore {
    fn current_session(&self, ctx: &RequestContext) -> StoreResult<Option<Session>> {
        let Some(token) = ctx.session_token.as_ref() else {
            return Ok(None);
        };
        let mut conn = self.conn()?;
        let session: Option<Session> = Self::get_json(&mut conn, &self.session_key(token))?;
        // Redis expiry has millisecond granularity; the stored deadline is authoritative.
        Ok(session.filter(|session| !session.is_expired(OffsetDateTime::now_utc())))
    }
}

impl SessionRegistry for RedisStore {
    fn create_session(
        &self,
        user: SessionUser,
        ttl: Option<Duration>,
    ) -> StoreResult<SessionToken> {
        let ttl_ms = match ttl {
            Some(ttl) if !ttl.is_positive() => {
                return Err(invalid_argument("session ttl must be positive"))
            }
            Some(ttl) => Some(ttl_millis(ttl)),
            None => None,
        };
        let token = SessionToken::generate();
        let payload = Self::serialize(&Session::for_user(user, ttl))?;
        let key = self.session_key(&token);
        let mut conn = self.conn()?;
        // Value and expiry go out in one command so a session is never stored without its TTL.
        let written = match ttl_ms {
            Some(ttl_ms) => conn.pset_ex::<_, _, ()>(&key, payload, ttl_ms),
            None => conn.set::<_, _, ()>(&key, payload),
        };
        written.map_err(redis_error)?;
        Ok(token)
    }

    fn end_session(&self, token: &SessionToken) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let removed: u64 = conn.del(self.session_key(token)).map_err(redis_error)?;
        Ok(removed > 0)
    }
}

impl PostRepository for RedisStore {
    fn find_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>> {
        let mut conn = self.conn()?;
        Self::get_json(&mut conn, &self.topic_slug_key(slug))
    }

    fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut conn = self.conn()?;
        let topic_exists: bool = conn
            .exists(self.topic_id_key(&post.topic_id))
            .map_err(redis_error)?;
        if !topic_exists {
            return Err(conflict(TOPIC_FOREIGN_KEY_VIOLATION));
        }
        let post = post.into_post(OffsetDateTime::now_utc());
        let payload = Self::serialize(&post)?;
        let score = post_score(&post.created_at);
        redis::pipe()
            .atomic()
            .set(self.post_key(&post.id), payload)
            .ignore()
            .zadd(self.topic_posts_key(&post.topic_id), post.id.to_string(), score)
            .ignore()
            .query::<()>(&mut conn)
            .map_err(redis_error)?;
        Ok(post)
    }
}

impl TopicCatalog for RedisStore {
    fn create_topic(&self, topic: NewTopic) -> StoreResult<Topic> {
        if topic.slug.is_empty() {
            return Err(invalid_argument("topic slug must not be empty"));
        }
        let topic = topic.into_topic(OffsetDateTime::now_utc());
        let payload = Self::serialize(&topic)?;
        let mut conn = self.conn()?;
        let id_key = self.topic_id_key(&topic.id);
        // The id key backs the post foreign-key check, so it exists before the slug is visible.
        conn.set::<_, _, ()>(&id_key, &topic.slug)
            .map_err(redis_error)?;
        let claimed = conn
            .set_nx::<_, _, bool>(self.topic_slug_key(&topic.slug), payload)
            .map_err(redis_error);
        match claimed {
            Ok(true) => Ok(topic),
            Ok(false) => {
                self.release_topic_id(&mut conn, &id_key);
                Err(conflict(SLUG_UNIQUE_VIOLATION))
            }
            Err(err) => {
                self.release_topic_id(&mut conn, &id_key);
                Err(err)
            }
        }
    }

    fn get_post(&self, id: &PostId) -> StoreResult<Option<Post>> {
        let mut conn = self.conn()?;
        Self::get_json(&mut conn, &self.post_key(id))
    }

    fn posts_for_topic(&self, topic: &TopicId) -> StoreResult<Vec<Post>> {
        let mut conn = self.conn()?;
        let ids: Vec<String> = conn
            .zrevrange(self.topic_posts_key(topic), 0, -1)
            .map_err(redis_error)?;
        let mut posts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(post) = Self::get_json::<Post>(&mut conn, &self.post_key(&id))? {
                posts.push(post);
            }
        }
        Ok(posts)
    }
}

impl PageCache for RedisStore {
    fn get_page(&self, path: &str) -> StoreResult<Option<CachedPage>> {
        let mut conn = self.conn()?;
        Self::get_json(&mut conn, &self.page_key(path))
    }

    fn put_page(&self, path: &str, body: String) -> StoreResult<()> {
        let page = CachedPage {
            body,
            rendered_at: OffsetDateTime::now_utc(),
        };
        let payload = Self::serialize(&page)?;
        let mut conn = self.conn()?;
        conn.set::<_, _, ()>(self.page_key(path), payload)
            .map_err(redis_error)
    }
}

impl PathRevalidator for RedisStore {
    fn revalidate_path(&self, path: &str) {
        let result = self.conn().and_then(|mut conn| {
            conn.del::<_, ()>(self.page_key(path))
                .map_err(redis_error)
        });
        if let Err(err) = result {
            tracing::warn!(path, error = %err, "failed to revalidate cached page");
        }
    }
}
