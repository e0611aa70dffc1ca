use crate::error::{conflict, invalid_argument, StoreResult};
use crate::mapping::session_storage_key;
use crate::model::{
    CachedPage, NewPost, NewTopic, Post, PostId, RequestContext, Session, SessionToken,
    SessionUser, Topic, TopicId,
};
use crate::store::{
    PageCache, PathRevalidator, PostRepository, SessionProvider, SessionRegistry, TopicCatalog,
};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

pub(crate) const SLUG_UNIQUE_VIOLATION: &str = "Unique constraint failed on the fields: (`slug`)";
pub(crate) const TOPIC_FOREIGN_KEY_VIOLATION: &str =
    "Foreign key constraint failed on the field: `topicId`";

/// In-memory session backend. Expiration is handled lazily on access.
pub struct InMemorySessions {
    entries: DashMap<String, Session>,
    cleanup_hint: Mutex<OffsetDateTime>,
}

impl Default for InMemorySessions {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            cleanup_hint: Mutex::new(OffsetDateTime::now_utc()),
        }
    }
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an already built session under `token`. Useful for sessions without a user.
    pub fn insert(&self, token: &SessionToken, session: Session) {
        self.entries.insert(session_storage_key(token), session);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_cleanup(&self, now: OffsetDateTime) {
        let mut guard = self.cleanup_hint.lock();
        if now - *guard < Duration::seconds(60) {
            return;
        }
        self.entries.retain(|_, session| !session.is_expired(now));
        *guard = now;
    }
}

impl SessionProvider for InMemorySessions {
    fn current_session(&self, ctx: &RequestContext) -> StoreResult<Option<Session>> {
        let Some(token) = ctx.session_token.as_ref() else {
            return Ok(None);
        };
        let now = OffsetDateTime::now_utc();
        self.maybe_cleanup(now);
        let key = session_storage_key(token);
        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove(&key);
                return Ok(None);
            }
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }
}

impl SessionRegistry for InMemorySessions {
    fn create_session(
        &self,
        user: SessionUser,
        ttl: Option<Duration>,
    ) -> StoreResult<SessionToken> {
        if let Some(ttl) = ttl {
            if !ttl.is_positive() {
                return Err(invalid_argument("session ttl must be positive"));
            }
        }
        let token = SessionToken::generate();
        self.insert(&token, Session::for_user(user, ttl));
        Ok(token)
    }

    fn end_session(&self, token: &SessionToken) -> StoreResult<bool> {
        Ok(self.entries.remove(&session_storage_key(token)).is_some())
    }
}

/// In-memory topics and posts backed by concurrent hash maps.
#[derive(Default)]
pub struct InMemoryPostStore {
    topics: DashMap<String, Topic>,
    topic_ids: DashSet<TopicId>,
    posts: DashMap<PostId, Post>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}

impl PostRepository for InMemoryPostStore {
    fn find_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>> {
        Ok(self.topics.get(slug).map(|topic| topic.clone()))
    }

    fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        if !self.topic_ids.contains(&post.topic_id) {
            return Err(conflict(TOPIC_FOREIGN_KEY_VIOLATION));
        }
        let post = post.into_post(OffsetDateTime::now_utc());
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }
}

impl TopicCatalog for InMemoryPostStore {
    fn create_topic(&self, topic: NewTopic) -> StoreResult<Topic> {
        if topic.slug.is_empty() {
            return Err(invalid_argument("topic slug must not be empty"));
        }
        match self.topics.entry(topic.slug.clone()) {
            Entry::Occupied(_) => Err(conflict(SLUG_UNIQUE_VIOLATION)),
            Entry::Vacant(vac) => {
                let topic = topic.into_topic(OffsetDateTime::now_utc());
                self.topic_ids.insert(topic.id);
                vac.insert(topic.clone());
                Ok(topic)
            }
        }
    }

    fn get_post(&self, id: &PostId) -> StoreResult<Option<Post>> {
        Ok(self.posts.get(id).map(|post| post.clone()))
    }

    fn posts_for_topic(&self, topic: &TopicId) -> StoreResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|entry| entry.value().topic_id == *topic)
            .map(|entry| entry.value().clone())
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }
}

/// In-memory page cache that also records every revalidated path in order.
#[derive(Default)]
pub struct InMemoryPageCache {
    pages: DashMap<String, CachedPage>,
    revalidated: Mutex<Vec<String>>,
}

impl InMemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths passed to `revalidate_path`, oldest first.
    pub fn revalidated_paths(&self) -> Vec<String> {
        self.revalidated.lock().clone()
    }
}

impl PageCache for InMemoryPageCache {
    fn get_page(&self, path: &str) -> StoreResult<Option<CachedPage>> {
        Ok(self.pages.get(path).map(|page| page.clone()))
    }

    fn put_page(&self, path: &str, body: String) -> StoreResult<()> {
        self.pages.insert(
            path.to_string(),
            CachedPage {
                body,
                rendered_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }
}

impl PathRevalidator for InMemoryPageCache {
    fn revalidate_path(&self, path: &str) {
        self.pages.remove(path);
        self.revalidated.lock().push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;

    fn user(id: &str) -> SessionUser {
        SessionUser {
            id: UserId::new(id),
            name: None,
        }
    }

    #[test]
    fn anonymous_context_has_no_session() {
        let sessions = InMemorySessions::new();
        sessions.create_session(user("u1"), None).expect("create");
        let found = sessions
            .current_session(&RequestContext::anonymous())
            .expect("lookup");
        assert!(found.is_none());
    }

    #[test]
    fn expired_session_is_dropped_on_access() {
        let sessions = InMemorySessions::new();
        let token = SessionToken::generate();
        let mut session = Session::for_user(user("u1"), None);
        session.expires_at = Some(OffsetDateTime::now_utc() - Duration::seconds(1));
        sessions.insert(&token, session);

        let found = sessions
            .current_session(&RequestContext::with_token(token))
            .expect("lookup");
        assert!(found.is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let sessions = InMemorySessions::new();
        let err = sessions
            .create_session(user("u1"), Some(Duration::ZERO))
            .expect_err("zero ttl");
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn revalidation_drops_only_the_given_path() {
        let cache = InMemoryPageCache::new();
        cache.put_page("/topics/a", "a".into()).expect("put a");
        cache.put_page("/topics/b", "b".into()).expect("put b");

        cache.revalidate_path("/topics/a");

        assert!(cache.get_page("/topics/a").expect("get a").is_none());
        assert!(cache.get_page("/topics/b").expect("get b").is_some());
        assert_eq!(cache.revalidated_paths(), vec!["/topics/a".to_string()]);
    }
}
