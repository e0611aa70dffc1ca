use crate::error::StoreResult;
use crate::model::{
    CachedPage, NewPost, NewTopic, Post, PostId, RequestContext, Session, SessionToken,
    SessionUser, Topic, TopicId,
};
use time::Duration;

/// Resolves the session attached to the current request.
pub trait SessionProvider: Send + Sync + 'static {
    /// Returns the live session for the request, or `None` when the request is anonymous,
    /// the token is unknown, or the session has expired.
    fn current_session(&self, ctx: &RequestContext) -> StoreResult<Option<Session>>;
}

/// Sign-in and sign-out plumbing for the session backend.
pub trait SessionRegistry: Send + Sync + 'static {
    /// Stores a session for `user` and returns the token the client should present.
    fn create_session(&self, user: SessionUser, ttl: Option<Duration>)
        -> StoreResult<SessionToken>;

    /// Removes the session. Returns `false` when no session was stored for the token.
    fn end_session(&self, token: &SessionToken) -> StoreResult<bool>;
}

/// The data access the post creation workflow needs.
pub trait PostRepository: Send + Sync + 'static {
    /// Finds the first topic whose slug equals `slug`.
    fn find_topic_by_slug(&self, slug: &str) -> StoreResult<Option<Topic>>;

    /// Inserts a post and returns the stored record with its generated id.
    ///
    /// Fails with a `Conflict` when `post.topic_id` does not reference a stored topic.
    fn create_post(&self, post: NewPost) -> StoreResult<Post>;
}

/// Topic administration and the read side of posts.
pub trait TopicCatalog: Send + Sync + 'static {
    /// Creates a topic. Slugs are unique.
    fn create_topic(&self, topic: NewTopic) -> StoreResult<Topic>;

    fn get_post(&self, id: &PostId) -> StoreResult<Option<Post>>;

    /// Posts of a topic, newest first.
    fn posts_for_topic(&self, topic: &TopicId) -> StoreResult<Vec<Post>>;
}

/// Marks cached page renderings stale.
pub trait PathRevalidator: Send + Sync + 'static {
    /// Drops the cached rendering of `path`. Backend failures are logged, not returned.
    fn revalidate_path(&self, path: &str);
}

/// Rendered pages keyed by route path.
pub trait PageCache: Send + Sync + 'static {
    fn get_page(&self, path: &str) -> StoreResult<Option<CachedPage>>;

    fn put_page(&self, path: &str, body: String) -> StoreResult<()>;
}
