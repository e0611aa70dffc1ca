#![cfg(feature = "redis")]

use std::thread::sleep;
use std::time::Duration as StdDuration;
use time::Duration;
use topic_posts::redis_store::RedisStore;
use topic_posts::{
    create_backends, BackendConfig, CreatePostAction, ErrorCode, FormData, FormState, NewPost,
    NewTopic, PathRevalidator, PostRepository, RequestContext, SessionProvider, SessionRegistry,
    SessionUser, TopicCatalog, UserId,
};
use uuid::Uuid;

fn redis_url() -> Option<String> {
    std::env::var("REDIS_URL").ok()
}

fn isolated_namespace() -> String {
    format!("topic-posts:test:{}", Uuid::new_v4())
}

fn user(id: &str) -> SessionUser {
    SessionUser {
        id: UserId::new(id),
        name: None,
    }
}

#[test]
fn redis_workflow_round_trip() {
    let Some(url) = redis_url() else {
        eprintln!("skipping redis_workflow_round_trip: REDIS_URL not set");
        return;
    };

    let backends = create_backends(BackendConfig::Redis {
        url,
        namespace: isolated_namespace(),
    })
    .expect("construct redis backends");
    let topic = backends
        .catalog
        .create_topic(NewTopic::new("general", "General"))
        .expect("topic");
    let token = backends
        .session_registry
        .create_session(user("user-redis"), None)
        .expect("session");
    backends
        .pages
        .put_page("/topics/general", "cached".into())
        .expect("cache page");

    let action = CreatePostAction::from_backends(&backends);
    let form = FormData::new()
        .with("title", "Stored in Redis")
        .with("content", "A post that goes through the Redis backend.");
    let outcome = action.create_post(
        &RequestContext::with_token(token),
        "general",
        &FormState::empty(),
        &form,
    );

    let redirect = outcome.redirect().expect("redirect");
    let stored = backends
        .catalog
        .get_post(&redirect.post.id)
        .expect("get post")
        .expect("present");
    assert_eq!(stored, redirect.post);
    assert_eq!(stored.topic_id, topic.id);
    assert_eq!(
        backends.catalog.posts_for_topic(&topic.id).expect("list"),
        vec![stored]
    );
    assert!(backends
        .pages
        .get_page("/topics/general")
        .expect("get page")
        .is_none());
}

#[test]
fn redis_rejects_duplicate_slugs() {
    let Some(url) = redis_url() else {
        eprintln!("skipping redis_rejects_duplicate_slugs: REDIS_URL not set");
        return;
    };

    let store = RedisStore::from_url_with_namespace(url, isolated_namespace()).expect("store");
    store
        .create_topic(NewTopic::new("rust", "Rust"))
        .expect("first topic");
    let err = store
        .create_topic(NewTopic::new("rust", "Rust again"))
        .expect_err("duplicate");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[test]
fn redis_duplicate_slug_leaves_one_topic_id() {
    let Some(url) = redis_url() else {
        eprintln!("skipping redis_duplicate_slug_leaves_one_topic_id: REDIS_URL not set");
        return;
    };

    let namespace = isolated_namespace();
    let store = RedisStore::from_url_with_namespace(&url, &namespace).expect("store");
    let first = store
        .create_topic(NewTopic::new("rust", "Rust"))
        .expect("first topic");
    store
        .create_topic(NewTopic::new("rust", "Rust again"))
        .expect_err("duplicate");

    let mut conn = redis::Client::open(url.as_str())
        .and_then(|client| client.get_connection())
        .expect("connection");
    let id_keys: Vec<String> = redis::cmd("KEYS")
        .arg(format!("{namespace}:topic:id:*"))
        .query(&mut conn)
        .expect("keys");
    assert_eq!(id_keys, vec![format!("{namespace}:topic:id:{}", first.id)]);

    let found = store
        .find_topic_by_slug("rust")
        .expect("lookup")
        .expect("present");
    assert_eq!(found, first);
    let post = store
        .create_post(NewPost {
            title: "Still works".into(),
            content: "The first topic keeps accepting posts.".into(),
            user_id: UserId::new("author"),
            topic_id: first.id,
        })
        .expect("post for surviving topic");
    assert_eq!(
        store.posts_for_topic(&first.id).expect("list"),
        vec![post]
    );
}

#[test]
fn redis_sessions_with_ttl_carry_an_expiry() {
    let Some(url) = redis_url() else {
        eprintln!("skipping redis_sessions_with_ttl_carry_an_expiry: REDIS_URL not set");
        return;
    };

    let namespace = isolated_namespace();
    let store = RedisStore::from_url_with_namespace(&url, &namespace).expect("store");
    store
        .create_session(user("ttl"), Some(Duration::minutes(5)))
        .expect("session");

    let mut conn = redis::Client::open(url.as_str())
        .and_then(|client| client.get_connection())
        .expect("connection");
    let keys: Vec<String> = redis::cmd("KEYS")
        .arg(format!("{namespace}:session:*"))
        .query(&mut conn)
        .expect("keys");
    assert_eq!(keys.len(), 1);
    let ttl_ms: i64 = redis::cmd("PTTL")
        .arg(&keys[0])
        .query(&mut conn)
        .expect("pttl");
    assert!(ttl_ms > 0 && ttl_ms <= 300_000, "unexpected ttl {ttl_ms}");
}

#[test]
fn redis_sessions_expire_and_end() {
    let Some(url) = redis_url() else {
        eprintln!("skipping redis_sessions_expire_and_end: REDIS_URL not set");
        return;
    };

    let store = RedisStore::from_url_with_namespace(url, isolated_namespace()).expect("store");
    let short = store
        .create_session(user("short"), Some(Duration::milliseconds(100)))
        .expect("short session");
    let long = store
        .create_session(user("long"), None)
        .expect("long session");

    let short_ctx = RequestContext::with_token(short);
    assert!(store.current_session(&short_ctx).expect("lookup").is_some());
    sleep(StdDuration::from_millis(200));
    assert!(store.current_session(&short_ctx).expect("lookup").is_none());

    assert!(store.end_session(&long).expect("end"));
    assert!(store
        .current_session(&RequestContext::with_token(long))
        .expect("lookup")
        .is_none());
}

#[test]
fn unreachable_redis_does_not_panic_on_revalidate() {
    let store = RedisStore::from_url("redis://127.0.0.1:1/").expect("client");
    store.revalidate_path("/topics/general");
}
