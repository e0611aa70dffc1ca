#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod form;
pub mod inmemory;
pub mod mapping;
pub mod model;
pub mod paths;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;
pub mod validation;
pub mod workflow;

pub use config::{create_backends, ActionConfig, BackendConfig, Backends};
pub use error::{ErrorCode, StoreError, StoreResult};
pub use form::{FormData, FormField, FormState};
pub use model::{
    CachedPage, NewPost, NewTopic, Post, PostId, RequestContext, Session, SessionToken,
    SessionUser, Topic, TopicId, UserId,
};
pub use paths::Paths;
pub use store::{
    PageCache, PathRevalidator, PostRepository, SessionProvider, SessionRegistry, TopicCatalog,
};
pub use workflow::{CreatePostAction, CreatePostOutcome, Redirect};
