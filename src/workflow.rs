//! The create-post form action.
//!
//! Runs schema validation, the session check, the topic lookup and the insert in that
//! order. Every failure comes back as a [`FormState`]; side effects (insert, page
//! revalidation) only happen once all checks have passed.

use crate::config::{ActionConfig, Backends};
use crate::error::StoreError;
use crate::form::{FormData, FormState};
use crate::model::{NewPost, Post, RequestContext};
use crate::paths::Paths;
use crate::store::{PathRevalidator, PostRepository, SessionProvider};
use crate::validation::validate_post_input;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SIGN_IN_REQUIRED: &str = "you must be sign in to do this";
pub const TOPIC_NOT_FOUND: &str = "Can't find topic!";
pub const GENERIC_FAILURE: &str = "something went wrong";

/// Where to send the client after a successful submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub post: Post,
}

/// Result of one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreatePostOutcome {
    /// The post was stored; navigate to `location`.
    Redirect(Redirect),
    /// Nothing was stored; render the form again with these errors.
    Rejected(FormState),
}

impl CreatePostOutcome {
    pub fn form_state(&self) -> Option<&FormState> {
        match self {
            CreatePostOutcome::Rejected(state) => Some(state),
            CreatePostOutcome::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            CreatePostOutcome::Redirect(redirect) => Some(redirect),
            CreatePostOutcome::Rejected(_) => None,
        }
    }
}

pub struct CreatePostAction {
    sessions: Arc<dyn SessionProvider>,
    posts: Arc<dyn PostRepository>,
    revalidator: Arc<dyn PathRevalidator>,
    config: ActionConfig,
}

impl CreatePostAction {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        posts: Arc<dyn PostRepository>,
        revalidator: Arc<dyn PathRevalidator>,
    ) -> Self {
        Self {
            sessions,
            posts,
            revalidator,
            config: ActionConfig::default(),
        }
    }

    pub fn from_backends(backends: &Backends) -> Self {
        Self::new(
            backends.sessions.clone(),
            backends.posts.clone(),
            backends.revalidator.clone(),
        )
    }

    pub fn with_config(mut self, config: ActionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.config.paths
    }

    /// Handles one submission of the create-post form for the topic `slug`.
    ///
    /// `_previous` is the state the form was rendered with; it does not influence the result.
    pub fn create_post(
        &self,
        ctx: &RequestContext,
        slug: &str,
        _previous: &FormState,
        form: &FormData,
    ) -> CreatePostOutcome {
        let input = match validate_post_input(form) {
            Ok(input) => input,
            Err(errors) => {
                debug!(slug, "create post rejected: invalid input");
                return CreatePostOutcome::Rejected(errors);
            }
        };

        let session = match self.sessions.current_session(ctx) {
            Ok(session) => session,
            Err(err) => {
                warn!(slug, error = %err, "session lookup failed; treating request as anonymous");
                None
            }
        };
        let Some(user_id) = session
            .as_ref()
            .and_then(|session| session.user_id())
            .cloned()
        else {
            debug!(slug, "create post rejected: not signed in");
            return CreatePostOutcome::Rejected(FormState::form_error(SIGN_IN_REQUIRED));
        };

        let topic = match self.posts.find_topic_by_slug(slug) {
            Ok(Some(topic)) => topic,
            Ok(None) => {
                debug!(slug, "create post rejected: unknown topic");
                return CreatePostOutcome::Rejected(FormState::form_error(TOPIC_NOT_FOUND));
            }
            Err(err) => return self.store_failure(slug, "topic lookup", err),
        };

        let post = match self.posts.create_post(NewPost {
            title: input.title,
            content: input.content,
            user_id,
            topic_id: topic.id,
        }) {
            Ok(post) => post,
            Err(err) => return self.store_failure(slug, "post insert", err),
        };

        let paths = &self.config.paths;
        self.revalidator.revalidate_path(&paths.topic_show(slug));
        let location = paths.post_show(slug, &post.id);
        info!(
            slug,
            post_id = %post.id,
            user_id = %post.user_id,
            "post created"
        );
        CreatePostOutcome::Redirect(Redirect { location, post })
    }

    fn store_failure(&self, slug: &str, stage: &'static str, err: StoreError) -> CreatePostOutcome {
        warn!(slug, stage, code = ?err.code, error = %err, "create post failed");
        let message = match err.readable_message() {
            Some(message) if self.config.expose_store_errors => message.to_string(),
            _ => GENERIC_FAILURE.to_string(),
        };
        CreatePostOutcome::Rejected(FormState::form_error(message))
    }
}
