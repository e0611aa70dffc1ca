use topic_posts::{
    create_backends, BackendConfig, CreatePostAction, CreatePostOutcome, FormData, FormState,
    NewTopic, RequestContext, SessionUser, StoreResult, UserId,
};
use tracing_subscriber::EnvFilter;

fn main() -> StoreResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("topic_posts=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backends = create_backends(BackendConfig::from_env()?)?;
    let topic = backends
        .catalog
        .create_topic(NewTopic::new("general", "Anything goes"))?;
    println!("Created topic {} ({})", topic.slug, topic.id);

    let action = CreatePostAction::from_backends(&backends);
    let form = FormData::new()
        .with("title", "Hello World")
        .with("content", "This is a test post body.");

    println!("== Anonymous submission ==");
    report(action.create_post(
        &RequestContext::anonymous(),
        &topic.slug,
        &FormState::empty(),
        &form,
    ));

    println!("== Signed-in submission ==");
    let token = backends.session_registry.create_session(
        SessionUser {
            id: UserId::new("user-123"),
            name: Some("Demo".into()),
        },
        None,
    )?;
    let ctx = RequestContext::with_token(token);
    report(action.create_post(&ctx, &topic.slug, &FormState::empty(), &form));

    println!("== Unknown topic ==");
    report(action.create_post(&ctx, "nowhere", &FormState::empty(), &form));
    Ok(())
}

fn report(outcome: CreatePostOutcome) {
    match outcome {
        CreatePostOutcome::Redirect(redirect) => {
            println!("Redirect to {}", redirect.location);
        }
        CreatePostOutcome::Rejected(state) => match serde_json::to_string(&state) {
            Ok(json) => println!("Rejected: {json}"),
            Err(err) => println!("Rejected (unprintable state: {err})"),
        },
    }
}
