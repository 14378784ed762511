use std::sync::Arc;

use wrapp_container::{
    Container, ConstructorCandidate, Lifetime, ParameterDescriptor, TypeDescriptor, TypeMetadata,
};

trait Service: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
struct Database;
impl Service for Database {
    fn name(&self) -> &'static str {
        "database"
    }
}

/// Shared by every consumer within one resolve
#[derive(Debug)]
struct Session;

struct Repository {
    session: Arc<Session>,
}

struct Handler {
    service: Arc<Arc<dyn Service>>,
    session: Arc<Session>,
    repository: Arc<Repository>,
}

fn main() {
    let service = TypeDescriptor::interface::<Arc<dyn Service>>();
    let session = TypeDescriptor::class::<Session>();

    let container = Container::new();
    container
        .describe(TypeMetadata::of::<Database>().constructor(ConstructorCandidate::new(|_| Ok(Database))))
        .describe(TypeMetadata::of::<Session>().constructor(ConstructorCandidate::new(|_| Ok(Session))))
        .describe(
            TypeMetadata::of::<Repository>().constructor(
                ConstructorCandidate::new(|args| Ok(Repository { session: args.next()? }))
                    .param(ParameterDescriptor::new("session", session.clone())),
            ),
        )
        .describe(
            TypeMetadata::of::<Handler>()
                // Never selected, the service can be resolved
                .constructor(
                    ConstructorCandidate::new(|args| {
                        Ok(Handler {
                            service: Arc::new(Arc::new(Database) as Arc<dyn Service>),
                            session: args.next()?,
                            repository: args.next()?,
                        })
                    })
                    .param(ParameterDescriptor::new("session", session.clone()))
                    .param(ParameterDescriptor::new("repository", TypeDescriptor::class::<Repository>())),
                )
                .constructor(
                    ConstructorCandidate::new(|args| {
                        Ok(Handler {
                            service: args.next()?,
                            session: args.next()?,
                            repository: args.next()?,
                        })
                    })
                    .param(ParameterDescriptor::new("service", service.clone()))
                    .param(ParameterDescriptor::new("session", session.clone()))
                    .param(ParameterDescriptor::new("repository", TypeDescriptor::class::<Repository>())),
                ),
        )
        .register_type(session, None, Lifetime::PerResolve)
        .register_mapping(
            service,
            None,
            Lifetime::Singleton,
            TypeDescriptor::class::<Database>(),
            |database: Arc<Database>| database as Arc<dyn Service>,
        );

    println!("{:?}", container);
    if let Err(err) = container.validate() {
        println!("{err}");
        return;
    }

    let first = match container.require::<Handler>() {
        Ok(handler) => handler,
        Err(err) => {
            println!("{err}");
            return;
        }
    };
    println!("service: {}", first.service.name());
    println!(
        "session shared within a resolve: {}",
        Arc::ptr_eq(&first.session, &first.repository.session)
    );

    if let Ok(second) = container.require::<Handler>() {
        println!(
            "session shared across resolves: {}",
            Arc::ptr_eq(&first.session, &second.session)
        );
    }
}
