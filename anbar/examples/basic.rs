//! Basic walkthrough of the Anbar container facade.

use std::sync::Arc;

use anbar::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

trait Mailer: Send + Sync {
    fn send(&self, to: &str, body: &str);
}

struct SmtpMailer {
    logger: Arc<dyn Logger>,
    host: String,
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, body: &str) {
        self.logger
            .log(&format!("smtp://{} -> {to}: {body}", self.host));
    }
}

struct SignupService {
    mailer: Arc<dyn Mailer>,
}

impl SignupService {
    fn signup(&self, email: &str) {
        self.mailer.send(email, "welcome aboard");
    }
}

// Cataloged component: picked up by register_module("messaging").
component! {
    module: "messaging",
    key: "console-logger",
    implementation: ConsoleLogger,
    services: [dyn Logger],
    construct: |_, _| Ok(erase(ConsoleLogger)),
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("anbar=debug")
        .init();

    // One explicit container, passed around from the entry point.
    let container = Container::new();

    // Bulk-register the cataloged messaging components.
    container.register_module("messaging")?;

    // Programmatic registrations on top.
    container.register_with::<SmtpMailer, _>(
        "smtp-mailer",
        Lifestyle::Singleton,
        bindings![SmtpMailer => dyn Mailer],
        |r, _| {
            let logger: Arc<dyn Logger> = resolve(r)?;
            Ok(SmtpMailer {
                logger,
                host: "mail.local".to_string(),
            })
        },
    )?;
    container.register_transient::<SignupService, _>(|r, _| {
        let mailer: Arc<dyn Mailer> = resolve(r)?;
        Ok(SignupService { mailer })
    })?;

    println!("container ready: {container:?}");

    // === A unit of work inside a scope ===
    {
        let scope = container.begin();

        let signup: Arc<SignupService> = container.resolve()?;
        signup.signup("dev@example.org");

        let another: Arc<SignupService> = container.resolve()?;
        another.signup("ops@example.org");

        println!("scope tracks {} instances", scope.tracked_count());
        scope.dispose();
    }
    // Scope disposed: the transient services were released.
    println!("live instances after scope: {}", container.live_instances());

    // Singletons are shared.
    let mailer_a: Arc<dyn Mailer> = container.resolve()?;
    let mailer_b: Arc<dyn Mailer> = container.resolve_named("smtp-mailer")?;
    assert!(Arc::ptr_eq(&mailer_a, &mailer_b));

    // Tear down and start over.
    container.clear();
    println!("after clear: {container:?}");

    Ok(())
}
