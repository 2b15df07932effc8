//! Declarative backend config for the microblog.
//!
//! Everything the runtime needs in one value: the posts schema with
//! timestamps, auth with an admin role and a permissive default role, and
//! a seed for fresh databases.

use plinth_core::prelude::*;
use serde_json::json;

pub fn app_config(connection: Connection) -> AppConfig {
    AppConfig::new(connection)
        .data(
            Schema::new()
                .entity(
                    entity("posts")
                        .field(text("content").required())
                        .field(text("url"))
                        .index(["created_at"]),
                )
                .with_timestamps(&["posts"], true),
        )
        .auth(
            AuthConfig::enabled()
                .allow_register(true)
                .issuer("plinth-microblog-demo")
                .role(RoleConfig::new("admin").implicit_allow())
                .role(
                    RoleConfig::new("default")
                        .permissions([
                            "system.access.api",
                            "data.database.sync",
                            "data.entity.create",
                            "data.entity.delete",
                            "data.entity.update",
                            "data.entity.read",
                            "media.file.delete",
                            "media.file.read",
                            "media.file.list",
                            "media.file.upload",
                        ])
                        .is_default(),
                ),
        )
        .sync(SyncOptions { force: true, drop: true })
        .seed(seed)
}

async fn seed(api: Api) -> anyhow::Result<()> {
    api.auth().create_user("admin@example.com", "password", "admin").await?;
    api.auth().create_user("user@example.com", "password", "default").await?;

    let posts = [
        json!({
            "content": "Just shipped a new feature! The feeling of deploying something you built from scratch never gets old.",
        }),
        json!({
            "content": "Hot take: TypeScript is just documentation that happens to compile.",
            "url": "https://twitter.com/example/status/123",
        }),
        json!({
            "content": "Today I learned that SQLite can handle way more than most people think. Millions of rows? No problem.",
        }),
        json!({
            "content": "Reading \"Designing Data-Intensive Applications\" for the third time. Still finding new insights.",
        }),
        json!({
            "content": "Simplicity is the ultimate sophistication. Delete that abstraction you don't need yet.",
        }),
        json!({
            "content": "Coffee count today: ☕☕☕☕ (it's only 2pm)",
        }),
        json!({
            "content": "The best code is no code. The second best is code someone else already wrote and tested.",
            "url": "https://github.com/plinth-dev/plinth",
        }),
        json!({
            "content": "Debugging tip: explain the problem to a rubber duck. If that fails, explain it to a coworker. If that fails, take a walk.",
        }),
    ];
    for post in posts {
        api.data().create_one("posts", post).await?;
    }
    Ok(())
}
