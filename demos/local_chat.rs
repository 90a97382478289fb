//! Local chat walkthrough
//!
//! Run with: cargo run --example local_chat
//!
//! Three participants join around Paris. Two of them share a bucket and chat;
//! the third walks into the neighboring cell and ends up in its own group.
//!
//! Configuration is read from `EPHEMERAL_*` environment variables, e.g.
//!   EPHEMERAL_GROUP_CAPACITY=2 cargo run --example local_chat

use std::time::Duration;

use ephemeral_meet::{ChatConfig, ChatService, Coordinate, Radius, SessionSubscription};

async fn drain(name: &str, feed: &mut SessionSubscription) {
    while let Ok(Ok(message)) =
        tokio::time::timeout(Duration::from_millis(50), feed.recv()).await
    {
        println!(
            "  [{}] <{}@{}> {}",
            name,
            message.author_name(),
            message.group(),
            message.text()
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ephemeral_meet=debug".parse()?)
                .add_directive("local_chat=debug".parse()?),
        )
        .init();

    let service = ChatService::new(ChatConfig::from_env());
    let _tasks = service.start();
    let registry = service.registry();

    let notre_dame = Coordinate::new(48.8530, 2.3499)?;
    let louvre = Coordinate::new(48.8606, 2.3376)?;
    let saint_denis = Coordinate::new(48.95, 2.2)?;

    let alice = registry.join(notre_dame, Radius::Meters5000, "alice").await?;
    let bob = registry.join(louvre, Radius::Meters5000, "bob").await?;
    let carol = registry.join(saint_denis, Radius::Meters5000, "carol").await?;

    println!("alice -> {} (bucket {})", alice.group_id, alice.bucket_key);
    println!("bob   -> {} (bucket {})", bob.group_id, bob.bucket_key);
    println!("carol -> {} (bucket {})", carol.group_id, carol.bucket_key);

    let mut alice_feed = registry.subscribe(alice.session_id).await?;
    let mut bob_feed = registry.subscribe(bob.session_id).await?;

    registry.send(alice.session_id, "anyone near the cathedral?").await?;
    registry.send(bob.session_id, "at the louvre, coming over").await?;
    registry.send(carol.session_id, "hello from up north").await?;

    drain("alice", &mut alice_feed).await;
    drain("bob", &mut bob_feed).await;

    println!(
        "people near carol: {}",
        registry.nearby_count(carol.session_id).await?
    );

    // bob heads north and lands in carol's cell
    let placement = registry.update_location(bob.session_id, saint_denis).await?;
    println!("bob moved: {} -> {}", placement.moved, placement.group_id);

    registry.send(carol.session_id, "welcome bob").await?;
    drain("bob", &mut bob_feed).await;

    registry.leave(alice.session_id).await?;

    let stats = service.stats().await;
    println!(
        "Stats: sessions={} groups={} buckets={} published={} avg_group={:.1}",
        stats.active_sessions,
        stats.active_groups,
        stats.active_buckets,
        stats.messages_published,
        stats.average_group_size(),
    );

    Ok(())
}
