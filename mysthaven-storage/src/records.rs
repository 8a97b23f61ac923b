//! [`Record`] bindings for every durable entity.

use std::time::Duration;

use mysthaven_core::{
    BoostedArenaList, Channel, ChannelCooldown, EntityType, Giveaway, HavenResult, Lookup,
    MessageTallyUser, ProgressionUser, StickyMessage, Timestamp,
};
use tracing::info;

use crate::access::{CacheConfig, Record};
use crate::store::DocumentStore;

impl Record for ProgressionUser {
    fn entity_type() -> EntityType {
        EntityType::ProgressionUser
    }

    fn unique_fields() -> &'static [&'static str] {
        &["userId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![ProgressionUser::by_user(&self.user_id)]
    }
}

impl Record for MessageTallyUser {
    fn entity_type() -> EntityType {
        EntityType::MessageTallyUser
    }

    fn unique_fields() -> &'static [&'static str] {
        &["userId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![MessageTallyUser::by_user(&self.user_id)]
    }
}

impl Record for Channel {
    fn entity_type() -> EntityType {
        EntityType::Channel
    }

    fn unique_fields() -> &'static [&'static str] {
        &["userId", "channelId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![
            Channel::by_user(&self.user_id),
            Channel::by_channel(&self.channel_id),
        ]
    }
}

impl Record for StickyMessage {
    fn entity_type() -> EntityType {
        EntityType::StickyMessage
    }

    fn unique_fields() -> &'static [&'static str] {
        &["channelId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![StickyMessage::by_channel(&self.channel_id)]
    }
}

impl Record for BoostedArenaList {
    fn entity_type() -> EntityType {
        EntityType::BoostedArenaList
    }

    fn unique_fields() -> &'static [&'static str] {
        &["guildId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![BoostedArenaList::by_guild(&self.guild_id)]
    }
}

impl Record for ChannelCooldown {
    fn entity_type() -> EntityType {
        EntityType::ChannelCooldown
    }

    fn unique_fields() -> &'static [&'static str] {
        &["channelId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![ChannelCooldown::by_channel(&self.channel_id)]
    }

    /// Lives exactly as long as the latest running cooldown.
    fn cache_ttl(&self, _config: &CacheConfig, now: Timestamp) -> Option<Duration> {
        self.derived_ttl(now)
    }
}

impl Record for Giveaway {
    fn entity_type() -> EntityType {
        EntityType::Giveaway
    }

    fn unique_fields() -> &'static [&'static str] {
        &["giveawayId"]
    }

    fn lookups(&self) -> Vec<Lookup> {
        vec![Giveaway::by_id(&self.giveaway_id)]
    }
}

async fn ensure<R: Record, S: DocumentStore + ?Sized>(store: &S) -> HavenResult<()> {
    for field in R::unique_fields() {
        store
            .ensure_unique_index(R::entity_type().collection(), field)
            .await?;
    }
    Ok(())
}

/// Declare the unique indexes of every durable collection.
pub async fn ensure_indexes<S: DocumentStore + ?Sized>(store: &S) -> HavenResult<()> {
    ensure::<ProgressionUser, S>(store).await?;
    ensure::<MessageTallyUser, S>(store).await?;
    ensure::<Channel, S>(store).await?;
    ensure::<StickyMessage, S>(store).await?;
    ensure::<BoostedArenaList, S>(store).await?;
    ensure::<ChannelCooldown, S>(store).await?;
    ensure::<Giveaway, S>(store).await?;
    info!("Unique indexes ensured");
    Ok(())
}
