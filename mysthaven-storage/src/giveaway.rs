//! Giveaway lifecycle.
//!
//! `active -> ended`, with `ended` terminal. Every transition is a single
//! conditional update whose filter restates the guard, so concurrent callers
//! cannot both win. When the update matches nothing the record is reloaded
//! to report why.

use std::sync::{Arc, Mutex};

use mysthaven_core::giveaway::{
    check_can_end, check_can_join, check_can_leave, check_can_reroll, reroll_pool,
};
use mysthaven_core::{
    new_giveaway_id, EntityType, Filter, Giveaway, GiveawayStatus, HavenError, HavenResult,
    NewGiveaway, StateError, Update, ValidationError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, info};

use crate::access::CacheAside;
use crate::cache::{CacheBackend, CacheKey};
use crate::store::DocumentStore;

// ============================================================================
// WINNER SELECTION
// ============================================================================

/// Uniform choice among candidates.
pub trait WinnerSelector: Send + Sync {
    /// Index in `0..len`. Only called with `len > 0`.
    fn pick_index(&self, len: usize) -> usize;

    fn select(&self, candidates: &[String]) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        candidates.get(self.pick_index(candidates.len())).cloned()
    }
}

/// Thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl WinnerSelector for RandomSelector {
    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Deterministic selector for reproducible draws.
#[derive(Debug)]
pub struct SeededSelector {
    rng: Mutex<StdRng>,
}

impl SeededSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl WinnerSelector for SeededSelector {
    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(0..len)
    }
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct GiveawayService<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    access: CacheAside<C, S>,
    selector: Arc<dyn WinnerSelector>,
}

impl<C, S> GiveawayService<C, S>
where
    C: CacheBackend,
    S: DocumentStore,
{
    pub fn new(access: CacheAside<C, S>, selector: Arc<dyn WinnerSelector>) -> Self {
        Self { access, selector }
    }

    pub async fn create(&self, request: NewGiveaway) -> HavenResult<Giveaway> {
        let giveaway = request.into_giveaway(new_giveaway_id(), self.access.now())?;
        self.access.insert(&giveaway).await?;
        self.invalidate_active().await;
        info!(giveaway_id = %giveaway.giveaway_id, guild_id = %giveaway.guild_id, "Giveaway created");
        Ok(giveaway)
    }

    pub async fn get(&self, giveaway_id: &str) -> HavenResult<Option<Giveaway>> {
        self.access.get::<Giveaway>(&Giveaway::by_id(giveaway_id)).await
    }

    /// Giveaways still accepting entrants.
    pub async fn list_active(&self) -> HavenResult<Vec<Giveaway>> {
        self.access
            .get_list::<Giveaway>(
                &CacheKey::active_giveaways(),
                &Filter::by("status", GiveawayStatus::Active.as_db_str()),
                self.access.config().active_giveaways_ttl,
            )
            .await
    }

    pub async fn join(&self, giveaway_id: &str, user_id: &str) -> HavenResult<Giveaway> {
        require_user(user_id)?;
        let filter = active_filter(giveaway_id).not_contains("participants", user_id);
        let update = Update::new().add_to_set("participants", user_id);

        match self.access.update_where::<Giveaway>(&filter, update).await? {
            Some(giveaway) => {
                self.invalidate_active().await;
                debug!(giveaway_id, user_id, "Participant joined");
                Ok(giveaway)
            }
            None => {
                let current = self.reload(giveaway_id).await?;
                check_can_join(&current, user_id)?;
                Err(concurrent(giveaway_id))
            }
        }
    }

    /// Leaving a giveaway one never joined is a no-op.
    pub async fn leave(&self, giveaway_id: &str, user_id: &str) -> HavenResult<Giveaway> {
        require_user(user_id)?;
        let update = Update::new().pull("participants", user_id);

        match self
            .access
            .update_where::<Giveaway>(&active_filter(giveaway_id), update)
            .await?
        {
            Some(giveaway) => {
                self.invalidate_active().await;
                debug!(giveaway_id, user_id, "Participant left");
                Ok(giveaway)
            }
            None => {
                let current = self.reload(giveaway_id).await?;
                check_can_leave(&current)?;
                Err(concurrent(giveaway_id))
            }
        }
    }

    /// Close the giveaway and draw a winner. No participants means no winner.
    pub async fn end(&self, giveaway_id: &str) -> HavenResult<Giveaway> {
        let current = self.reload(giveaway_id).await?;
        check_can_end(&current)?;

        let winner = self.selector.select(&current.participants);
        let winner_value = winner.clone().map(Value::String).unwrap_or(Value::Null);
        let update = Update::new()
            .set("status", GiveawayStatus::Ended.as_db_str())
            .set("winner", winner_value);

        // Participants may have joined since the reload; only end the
        // version the winner was drawn from.
        let filter = active_filter(giveaway_id).eq(
            "participants",
            Value::Array(current.participants.iter().cloned().map(Value::String).collect()),
        );

        match self.access.update_where::<Giveaway>(&filter, update).await? {
            Some(giveaway) => {
                self.invalidate_active().await;
                info!(giveaway_id, winner = ?giveaway.winner, "Giveaway ended");
                Ok(giveaway)
            }
            None => {
                let latest = self.reload(giveaway_id).await?;
                check_can_end(&latest)?;
                Err(concurrent(giveaway_id))
            }
        }
    }

    /// Draw a new winner among the remaining participants. The previous
    /// winner is removed from the participant set.
    pub async fn reroll(&self, giveaway_id: &str) -> HavenResult<Giveaway> {
        let current = self.reload(giveaway_id).await?;
        check_can_reroll(&current)?;

        let pool = reroll_pool(&current);
        let Some(next) = self.selector.select(&pool) else {
            return Err(StateError::NotEnoughParticipants {
                giveaway_id: giveaway_id.to_string(),
                count: pool.len(),
                required: 1,
            }
            .into());
        };

        let previous = current.winner.clone();
        let mut update = Update::new().set("winner", next.as_str());
        if let Some(previous) = &previous {
            update = update.pull("participants", previous.as_str());
        }
        let filter = Giveaway::by_id(giveaway_id)
            .to_filter()
            .eq("status", GiveawayStatus::Ended.as_db_str())
            .eq("winner", previous.clone().map(Value::String).unwrap_or(Value::Null));

        match self.access.update_where::<Giveaway>(&filter, update).await? {
            Some(giveaway) => {
                self.invalidate_active().await;
                info!(giveaway_id, previous = ?previous, winner = %next, "Giveaway rerolled");
                Ok(giveaway)
            }
            None => {
                let latest = self.reload(giveaway_id).await?;
                check_can_reroll(&latest)?;
                Err(concurrent(giveaway_id))
            }
        }
    }

    pub async fn delete(&self, giveaway_id: &str) -> HavenResult<Option<Giveaway>> {
        let removed = self
            .access
            .delete::<Giveaway>(&Giveaway::by_id(giveaway_id))
            .await?;
        self.invalidate_active().await;
        Ok(removed)
    }

    /// Authoritative copy from the store, or `NotFound`.
    async fn reload(&self, giveaway_id: &str) -> HavenResult<Giveaway> {
        self.access
            .load::<Giveaway>(&Giveaway::by_id(giveaway_id))
            .await?
            .ok_or_else(|| HavenError::not_found(EntityType::Giveaway, giveaway_id))
    }

    async fn invalidate_active(&self) {
        self.access.invalidate(&CacheKey::active_giveaways()).await;
    }
}

fn active_filter(giveaway_id: &str) -> Filter {
    Giveaway::by_id(giveaway_id)
        .to_filter()
        .eq("status", GiveawayStatus::Active.as_db_str())
}

fn require_user(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::missing("userId"));
    }
    Ok(())
}

fn concurrent(giveaway_id: &str) -> HavenError {
    StateError::ConcurrentModification {
        entity_type: EntityType::Giveaway,
        key: giveaway_id.to_string(),
    }
    .into()
}
