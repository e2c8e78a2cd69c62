use time::{OffsetDateTime, UtcOffset};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::ProfileRequest;
use super::repo_types::UserProfile;
use super::requirements::{self, RequirementSet};
use crate::error::AppError;
use crate::store::Store;

pub async fn load_profile(store: &dyn Store, owner: Uuid) -> Result<UserProfile, AppError> {
    store
        .get_profile(owner)
        .await?
        .ok_or_else(|| AppError::not_found("profile"))
}

/// Validates and upserts the owner's profile.
#[instrument(skip(store, req))]
pub async fn save_profile(
    store: &dyn Store,
    owner: Uuid,
    req: ProfileRequest,
) -> Result<UserProfile, AppError> {
    let profile = UserProfile {
        owner,
        gender: req.gender,
        height_cm: req.height_cm,
        weight_kg: req.weight_kg,
        age: req.age,
        activity_level: req.activity_level,
        goal: req.goal,
        utc_offset_minutes: req.utc_offset_minutes,
        updated_at: OffsetDateTime::now_utc(),
    };
    profile.validate()?;
    let saved = store.upsert_profile(&profile).await?;
    info!(%owner, "profile saved");
    Ok(saved)
}

/// The owner's local offset, UTC when no profile exists yet.
pub async fn owner_offset(store: &dyn Store, owner: Uuid) -> Result<UtcOffset, AppError> {
    Ok(store
        .get_profile(owner)
        .await?
        .map(|p| p.utc_offset())
        .unwrap_or(UtcOffset::UTC))
}

pub async fn requirements_for(
    store: &dyn Store,
    owner: Uuid,
) -> Result<(UserProfile, RequirementSet), AppError> {
    let profile = load_profile(store, owner).await?;
    let set = requirements::calculate(&profile);
    Ok((profile, set))
}
