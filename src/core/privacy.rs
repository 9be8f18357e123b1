use crate::error::{EngineError, PrivateResource};
use crate::models::UserPrivacySettings;

/// Single visibility check shared by every read path.
///
/// Owners always pass. Everyone else needs the resource's flag on.
#[inline]
pub fn privacy_gate(resource: PrivateResource, visible: bool, is_owner: bool) -> Result<(), EngineError> {
    if is_owner || visible {
        Ok(())
    } else {
        Err(EngineError::PrivacyDenied(resource))
    }
}

/// Flag in `settings` that guards `resource`
pub fn is_visible(settings: &UserPrivacySettings, resource: PrivateResource) -> bool {
    match resource {
        PrivateResource::ReputationScore => settings.show_reputation_score,
        PrivateResource::MatchHistory => settings.show_match_history,
        PrivateResource::WinLossRecord => settings.show_win_loss_record,
        PrivateResource::SkillProgression => settings.show_skill_progression,
        PrivateResource::BehaviorReviews => settings.show_behavior_reviews,
        PrivateResource::DetailedStats => settings.show_detailed_stats,
        PrivateResource::Statistics => settings.allow_stats_sharing,
    }
}

/// Gate `resource` for `requesting_user_id` against the owner's settings
pub fn check_access(
    settings: &UserPrivacySettings,
    resource: PrivateResource,
    requesting_user_id: &str,
) -> Result<(), EngineError> {
    let is_owner = settings.user_id == requesting_user_id;
    privacy_gate(resource, is_visible(settings, resource), is_owner)
}

/// Keep `value` only if `resource` is visible to the requester
pub fn project<T>(
    settings: &UserPrivacySettings,
    resource: PrivateResource,
    requesting_user_id: &str,
    value: T,
) -> Option<T> {
    check_access(settings, resource, requesting_user_id).ok().map(|_| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_always_allowed() {
        assert!(privacy_gate(PrivateResource::BehaviorReviews, false, true).is_ok());
    }

    #[test]
    fn test_hidden_denied_with_resource() {
        let err = privacy_gate(PrivateResource::MatchHistory, false, false).unwrap_err();
        assert!(matches!(err, EngineError::PrivacyDenied(PrivateResource::MatchHistory)));
    }

    #[test]
    fn test_default_settings_hide_reviews_only() {
        let settings = UserPrivacySettings::defaults_for("owner");
        assert!(check_access(&settings, PrivateResource::MatchHistory, "other").is_ok());
        assert!(check_access(&settings, PrivateResource::BehaviorReviews, "other").is_err());
        assert!(check_access(&settings, PrivateResource::BehaviorReviews, "owner").is_ok());
    }

    #[test]
    fn test_project_drops_hidden_section() {
        let mut settings = UserPrivacySettings::defaults_for("owner");
        settings.show_win_loss_record = false;
        assert_eq!(project(&settings, PrivateResource::WinLossRecord, "other", 3), None);
        assert_eq!(project(&settings, PrivateResource::WinLossRecord, "owner", 3), Some(3));
    }
}
