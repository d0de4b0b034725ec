#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::auth::{Role, User};
    use crate::models::{Coach, Goal, Player};
    use crate::policy::{FieldSet, Principal, Scope};
    use crate::progress::{GoalArea, Progress, Timeframe};

    fn make_user(id: i64, role: Role) -> User {
        User {
            id,
            username: format!("user_{}", id),
            role,
            email: String::new(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            date_of_birth: None,
            phone_number: None,
        }
    }

    fn make_coach(id: i64, user_id: i64) -> Coach {
        Coach {
            id,
            user_id,
            display_name: "Test Coach".to_string(),
            email: String::new(),
            specialization: "Defense".to_string(),
            experience_years: 3,
            bio: String::new(),
            hire_date: Utc::now().date_naive(),
        }
    }

    fn make_player(id: i64, user_id: i64, coach_id: Option<i64>) -> Player {
        Player {
            id,
            user_id,
            display_name: "Test Player".to_string(),
            coach_id,
            coach_name: String::new(),
            position: "Forward".to_string(),
            jersey_number: None,
            height: None,
            weight: None,
            join_date: Utc::now().date_naive(),
            is_active: true,
        }
    }

    fn make_goal(id: i64, player_id: i64, coach_id: i64) -> Goal {
        Goal {
            id,
            name: "Test goal".to_string(),
            player_id,
            player_name: String::new(),
            coach_id,
            coach_name: String::new(),
            area: GoalArea::Technical,
            timeframe: Timeframe::MediumTerm,
            progress: Progress::NotStarted,
            description: String::new(),
            target_date: None,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn admin_principal() -> Principal {
        Principal {
            user: make_user(1, Role::Admin),
            coach: None,
            player: None,
        }
    }

    fn coach_principal(coach_id: i64) -> Principal {
        Principal {
            user: make_user(2, Role::Coach),
            coach: Some(make_coach(coach_id, 2)),
            player: None,
        }
    }

    fn player_principal(player_id: i64) -> Principal {
        Principal {
            user: make_user(3, Role::Player),
            coach: None,
            player: Some(make_player(player_id, 3, Some(1))),
        }
    }

    #[test]
    fn test_scope_per_role() {
        assert_eq!(admin_principal().scope(), Scope::All);
        assert_eq!(coach_principal(7).scope(), Scope::Coach(7));
        assert_eq!(player_principal(9).scope(), Scope::Player(9));
    }

    #[test]
    fn test_scope_fails_closed_without_profile() {
        let coach_without_profile = Principal {
            user: make_user(4, Role::Coach),
            coach: None,
            player: None,
        };
        let player_without_profile = Principal {
            user: make_user(5, Role::Player),
            coach: None,
            player: None,
        };

        assert_eq!(coach_without_profile.scope(), Scope::Nothing);
        assert_eq!(player_without_profile.scope(), Scope::Nothing);
        assert_eq!(
            coach_without_profile.missing_profile_notice(),
            Some("Coach profile not found")
        );
        assert_eq!(
            player_without_profile.missing_profile_notice(),
            Some("Player profile not found")
        );
        assert_eq!(admin_principal().missing_profile_notice(), None);
    }

    #[test]
    fn test_edit_goal_details() {
        let goal = make_goal(1, 9, 7);

        assert!(admin_principal().can_edit_goal_details(&goal));
        assert!(coach_principal(7).can_edit_goal_details(&goal));
        assert!(!coach_principal(8).can_edit_goal_details(&goal));
        // The owning player may update progress but not details
        assert!(!player_principal(9).can_edit_goal_details(&goal));
    }

    #[test]
    fn test_update_goal_progress() {
        let goal = make_goal(1, 9, 7);

        assert!(admin_principal().can_update_goal_progress(&goal));
        assert!(coach_principal(7).can_update_goal_progress(&goal));
        assert!(!coach_principal(8).can_update_goal_progress(&goal));
        assert!(player_principal(9).can_update_goal_progress(&goal));
        assert!(!player_principal(10).can_update_goal_progress(&goal));
    }

    #[test]
    fn test_update_denied_without_profile() {
        let goal = make_goal(1, 9, 7);

        let coach_without_profile = Principal {
            user: make_user(4, Role::Coach),
            coach: None,
            player: None,
        };
        let player_without_profile = Principal {
            user: make_user(5, Role::Player),
            coach: None,
            player: None,
        };

        assert!(!coach_without_profile.can_update_goal_progress(&goal));
        assert!(!player_without_profile.can_update_goal_progress(&goal));
        assert!(!coach_without_profile.can_edit_goal_details(&goal));
    }

    #[test]
    fn test_goal_visibility() {
        let goal = make_goal(1, 9, 7);

        assert!(admin_principal().can_view_goal(&goal));
        assert!(coach_principal(7).can_view_goal(&goal));
        assert!(!coach_principal(8).can_view_goal(&goal));
        assert!(player_principal(9).can_view_goal(&goal));
        assert!(!player_principal(10).can_view_goal(&goal));
    }

    #[test]
    fn test_player_visibility() {
        let player = make_player(9, 30, Some(7));

        assert!(admin_principal().can_view_player(&player));
        assert!(coach_principal(7).can_view_player(&player));
        assert!(!coach_principal(8).can_view_player(&player));
        assert!(player_principal(9).can_view_player(&player));
        assert!(!player_principal(10).can_view_player(&player));

        let free_agent = make_player(11, 31, None);
        assert!(!coach_principal(7).can_view_player(&free_agent));
    }

    #[test]
    fn test_field_set_selector() {
        assert_eq!(admin_principal().editable_fields(), FieldSet::Full);
        assert_eq!(coach_principal(7).editable_fields(), FieldSet::Full);
        assert_eq!(player_principal(9).editable_fields(), FieldSet::ProgressOnly);
    }
}
