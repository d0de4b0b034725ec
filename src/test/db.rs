#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::db::{
        GoalFilters, authenticate_user, create_player, create_user, get_goal, get_player,
        list_goals, list_players, maybe_auto_complete_goal, update_goal_progress,
        update_process_goal_progress,
    };
    use crate::error::AppError;
    use crate::policy::Scope;
    use crate::progress::{GoalArea, Progress, Timeframe};
    use crate::test::utils::test_db::{STANDARD_PASSWORD, TestDbBuilder, create_standard_test_db};
    use rocket::tokio;

    #[tokio::test]
    async fn test_authenticate_user() {
        let test_db = create_standard_test_db().await;

        let user = authenticate_user(&test_db.pool, "coach_user", STANDARD_PASSWORD)
            .await
            .expect("Authentication query failed");
        assert!(user.is_some());
        assert_eq!(user.unwrap().role, Role::Coach);

        let wrong_password = authenticate_user(&test_db.pool, "coach_user", "nope")
            .await
            .expect("Authentication query failed");
        assert!(wrong_password.is_none());

        let unknown_user = authenticate_user(&test_db.pool, "nobody", STANDARD_PASSWORD)
            .await
            .expect("Authentication query failed");
        assert!(unknown_user.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let test_db = create_standard_test_db().await;

        let result = create_user(
            &test_db.pool,
            "coach_user",
            "irrelevant",
            Role::Coach,
            "",
            "",
            "",
        )
        .await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("already exists")),
            other => panic!("Expected validation error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_jersey_number_uniqueness() {
        let test_db = create_standard_test_db().await;

        let user_id = create_user(
            &test_db.pool,
            "player_c",
            STANDARD_PASSWORD,
            Role::Player,
            "",
            "Player",
            "Cee",
        )
        .await
        .expect("Failed to create user");

        // Jersey 10 already belongs to player_user
        let result = create_player(&test_db.pool, user_id, None, "", Some(10), None, None).await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("10")),
            other => panic!("Expected validation error, got {:?}", other.err()),
        }

        // A free number goes through
        create_player(&test_db.pool, user_id, None, "", Some(11), None, None)
            .await
            .expect("Free jersey number should be accepted");
    }

    #[tokio::test]
    async fn test_deleting_coach_detaches_players_and_drops_goals() {
        let test_db = create_standard_test_db().await;

        let coach_id = test_db.coach_id("coach_user").unwrap();
        let player_id = test_db.player_id("player_user").unwrap();
        let goal_id = test_db.goal_id("Improve passing accuracy").unwrap();

        sqlx::query("DELETE FROM coaches WHERE id = ?")
            .bind(coach_id)
            .execute(&test_db.pool)
            .await
            .expect("Failed to delete coach");

        // The player survives with no coach
        let player = get_player(&test_db.pool, player_id)
            .await
            .expect("Player should still exist");
        assert_eq!(player.coach_id, None);

        // Goals assigned by the coach cascade away
        let result = get_goal(&test_db.pool, goal_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deleting_player_cascades_goals_and_process_goals() {
        let test_db = create_standard_test_db().await;

        let player_id = test_db.player_id("player_user").unwrap();
        let goal_id = test_db.goal_id("Improve passing accuracy").unwrap();

        sqlx::query("DELETE FROM players WHERE id = ?")
            .bind(player_id)
            .execute(&test_db.pool)
            .await
            .expect("Failed to delete player");

        let result = get_goal(&test_db.pool, goal_id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM process_goals WHERE main_goal_id = ?")
                .bind(goal_id)
                .fetch_one(&test_db.pool)
                .await
                .expect("Count query failed");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_list_players_scoping() {
        let test_db = create_standard_test_db().await;
        let coach_id = test_db.coach_id("coach_user").unwrap();
        let player_id = test_db.player_id("player_user").unwrap();

        let all = list_players(&test_db.pool, Scope::All, None, 1)
            .await
            .expect("Listing failed");
        assert_eq!(all.total_count, 2);

        let coach_scope = list_players(&test_db.pool, Scope::Coach(coach_id), None, 1)
            .await
            .expect("Listing failed");
        assert_eq!(coach_scope.total_count, 1);
        assert_eq!(coach_scope.items[0].id, player_id);

        let player_scope = list_players(&test_db.pool, Scope::Player(player_id), None, 1)
            .await
            .expect("Listing failed");
        assert_eq!(player_scope.total_count, 1);

        let nothing = list_players(&test_db.pool, Scope::Nothing, None, 1)
            .await
            .expect("Listing failed");
        assert!(nothing.items.is_empty());
        assert_eq!(nothing.total_count, 0);
    }

    #[tokio::test]
    async fn test_goal_filters_compose() {
        let test_db = TestDbBuilder::new()
            .coach("coach_user", "Coach", "User")
            .player("player_user", "Player", "User", Some("coach_user"))
            .goal_with(
                "Sprint endurance",
                "player_user",
                "coach_user",
                GoalArea::Physical,
                Timeframe::ShortTerm,
                Progress::InProgress,
                None,
            )
            .goal_with(
                "Free kick accuracy",
                "player_user",
                "coach_user",
                GoalArea::Technical,
                Timeframe::ShortTerm,
                Progress::NotStarted,
                None,
            )
            .goal_with(
                "Match awareness",
                "player_user",
                "coach_user",
                GoalArea::Tactical,
                Timeframe::LongTerm,
                Progress::InProgress,
                None,
            )
            .build()
            .await
            .expect("Failed to build test DB");

        let area_only = list_goals(
            &test_db.pool,
            Scope::All,
            GoalFilters {
                area: Some(GoalArea::Physical),
                ..Default::default()
            },
            1,
        )
        .await
        .expect("Listing failed");
        assert_eq!(area_only.total_count, 1);
        assert_eq!(area_only.items[0].name, "Sprint endurance");

        // Filters are ANDed together
        let composed = list_goals(
            &test_db.pool,
            Scope::All,
            GoalFilters {
                timeframe: Some(Timeframe::ShortTerm),
                progress: Some(Progress::InProgress),
                ..Default::default()
            },
            1,
        )
        .await
        .expect("Listing failed");
        assert_eq!(composed.total_count, 1);
        assert_eq!(composed.items[0].name, "Sprint endurance");

        // Search is case-insensitive over goal names
        let searched = list_goals(
            &test_db.pool,
            Scope::All,
            GoalFilters {
                search: Some("FREE KICK"),
                ..Default::default()
            },
            1,
        )
        .await
        .expect("Listing failed");
        assert_eq!(searched.total_count, 1);
        assert_eq!(searched.items[0].name, "Free kick accuracy");
    }

    #[tokio::test]
    async fn test_goal_list_pagination() {
        let mut builder = TestDbBuilder::new()
            .coach("coach_user", "Coach", "User")
            .player("player_user", "Player", "User", Some("coach_user"));

        for i in 0..12 {
            builder = builder.goal(&format!("Goal {}", i), "player_user", "coach_user");
        }

        let test_db = builder.build().await.expect("Failed to build test DB");

        let first = list_goals(&test_db.pool, Scope::All, GoalFilters::default(), 1)
            .await
            .expect("Listing failed");
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_count, 12);
        assert_eq!(first.page, 1);

        let second = list_goals(&test_db.pool, Scope::All, GoalFilters::default(), 2)
            .await
            .expect("Listing failed");
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.page, 2);
    }

    #[tokio::test]
    async fn test_progress_update_keeps_notes_when_empty() {
        let test_db = create_standard_test_db().await;
        let goal_id = test_db.goal_id("Improve passing accuracy").unwrap();

        update_goal_progress(&test_db.pool, goal_id, Progress::InProgress, Some("First note"))
            .await
            .expect("Update failed");

        let goal = get_goal(&test_db.pool, goal_id).await.expect("Fetch failed");
        assert_eq!(goal.progress, Progress::InProgress);
        assert_eq!(goal.notes, "First note");

        // An empty notes field leaves the stored notes alone
        update_goal_progress(&test_db.pool, goal_id, Progress::GoodProgress, Some(""))
            .await
            .expect("Update failed");

        let goal = get_goal(&test_db.pool, goal_id).await.expect("Fetch failed");
        assert_eq!(goal.progress, Progress::GoodProgress);
        assert_eq!(goal.notes, "First note");
    }

    #[tokio::test]
    async fn test_auto_complete_promotion_is_one_way() {
        let test_db = create_standard_test_db().await;
        let goal_id = test_db.goal_id("Improve passing accuracy").unwrap();
        let first = test_db.process_goal_id("Daily wall passes").unwrap();
        let second = test_db.process_goal_id("Weekly drill session").unwrap();

        update_process_goal_progress(&test_db.pool, first, Progress::Completed, None)
            .await
            .expect("Update failed");
        assert!(!maybe_auto_complete_goal(&test_db.pool, goal_id)
            .await
            .expect("Auto-complete check failed"));

        update_process_goal_progress(&test_db.pool, second, Progress::Completed, None)
            .await
            .expect("Update failed");
        assert!(maybe_auto_complete_goal(&test_db.pool, goal_id)
            .await
            .expect("Auto-complete check failed"));

        let goal = get_goal(&test_db.pool, goal_id).await.expect("Fetch failed");
        assert_eq!(goal.progress, Progress::Completed);

        // Regressing a process goal afterwards never demotes the parent
        update_process_goal_progress(&test_db.pool, first, Progress::InProgress, None)
            .await
            .expect("Update failed");
        assert!(!maybe_auto_complete_goal(&test_db.pool, goal_id)
            .await
            .expect("Auto-complete check failed"));

        let goal = get_goal(&test_db.pool, goal_id).await.expect("Fetch failed");
        assert_eq!(goal.progress, Progress::Completed);
    }
}
