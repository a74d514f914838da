use std::sync::Arc;

use async_trait::async_trait;
use chores_server::routines::{
    ChoreCountSource, ChoreService, CompletionRecord, CoreError, DisplayableRoutine, RoutineChore,
    RoutineService,
};
use chores_server::storage::models::{
    BlueprintChoreSpec, BlueprintFields, Chore, ChoreCounts, ChoreFields, ChoreRoutine,
    RoutineBlueprint,
};
use chores_server::storage::schema::chore_routines;
use chores_server::storage::{StorageError, Store};
use chores_shared::domain::{Recurrence, SourceType};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

const ALICE: i32 = 1;
const BOB: i32 = 2;

struct Fixture {
    store: Store,
    routines: RoutineService,
    _dir: tempfile::TempDir,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.db");
        let store = Store::connect_sqlite(path.to_str().unwrap()).await.unwrap();
        Self {
            routines: RoutineService::new(store.clone()),
            store,
            _dir: dir,
        }
    }

    fn chores(&self) -> &ChoreService {
        self.routines.chores()
    }

    /// Direct connection for inspecting rows the services hide.
    fn raw_conn(&self) -> SqliteConnection {
        let path = self._dir.path().join("engine.db");
        SqliteConnection::establish(path.to_str().unwrap()).unwrap()
    }

    async fn chore(&self, name: &str, points: i32) -> Chore {
        self.store
            .create_chore(ChoreFields {
                name: name.to_string(),
                default_points: points,
                image: Some(format!("{name}.png")),
            })
            .await
            .unwrap()
    }

    async fn blueprint(
        &self,
        name: &str,
        deadline: &str,
        recurrence: Recurrence,
        chores: &[&Chore],
    ) -> RoutineBlueprint {
        self.store
            .create_blueprint(
                BlueprintFields {
                    name: name.to_string(),
                    to_be_completed_by: deadline.to_string(),
                    allow_multiple_instances_per_day: false,
                    recurrence,
                    image: None,
                },
                chores
                    .iter()
                    .map(|c| BlueprintChoreSpec {
                        chore_id: c.id,
                        image: None,
                    })
                    .collect(),
            )
            .await
            .unwrap()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// 2025-04-05 is a Saturday, 2025-04-07 a Monday.
fn saturday() -> NaiveDate {
    date(2025, 4, 5)
}

fn monday() -> NaiveDate {
    date(2025, 4, 7)
}

#[tokio::test]
async fn reconcile_without_blueprint_returns_records_only() {
    let fx = Fixture::new().await;
    let dishes = fx.chore("dishes", 3).await;
    let routine = fx.store.create_routine(ALICE, None, None).await.unwrap();

    fx.chores()
        .upsert_completion(routine.id, dishes.id, true, ALICE)
        .await
        .unwrap();

    let items = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_completed());
    assert_eq!(items[0].points_awarded(), 3);
    assert_eq!(items[0].completion().unwrap().by, ALICE);
}

#[tokio::test]
async fn reconcile_merges_records_and_pending_blueprint_chores() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let dress = fx.chore("dress", 2).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth, &bed, &dress])
        .await;
    let routine = fx
        .store
        .create_routine(ALICE, Some(bp.id), None)
        .await
        .unwrap();

    fx.chores()
        .upsert_completion(routine.id, bed.id, true, ALICE)
        .await
        .unwrap();

    let items = fx.chores().reconcile(routine.id).await.unwrap();
    let ids: Vec<i32> = items.iter().map(RoutineChore::chore_id).collect();
    assert_eq!(ids, vec![bed.id, teeth.id, dress.id]);
    assert!(matches!(items[0], RoutineChore::Recorded { .. }));
    assert!(items[1..].iter().all(RoutineChore::is_pending));
    assert!(items[1..].iter().all(|c| c.id().is_none() && !c.is_completed()));
    assert!(items.iter().all(|c| c.routine_id() == routine.id));
}

#[tokio::test]
async fn reconcile_lists_a_repeated_blueprint_chore_once() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bp = fx
        .blueprint("Evening", "evening", Recurrence::Daily, &[&teeth, &teeth])
        .await;
    let routine = fx
        .store
        .create_routine(ALICE, Some(bp.id), None)
        .await
        .unwrap();

    let items = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(items.len(), 1);

    fx.chores()
        .upsert_completion(routine.id, teeth.id, true, ALICE)
        .await
        .unwrap();
    let items = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_completed());
}

#[tokio::test]
async fn reconcile_unknown_routine_is_not_found() {
    let fx = Fixture::new().await;
    let err = fx.chores().reconcile(404).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::NotFound {
            entity: "routine",
            id: 404
        }
    ));
}

#[tokio::test]
async fn repeating_the_current_state_writes_nothing() {
    let fx = Fixture::new().await;
    let dishes = fx.chore("dishes", 3).await;
    let routine = fx.store.create_routine(ALICE, None, None).await.unwrap();

    let (first, _) = fx
        .chores()
        .upsert_completion(routine.id, dishes.id, true, ALICE)
        .await
        .unwrap();
    // A different actor repeating "completed" does not take over the record.
    let (second, chore) = fx
        .chores()
        .upsert_completion(routine.id, dishes.id, true, BOB)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(second.completion.unwrap().by, ALICE);
    assert_eq!(chore, dishes);
}

#[tokio::test]
async fn uncompleting_clears_both_completion_fields() {
    let fx = Fixture::new().await;
    let dishes = fx.chore("dishes", 3).await;
    let routine = fx.store.create_routine(ALICE, None, None).await.unwrap();

    let (done, _) = fx
        .chores()
        .upsert_completion(routine.id, dishes.id, true, ALICE)
        .await
        .unwrap();
    assert!(done.completion.is_some());

    let (undone, _) = fx
        .chores()
        .upsert_completion(routine.id, dishes.id, false, ALICE)
        .await
        .unwrap();
    assert_eq!(undone.id, done.id);
    assert_eq!(undone.completion, None);
    assert!(undone.modified >= done.modified);

    let items = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(!items[0].is_completed());
    assert!(!items[0].is_pending());
}

#[tokio::test]
async fn points_are_captured_when_the_record_is_created() {
    let fx = Fixture::new().await;
    let dishes = fx.chore("dishes", 3).await;
    let routine = fx.store.create_routine(ALICE, None, None).await.unwrap();
    fx.chores()
        .upsert_completion(routine.id, dishes.id, true, ALICE)
        .await
        .unwrap();

    fx.store
        .update_chore(
            dishes.id,
            ChoreFields {
                name: "dishes".into(),
                default_points: 10,
                image: None,
            },
        )
        .await
        .unwrap();
    let (undone, _) = fx
        .chores()
        .upsert_completion(routine.id, dishes.id, false, ALICE)
        .await
        .unwrap();
    assert_eq!(undone.points_awarded, 3);
}

#[tokio::test]
async fn upsert_rejects_chores_outside_the_blueprint() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let stray = fx.chore("stray", 1).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth])
        .await;
    let routine = fx
        .store
        .create_routine(ALICE, Some(bp.id), None)
        .await
        .unwrap();

    let err = fx
        .chores()
        .upsert_completion(routine.id, stray.id, true, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::NotFound {
            entity: "blueprint chore",
            ..
        }
    ));

    let err = fx
        .chores()
        .upsert_completion(9999, teeth.id, true, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "routine", .. }));

    let err = fx
        .chores()
        .upsert_completion(routine.id, 9999, true, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "chore", .. }));
}

#[test]
fn half_completed_rows_are_rejected() {
    let ts = date(2025, 4, 1).and_hms_opt(8, 0, 0).unwrap();
    let row = ChoreRoutine {
        id: 7,
        created: ts,
        modified: ts,
        completed_at: Some(ts),
        completed_by: None,
        points_awarded: 1,
        routine_id: 1,
        chore_id: 1,
    };
    let err = CompletionRecord::try_from(row.clone()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)));

    let row = ChoreRoutine {
        completed_at: None,
        completed_by: Some(ALICE),
        ..row
    };
    assert!(CompletionRecord::try_from(row).is_err());
}

#[tokio::test]
async fn applicable_blueprint_without_instance_is_listed_virtually() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth, &bed])
        .await;

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(items.len(), 1);
    let entry = &items[0];
    assert_eq!(entry.id(), -bp.id);
    assert_eq!(entry.source_type(), SourceType::Blueprint);
    assert_eq!(entry.blueprint_id(), bp.id);
    assert_eq!(entry.owner_id(), ALICE);
    assert_eq!(entry.name(), "Morning");
    assert_eq!(entry.chore_count(), 2);
    assert_eq!(entry.completed_chores(), 0);
    assert_eq!(entry.created(), None);
    assert!(!entry.is_complete());
    // No blueprint image: the first chore's image stands in.
    assert_eq!(entry.image(), Some("teeth.png"));
}

#[tokio::test]
async fn instance_replaces_its_blueprint_in_the_listing() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth, &bed])
        .await;
    let routine = fx
        .store
        .create_routine(ALICE, Some(bp.id), None)
        .await
        .unwrap();
    fx.chores()
        .upsert_completion(routine.id, teeth.id, true, ALICE)
        .await
        .unwrap();

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(items.len(), 1);
    let entry = &items[0];
    assert_eq!(entry.id(), routine.id);
    assert_eq!(entry.source_type(), SourceType::Database);
    assert_eq!(entry.chore_count(), 2);
    assert_eq!(entry.completed_chores(), 1);
    assert_eq!(entry.completion_percentage(), 50);
    assert_eq!(entry.created(), Some(routine.created));

    let chores = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(chores.len(), 2);
    assert_eq!(chores.iter().filter(|c| c.is_completed()).count(), 1);

    fx.chores()
        .upsert_completion(routine.id, bed.id, true, ALICE)
        .await
        .unwrap();
    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert!(items[0].is_complete());
    assert_eq!(items[0].completion_percentage(), 100);
}

#[tokio::test]
async fn other_users_instances_do_not_hide_the_blueprint() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth])
        .await;
    fx.store
        .create_routine(BOB, Some(bp.id), None)
        .await
        .unwrap();

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_type(), SourceType::Blueprint);
    assert_eq!(items[0].owner_id(), ALICE);
}

#[tokio::test]
async fn weekday_blueprints_skip_weekends() {
    let fx = Fixture::new().await;
    let pack = fx.chore("pack bag", 1).await;
    let bp = fx
        .blueprint("School", "7:30", Recurrence::Weekday, &[&pack])
        .await;
    fx.blueprint("Chill", "afternoon", Recurrence::Weekly, &[&pack])
        .await;

    let weekend = fx
        .routines
        .relevant_routines(ALICE, saturday())
        .await
        .unwrap();
    assert!(weekend.iter().all(|r| r.blueprint_id() != bp.id));
    assert_eq!(weekend.len(), 1);

    let weekday = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(weekday.len(), 2);
    // "afternoon" (50) sorts before 7:30 (450 minutes).
    assert_eq!(weekday[1].blueprint_id(), bp.id);
}

#[tokio::test]
async fn unlinked_and_orphaned_instances_are_left_out() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth])
        .await;
    fx.store.create_routine(ALICE, None, None).await.unwrap();
    fx.store
        .create_routine(ALICE, Some(bp.id), None)
        .await
        .unwrap();
    assert!(fx.store.delete_blueprint(bp.id).await.unwrap());

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn listing_is_ordered_by_deadline() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let night = fx
        .blueprint("Night", "bedtime", Recurrence::Daily, &[&teeth])
        .await;
    let odd = fx
        .blueprint("Odd", "whenever", Recurrence::Daily, &[&teeth])
        .await;
    let morning = fx
        .blueprint("Morning", "Morning", Recurrence::Daily, &[&teeth])
        .await;
    let routine = fx
        .store
        .create_routine(ALICE, Some(night.id), None)
        .await
        .unwrap();

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    let ids: Vec<i32> = items.iter().map(DisplayableRoutine::id).collect();
    assert_eq!(ids, vec![-morning.id, routine.id, -odd.id]);
}

#[tokio::test]
async fn starting_a_blueprint_seeds_every_chore() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth, &bed])
        .await;

    let routine = fx
        .routines
        .start_from_blueprint(bp.id, ALICE)
        .await
        .unwrap();
    assert_eq!(routine.owner_id, ALICE);
    assert_eq!(routine.routine_blueprint_id, Some(bp.id));

    let chores = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(chores.len(), 2);
    assert!(chores.iter().all(|c| !c.is_pending() && !c.is_completed()));

    let counts = fx.store.chore_counts_for_routine(routine.id).await.unwrap();
    assert_eq!((counts.total, counts.completed), (2, 0));

    let err = fx
        .routines
        .start_from_blueprint(bp.id + 100, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "blueprint", .. }));
}

#[tokio::test]
async fn deleted_chores_drop_out_of_counts_and_listings() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth, &bed])
        .await;
    let routine = fx
        .routines
        .start_from_blueprint(bp.id, ALICE)
        .await
        .unwrap();
    assert!(fx.store.delete_chore(bed.id).await.unwrap());

    let counts = fx.store.chore_counts_for_routine(routine.id).await.unwrap();
    assert_eq!(counts.total, 1);
    let chores = fx.chores().reconcile(routine.id).await.unwrap();
    assert_eq!(chores.len(), 1);
    assert_eq!(chores[0].chore_id(), teeth.id);
}

#[tokio::test]
async fn completing_a_deleted_chore_writes_nothing() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth, &bed])
        .await;
    let routine = fx
        .routines
        .start_from_blueprint(bp.id, ALICE)
        .await
        .unwrap();
    assert!(fx.store.delete_chore(bed.id).await.unwrap());

    let err = fx
        .chores()
        .upsert_completion(routine.id, bed.id, true, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "chore", .. }));

    let mut conn = fx.raw_conn();
    let stored: Vec<Option<NaiveDateTime>> = chore_routines::table
        .filter(chore_routines::routine_id.eq(routine.id))
        .filter(chore_routines::chore_id.eq(bed.id))
        .select(chore_routines::completed_at)
        .load(&mut conn)
        .unwrap();
    assert_eq!(stored, vec![None]);
}

#[tokio::test]
async fn repeated_blueprint_chore_counts_once_before_and_after_start() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bed = fx.chore("bed", 2).await;
    let bp = fx
        .blueprint("Evening", "evening", Recurrence::Daily, &[&teeth, &bed, &teeth])
        .await;

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_type(), SourceType::Blueprint);
    assert_eq!(items[0].chore_count(), 2);

    fx.routines.start_from_blueprint(bp.id, ALICE).await.unwrap();
    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_type(), SourceType::Database);
    assert_eq!(items[0].chore_count(), 2);
}

#[tokio::test]
async fn equal_deadlines_list_instances_before_blueprints() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let unstarted = fx
        .blueprint("Unstarted", "morning", Recurrence::Daily, &[&teeth])
        .await;
    let started = fx
        .blueprint("Started", "morning", Recurrence::Daily, &[&teeth])
        .await;
    let routine = fx
        .store
        .create_routine(ALICE, Some(started.id), None)
        .await
        .unwrap();

    let items = fx.routines.relevant_routines(ALICE, monday()).await.unwrap();
    let listed: Vec<(SourceType, i32)> = items
        .iter()
        .map(|r| (r.source_type(), r.id()))
        .collect();
    assert_eq!(
        listed,
        vec![
            (SourceType::Database, routine.id),
            (SourceType::Blueprint, -unstarted.id),
        ]
    );
}

struct UnavailableCounts;

#[async_trait]
impl ChoreCountSource for UnavailableCounts {
    async fn chore_counts(&self, _routine_id: i32) -> Result<ChoreCounts, StorageError> {
        Err(StorageError::InvalidInput("counts unavailable".into()))
    }
}

#[tokio::test]
async fn failed_chore_count_keeps_the_routine_listed() {
    let fx = Fixture::new().await;
    let teeth = fx.chore("teeth", 1).await;
    let bp = fx
        .blueprint("Morning", "morning", Recurrence::Daily, &[&teeth])
        .await;
    let routine = fx
        .routines
        .start_from_blueprint(bp.id, ALICE)
        .await
        .unwrap();
    fx.chores()
        .upsert_completion(routine.id, teeth.id, true, ALICE)
        .await
        .unwrap();

    let routines = RoutineService::with_counts(fx.store.clone(), Arc::new(UnavailableCounts));
    let items = routines.relevant_routines(ALICE, monday()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(matches!(
        &items[0],
        DisplayableRoutine::Concrete { counts, .. } if *counts == ChoreCounts::default()
    ));
    assert_eq!(items[0].id(), routine.id);
    assert_eq!((items[0].chore_count(), items[0].completed_chores()), (0, 0));
    assert_eq!(items[0].completion_percentage(), 0);
    assert!(!items[0].is_complete());
}
