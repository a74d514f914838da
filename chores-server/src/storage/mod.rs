pub mod models;
pub mod schema;

use std::collections::BTreeSet;

use chores_shared::auth::Role;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{
    BlueprintChoreSpec, BlueprintFields, Chore, ChoreCounts, ChoreFields, ChoreRoutine,
    NewChore, NewChoreRoutine, NewRoutine, NewRoutineBlueprint, NewRoutineBlueprintChore,
    NewSession, NewUser, Routine, RoutineBlueprint, RoutineBlueprintChore, Session, User,
};
use schema::{
    chore_routines, chores, routine_blueprint_chores, routine_blueprints, routines, sessions,
    users,
};
use tracing::trace;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i32 },
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    /// Runs `f` on a pooled connection inside `spawn_blocking`.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            f(&mut conn)
        })
        .await?
    }

    // Users

    /// Upserts configured accounts by username; ids stay stable across restarts.
    pub async fn seed_users(&self, accounts: &[(String, Role)]) -> Result<(), StorageError> {
        let accounts = accounts.to_owned();
        self.blocking(move |conn| {
            for (username, role) in &accounts {
                let new_user = NewUser {
                    username,
                    role: role.as_str(),
                };
                diesel::insert_into(users::table)
                    .values(&new_user)
                    .on_conflict(users::username)
                    .do_update()
                    .set(users::role.eq(new_user.role))
                    .execute(conn)?;
            }
            Ok(())
        })
        .await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let name = username.to_string();
        self.blocking(move |conn| {
            Ok(users::table
                .filter(users::username.eq(&name))
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn get_user(&self, user_id: i32) -> Result<Option<User>, StorageError> {
        self.blocking(move |conn| {
            Ok(users::table
                .find(user_id)
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    // Sessions

    pub async fn create_session(&self, jti_: &str, user_id_: i32) -> Result<(), StorageError> {
        let j = jti_.to_string();
        self.blocking(move |conn| {
            let new = NewSession {
                jti: &j,
                user_id: user_id_,
            };
            diesel::insert_into(sessions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, jti_: &str) -> Result<Option<Session>, StorageError> {
        let j = jti_.to_string();
        self.blocking(move |conn| {
            Ok(sessions::table
                .filter(sessions::jti.eq(&j))
                .select(Session::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn delete_session(&self, jti_: &str) -> Result<bool, StorageError> {
        let j = jti_.to_string();
        self.blocking(move |conn| {
            let deleted =
                diesel::delete(sessions::table.filter(sessions::jti.eq(&j))).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Touch session atomically, but only if it hasn't expired.
    /// Returns `true` if the session was found and updated, `false` otherwise.
    pub async fn touch_session_with_cutoff(
        &self,
        jti_: &str,
        cutoff: NaiveDateTime,
    ) -> Result<bool, StorageError> {
        let j = jti_.to_string();
        self.blocking(move |conn| {
            let now = Utc::now().naive_utc();
            let updated = diesel::update(
                sessions::table
                    .filter(sessions::jti.eq(&j))
                    .filter(sessions::last_used_at.ge(cutoff)),
            )
            .set(sessions::last_used_at.eq(now))
            .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    // Chores

    pub async fn list_chores(&self) -> Result<Vec<Chore>, StorageError> {
        self.blocking(|conn| {
            Ok(chores::table
                .order((chores::name.asc(), chores::id.asc()))
                .select(Chore::as_select())
                .load(conn)?)
        })
        .await
    }

    pub async fn get_chore(&self, chore_id: i32) -> Result<Option<Chore>, StorageError> {
        self.blocking(move |conn| {
            Ok(chores::table
                .find(chore_id)
                .select(Chore::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn create_chore(&self, fields: ChoreFields) -> Result<Chore, StorageError> {
        validate_chore(&fields)?;
        trace!(name = %fields.name, "create_chore starting");
        self.blocking(move |conn| {
            let now = Utc::now().naive_utc();
            let new = NewChore {
                created: now,
                modified: now,
                name: &fields.name,
                default_points: fields.default_points,
                image: fields.image.as_deref(),
            };
            Ok(diesel::insert_into(chores::table)
                .values(&new)
                .returning(Chore::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    pub async fn update_chore(
        &self,
        chore_id: i32,
        fields: ChoreFields,
    ) -> Result<Chore, StorageError> {
        validate_chore(&fields)?;
        self.blocking(move |conn| {
            let now = Utc::now().naive_utc();
            diesel::update(chores::table.find(chore_id))
                .set((
                    chores::modified.eq(now),
                    chores::name.eq(&fields.name),
                    chores::default_points.eq(fields.default_points),
                    chores::image.eq(fields.image.as_deref()),
                ))
                .returning(Chore::as_returning())
                .get_result(conn)
                .optional()?
                .ok_or(StorageError::NotFound {
                    entity: "chore",
                    id: chore_id,
                })
        })
        .await
    }

    /// Deletes the chore row only; blueprint and routine references are left
    /// dangling and skipped by the joined reads.
    pub async fn delete_chore(&self, chore_id: i32) -> Result<bool, StorageError> {
        self.blocking(move |conn| {
            let deleted = diesel::delete(chores::table.find(chore_id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    // Blueprints

    pub async fn list_blueprints(&self) -> Result<Vec<RoutineBlueprint>, StorageError> {
        self.blocking(|conn| {
            Ok(routine_blueprints::table
                .order((
                    routine_blueprints::created.desc(),
                    routine_blueprints::id.desc(),
                ))
                .select(RoutineBlueprint::as_select())
                .load(conn)?)
        })
        .await
    }

    pub async fn get_blueprint(
        &self,
        blueprint_id: i32,
    ) -> Result<Option<RoutineBlueprint>, StorageError> {
        self.blocking(move |conn| {
            Ok(routine_blueprints::table
                .find(blueprint_id)
                .select(RoutineBlueprint::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Blueprint chore assignments joined with their chores, in assignment order.
    pub async fn list_blueprint_chores(
        &self,
        blueprint_id: i32,
    ) -> Result<Vec<(RoutineBlueprintChore, Chore)>, StorageError> {
        self.blocking(move |conn| load_blueprint_chores(conn, blueprint_id))
            .await
    }

    pub async fn create_blueprint(
        &self,
        fields: BlueprintFields,
        assignments: Vec<BlueprintChoreSpec>,
    ) -> Result<RoutineBlueprint, StorageError> {
        validate_blueprint(&fields)?;
        trace!(name = %fields.name, chores = assignments.len(), "create_blueprint starting");
        self.blocking(move |conn| {
            conn.immediate_transaction(|conn| -> Result<RoutineBlueprint, StorageError> {
                let now = Utc::now().naive_utc();
                let new = NewRoutineBlueprint {
                    created: now,
                    modified: now,
                    name: &fields.name,
                    to_be_completed_by: &fields.to_be_completed_by,
                    allow_multiple_instances_per_day: fields.allow_multiple_instances_per_day,
                    recurrence: fields.recurrence.as_str(),
                    image: fields.image.as_deref(),
                };
                let blueprint = diesel::insert_into(routine_blueprints::table)
                    .values(&new)
                    .returning(RoutineBlueprint::as_returning())
                    .get_result(conn)?;
                insert_blueprint_chores(conn, blueprint.id, &assignments, now)?;
                Ok(blueprint)
            })
        })
        .await
    }

    /// Updates content fields and replaces the whole chore assignment set.
    pub async fn update_blueprint(
        &self,
        blueprint_id: i32,
        fields: BlueprintFields,
        assignments: Vec<BlueprintChoreSpec>,
    ) -> Result<RoutineBlueprint, StorageError> {
        validate_blueprint(&fields)?;
        self.blocking(move |conn| {
            conn.immediate_transaction(|conn| -> Result<RoutineBlueprint, StorageError> {
                let now = Utc::now().naive_utc();
                let blueprint = diesel::update(routine_blueprints::table.find(blueprint_id))
                    .set((
                        routine_blueprints::modified.eq(now),
                        routine_blueprints::name.eq(&fields.name),
                        routine_blueprints::to_be_completed_by.eq(&fields.to_be_completed_by),
                        routine_blueprints::allow_multiple_instances_per_day
                            .eq(fields.allow_multiple_instances_per_day),
                        routine_blueprints::recurrence.eq(fields.recurrence.as_str()),
                        routine_blueprints::image.eq(fields.image.as_deref()),
                    ))
                    .returning(RoutineBlueprint::as_returning())
                    .get_result(conn)
                    .optional()?
                    .ok_or(StorageError::NotFound {
                        entity: "blueprint",
                        id: blueprint_id,
                    })?;
                diesel::delete(
                    routine_blueprint_chores::table
                        .filter(routine_blueprint_chores::routine_blueprint_id.eq(blueprint_id)),
                )
                .execute(conn)?;
                insert_blueprint_chores(conn, blueprint_id, &assignments, now)?;
                Ok(blueprint)
            })
        })
        .await
    }

    /// Deletes a blueprint with its chore assignments. Routines created from it
    /// keep their (now dangling) back-reference.
    pub async fn delete_blueprint(&self, blueprint_id: i32) -> Result<bool, StorageError> {
        self.blocking(move |conn| {
            conn.immediate_transaction(|conn| -> Result<bool, StorageError> {
                diesel::delete(
                    routine_blueprint_chores::table
                        .filter(routine_blueprint_chores::routine_blueprint_id.eq(blueprint_id)),
                )
                .execute(conn)?;
                let deleted =
                    diesel::delete(routine_blueprints::table.find(blueprint_id)).execute(conn)?;
                Ok(deleted > 0)
            })
        })
        .await
    }

    // Routines

    pub async fn list_routines(&self) -> Result<Vec<Routine>, StorageError> {
        self.blocking(|conn| {
            Ok(routines::table
                .order((routines::created.desc(), routines::id.desc()))
                .select(Routine::as_select())
                .load(conn)?)
        })
        .await
    }

    pub async fn list_routines_for_owner(&self, owner: i32) -> Result<Vec<Routine>, StorageError> {
        self.blocking(move |conn| {
            Ok(routines::table
                .filter(routines::owner_id.eq(owner))
                .order((routines::created.desc(), routines::id.desc()))
                .select(Routine::as_select())
                .load(conn)?)
        })
        .await
    }

    pub async fn get_routine(&self, routine_id: i32) -> Result<Option<Routine>, StorageError> {
        self.blocking(move |conn| {
            Ok(routines::table
                .find(routine_id)
                .select(Routine::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Blueprint back-reference of a routine; `NotFound` if the routine is missing.
    pub async fn routine_blueprint_id(&self, routine_id: i32) -> Result<Option<i32>, StorageError> {
        self.blocking(move |conn| lookup_routine_blueprint(conn, routine_id))
            .await
    }

    pub async fn create_routine(
        &self,
        owner: i32,
        blueprint_id: Option<i32>,
        image: Option<&str>,
    ) -> Result<Routine, StorageError> {
        let image = image.map(|s| s.to_string());
        trace!(owner, ?blueprint_id, "create_routine starting");
        self.blocking(move |conn| {
            let now = Utc::now().naive_utc();
            let new = NewRoutine {
                created: now,
                modified: now,
                owner_id: owner,
                routine_blueprint_id: blueprint_id,
                image: image.as_deref(),
            };
            Ok(diesel::insert_into(routines::table)
                .values(&new)
                .returning(Routine::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    /// Deletes a routine instance together with its completion records.
    pub async fn delete_routine(&self, routine_id: i32) -> Result<bool, StorageError> {
        self.blocking(move |conn| {
            conn.immediate_transaction(|conn| -> Result<bool, StorageError> {
                diesel::delete(
                    chore_routines::table.filter(chore_routines::routine_id.eq(routine_id)),
                )
                .execute(conn)?;
                let deleted = diesel::delete(routines::table.find(routine_id)).execute(conn)?;
                Ok(deleted > 0)
            })
        })
        .await
    }

    // Chore routines

    /// Persisted completion records of a routine joined with their chores,
    /// ordered by record id (insertion order).
    pub async fn list_chore_routines_with_chores(
        &self,
        routine_id: i32,
    ) -> Result<Vec<(ChoreRoutine, Chore)>, StorageError> {
        self.blocking(move |conn| {
            Ok(chore_routines::table
                .inner_join(chores::table)
                .filter(chore_routines::routine_id.eq(routine_id))
                .order(chore_routines::id.asc())
                .select((ChoreRoutine::as_select(), Chore::as_select()))
                .load::<(ChoreRoutine, Chore)>(conn)?)
        })
        .await
    }

    /// Sets or clears the completion of one (routine, chore) pair in a single
    /// immediate transaction.
    ///
    /// A missing row is created with the chore's current default points. An
    /// existing row whose state already matches `completed` is returned
    /// untouched. Completed-at and completed-by are always written together.
    /// A deleted chore is `NotFound` and nothing is written; the chore is
    /// returned alongside the row.
    pub async fn upsert_chore_routine(
        &self,
        routine_id: i32,
        chore_id: i32,
        completed: bool,
        acting_user: i32,
    ) -> Result<(ChoreRoutine, Chore), StorageError> {
        trace!(routine_id, chore_id, completed, acting_user, "upsert_chore_routine starting");
        self.blocking(move |conn| {
            conn.immediate_transaction(|conn| -> Result<(ChoreRoutine, Chore), StorageError> {
                let blueprint_id = lookup_routine_blueprint(conn, routine_id)?;
                let chore = chores::table
                    .find(chore_id)
                    .select(Chore::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or(StorageError::NotFound {
                        entity: "chore",
                        id: chore_id,
                    })?;
                let existing = chore_routines::table
                    .filter(chore_routines::routine_id.eq(routine_id))
                    .filter(chore_routines::chore_id.eq(chore_id))
                    .select(ChoreRoutine::as_select())
                    .first(conn)
                    .optional()?;

                let now = Utc::now().naive_utc();
                let (completed_at, completed_by) = if completed {
                    (Some(now), Some(acting_user))
                } else {
                    (None, None)
                };

                if let Some(row) = existing {
                    if row.completed_at.is_some() == completed {
                        return Ok((row, chore));
                    }
                    let row = diesel::update(chore_routines::table.find(row.id))
                        .set((
                            chore_routines::modified.eq(now),
                            chore_routines::completed_at.eq(completed_at),
                            chore_routines::completed_by.eq(completed_by),
                        ))
                        .returning(ChoreRoutine::as_returning())
                        .get_result(conn)?;
                    return Ok((row, chore));
                }

                if let Some(bp) = blueprint_id {
                    let assigned: i64 = routine_blueprint_chores::table
                        .filter(routine_blueprint_chores::routine_blueprint_id.eq(bp))
                        .filter(routine_blueprint_chores::chore_id.eq(chore_id))
                        .count()
                        .get_result(conn)?;
                    if assigned == 0 {
                        return Err(StorageError::NotFound {
                            entity: "blueprint chore",
                            id: chore_id,
                        });
                    }
                }

                let new = NewChoreRoutine {
                    created: now,
                    modified: now,
                    completed_at,
                    completed_by,
                    points_awarded: chore.default_points,
                    routine_id,
                    chore_id,
                };
                let row = diesel::insert_into(chore_routines::table)
                    .values(&new)
                    .returning(ChoreRoutine::as_returning())
                    .get_result(conn)?;
                Ok((row, chore))
            })
        })
        .await
    }

    /// Total = distinct chores either recorded for the routine or assigned by
    /// its blueprint; completed = recorded rows with a completion timestamp.
    /// References to deleted chores are not counted.
    pub async fn chore_counts_for_routine(
        &self,
        routine_id: i32,
    ) -> Result<ChoreCounts, StorageError> {
        self.blocking(move |conn| {
            let blueprint_id = lookup_routine_blueprint(conn, routine_id)?;
            let mut chore_ids: BTreeSet<i32> = chore_routines::table
                .inner_join(chores::table)
                .filter(chore_routines::routine_id.eq(routine_id))
                .select(chore_routines::chore_id)
                .load::<i32>(conn)?
                .into_iter()
                .collect();
            if let Some(bp) = blueprint_id {
                chore_ids.extend(
                    routine_blueprint_chores::table
                        .inner_join(chores::table)
                        .filter(routine_blueprint_chores::routine_blueprint_id.eq(bp))
                        .select(routine_blueprint_chores::chore_id)
                        .load::<i32>(conn)?,
                );
            }
            let completed: i64 = chore_routines::table
                .inner_join(chores::table)
                .filter(chore_routines::routine_id.eq(routine_id))
                .filter(chore_routines::completed_at.is_not_null())
                .count()
                .get_result(conn)?;
            Ok(ChoreCounts {
                total: chore_ids.len() as i64,
                completed,
            })
        })
        .await
    }
}

fn lookup_routine_blueprint(
    conn: &mut SqliteConnection,
    routine_id: i32,
) -> Result<Option<i32>, StorageError> {
    routines::table
        .find(routine_id)
        .select(routines::routine_blueprint_id)
        .first::<Option<i32>>(conn)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "routine",
            id: routine_id,
        })
}

fn load_blueprint_chores(
    conn: &mut SqliteConnection,
    blueprint_id: i32,
) -> Result<Vec<(RoutineBlueprintChore, Chore)>, StorageError> {
    Ok(routine_blueprint_chores::table
        .inner_join(chores::table)
        .filter(routine_blueprint_chores::routine_blueprint_id.eq(blueprint_id))
        .order(routine_blueprint_chores::id.asc())
        .select((RoutineBlueprintChore::as_select(), Chore::as_select()))
        .load::<(RoutineBlueprintChore, Chore)>(conn)?)
}

fn insert_blueprint_chores(
    conn: &mut SqliteConnection,
    blueprint_id: i32,
    assignments: &[BlueprintChoreSpec],
    now: NaiveDateTime,
) -> Result<(), StorageError> {
    for a in assignments {
        let row = NewRoutineBlueprintChore {
            created: now,
            modified: now,
            routine_blueprint_id: blueprint_id,
            chore_id: a.chore_id,
            image: a.image.as_deref(),
        };
        diesel::insert_into(routine_blueprint_chores::table)
            .values(&row)
            .execute(conn)?;
    }
    Ok(())
}

fn validate_chore(fields: &ChoreFields) -> Result<(), StorageError> {
    if fields.name.trim().is_empty() {
        return Err(StorageError::InvalidInput("chore name is required".into()));
    }
    if fields.default_points <= 0 {
        return Err(StorageError::InvalidInput(
            "default points must be positive".into(),
        ));
    }
    Ok(())
}

fn validate_blueprint(fields: &BlueprintFields) -> Result<(), StorageError> {
    if fields.name.trim().is_empty() {
        return Err(StorageError::InvalidInput(
            "blueprint name is required".into(),
        ));
    }
    Ok(())
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    Ok(())
}
