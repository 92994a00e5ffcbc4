use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use workout_core::config::{queue_path, store_path};
use workout_core::queue::cleanup_processed_queues;
use workout_core::*;

#[derive(Parser)]
#[command(name = "wtrack")]
#[command(about = "Workout session tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    user: Option<Uuid>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session (in progress now, or planned with --planned)
    Start {
        /// Workout template id; ad-hoc sessions get a fresh one
        #[arg(long)]
        workout: Option<Uuid>,

        /// Plan the session for this time instead of starting it
        #[arg(long)]
        planned: Option<DateTime<Utc>>,

        /// Program the workout belongs to
        #[arg(long)]
        program: Option<Uuid>,
    },

    /// Start a planned session
    Begin { session: Uuid },

    /// Add a catalog exercise to a session
    AddExercise {
        session: Uuid,

        /// Catalog exercise id or name
        #[arg(long)]
        exercise: String,

        /// How the exercise is measured (reps, weight, time, distance)
        #[arg(long, default_value = "weight")]
        metric: MetricType,

        #[command(flatten)]
        values: SetArgs,
    },

    /// Remove an exercise from a session
    RemoveExercise { session: Uuid, exercise: Uuid },

    /// Record a set
    AddSet {
        session: Uuid,
        exercise: Uuid,

        #[command(flatten)]
        values: SetArgs,
    },

    /// Replace the values of a recorded set
    UpdateSet {
        session: Uuid,
        exercise: Uuid,
        set: Uuid,

        #[command(flatten)]
        values: SetArgs,
    },

    /// Remove a set
    RemoveSet {
        session: Uuid,
        exercise: Uuid,
        set: Uuid,
    },

    /// Record a manual 0-100 score for an exercise
    Score {
        session: Uuid,
        exercise: Uuid,
        score: f64,
    },

    /// Complete an in-progress session
    Complete {
        session: Uuid,

        /// very-easy, easy, moderate, hard, very-hard
        #[arg(long, default_value = "moderate")]
        difficulty: PerceivedDifficulty,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Abandon an in-progress session
    Abandon {
        session: Uuid,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Cancel a planned session
    Cancel {
        session: Uuid,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Show a session's performance summary
    Summary {
        session: Uuid,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Schedule a workout for a date
    Schedule {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        workout: Option<Uuid>,

        #[arg(long)]
        program: Option<Uuid>,
    },

    /// Manage planned workouts
    #[command(subcommand)]
    Planned(PlannedCommands),

    /// Manage personal metrics
    #[command(subcommand)]
    Metric(MetricCommands),

    /// Publish a profile height/weight change
    Profile {
        #[arg(long)]
        height: Option<f64>,

        #[arg(long)]
        weight: Option<f64>,
    },

    /// Apply pending profile changes as metrics
    Sync {
        /// Delete processed queue batches afterwards
        #[arg(long)]
        cleanup: bool,
    },

    /// Show session statistics
    Stats {
        /// Only sessions from the last N days
        #[arg(long)]
        days: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Write finished sessions to a CSV file, replacing its contents
    Export {
        /// Output file (default: <data-dir>/sessions.csv)
        path: Option<PathBuf>,
    },

    /// List built-in exercises
    Catalog,
}

#[derive(Subcommand)]
enum PlannedCommands {
    /// Start tracking a planned workout
    Start { planned: Uuid },
    Complete { planned: Uuid },
    Cancel { planned: Uuid },
    Abandon { planned: Uuid },
    Reschedule {
        planned: Uuid,

        #[arg(long)]
        date: NaiveDate,
    },
    /// List planned workouts
    List,
}

#[derive(Subcommand)]
enum MetricCommands {
    /// Record a measurement
    Record {
        /// weight, height or pr
        #[arg(long = "type")]
        metric_type: UserMetricType,

        #[arg(long)]
        value: f64,

        #[arg(long)]
        unit: Option<String>,

        /// Measurement time (default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Correct a recorded measurement
    Update {
        metric: Uuid,

        #[arg(long)]
        value: Option<f64>,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List measurements of one kind
    List {
        #[arg(long = "type")]
        metric_type: UserMetricType,
    },
}

#[derive(Args, Clone, Debug, Default)]
struct SetArgs {
    #[arg(long)]
    reps: Option<u32>,

    #[arg(long)]
    weight: Option<f64>,

    /// Duration in seconds
    #[arg(long)]
    duration: Option<u32>,

    #[arg(long)]
    distance: Option<f64>,

    /// Rest after the set in seconds
    #[arg(long)]
    rest: Option<u32>,
}

impl From<SetArgs> for SetValues {
    fn from(args: SetArgs) -> Self {
        SetValues {
            repetitions: args.reps,
            weight: args.weight,
            duration_seconds: args.duration,
            distance: args.distance,
            rest_time_seconds: args.rest,
        }
    }
}

type FileTracker = Tracker<FileStore, &'static StaticCatalog>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(logging::level_for_verbosity(cli.verbose));

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let user = cli.user.or(config.user.id);
    tracing::debug!("Using data directory {:?}", data_dir);

    let mut tracker = Tracker::new(FileStore::new(store_path(&data_dir)), get_default_catalog())
        .with_calorie_model(config.calories.model())
        .with_recorded_body_weight(config.calories.use_recorded_weight)
        .with_synchronizer(MetricSynchronizer::new(config.sync.marker.clone()));
    let now = Utc::now();

    match cli.command {
        Commands::Start {
            workout,
            planned,
            program,
        } => {
            let id = tracker.start_session(
                NewSession {
                    user_id: require_user(user)?,
                    workout_id: workout.unwrap_or_else(Uuid::new_v4),
                    planned_date: planned,
                    is_from_program: program.is_some(),
                    program_id: program,
                },
                now,
            )?;
            let verb = if planned.is_some() { "Planned" } else { "Started" };
            println!("{} session {}", verb, id);
        }
        Commands::Begin { session } => {
            tracker.begin_session(session, now)?;
            println!("Started session {}", session);
        }
        Commands::AddExercise {
            session,
            exercise,
            metric,
            values,
        } => {
            let exercise_id = resolve_exercise(&exercise)?;
            let id = tracker.add_exercise(session, exercise_id, metric, values.into(), now)?;
            println!("Added exercise {}", id);
        }
        Commands::RemoveExercise { session, exercise } => {
            tracker.remove_exercise(session, exercise)?;
            println!("Removed exercise {}", exercise);
        }
        Commands::AddSet {
            session,
            exercise,
            values,
        } => {
            let id = tracker.add_set(session, exercise, values.into(), now)?;
            println!("Added set {}", id);
        }
        Commands::UpdateSet {
            session,
            exercise,
            set,
            values,
        } => {
            tracker.update_set(session, exercise, set, values.into())?;
            println!("Updated set {}", set);
        }
        Commands::RemoveSet {
            session,
            exercise,
            set,
        } => {
            tracker.remove_set(session, exercise, set)?;
            println!("Removed set {}", set);
        }
        Commands::Score {
            session,
            exercise,
            score,
        } => {
            tracker.set_exercise_score(session, exercise, score)?;
            println!("Scored exercise {} at {:.1}", exercise, score);
        }
        Commands::Complete {
            session,
            difficulty,
            notes,
        } => {
            let summary = tracker.complete_session(session, difficulty, notes.as_deref(), now)?;
            println!("✓ Completed session {}", session);
            print_summary(&summary);
        }
        Commands::Abandon { session, reason } => {
            tracker.abandon_session(session, reason.as_deref(), now)?;
            println!("Abandoned session {}", session);
        }
        Commands::Cancel { session, reason } => {
            tracker.cancel_session(session, reason.as_deref())?;
            println!("Cancelled session {}", session);
        }
        Commands::Summary { session, json } => {
            let summary = tracker.session_summary(session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Schedule {
            date,
            workout,
            program,
        } => {
            let id = tracker.schedule_workout(
                require_user(user)?,
                workout.unwrap_or_else(Uuid::new_v4),
                date,
                program,
            )?;
            println!("Scheduled workout {}", id);
        }
        Commands::Planned(command) => cmd_planned(&mut tracker, command, user, now)?,
        Commands::Metric(command) => cmd_metric(&mut tracker, command, user, now)?,
        Commands::Profile { height, weight } => {
            let event = MeasurementChanged::new(require_user(user)?, height, weight, now);
            JsonlQueue::new(queue_path(&data_dir)).publish(&event)?;
            println!("Published profile revision {}", event.revision_id);
        }
        Commands::Sync { cleanup } => cmd_sync(&mut tracker, &data_dir, cleanup)?,
        Commands::Stats { days, json } => {
            cmd_stats(&tracker, require_user(user)?, days, json, now)?
        }
        Commands::Export { path } => {
            let path = path.unwrap_or_else(|| data_dir.join("sessions.csv"));
            let data = tracker.snapshot()?;
            let count = export_sessions_csv(data.sessions(), &path)?;
            if count == 0 {
                println!("No finished sessions to export.");
            } else {
                println!("✓ Exported {} sessions", count);
                println!("  CSV: {}", path.display());
            }
        }
        Commands::Catalog => {
            for entry in get_default_catalog().entries() {
                println!("{}  {}", entry.id, entry.name);
            }
        }
    }

    Ok(())
}

fn require_user(user: Option<Uuid>) -> Result<Uuid> {
    user.ok_or_else(|| {
        Error::Config("no user given: pass --user or set user.id in the config file".into())
    })
}

/// Accept a catalog id or a case-insensitive exercise name
fn resolve_exercise(exercise: &str) -> Result<Uuid> {
    if let Ok(id) = exercise.parse::<Uuid>() {
        return Ok(id);
    }
    get_default_catalog()
        .entries()
        .into_iter()
        .find(|e| e.name.eq_ignore_ascii_case(exercise.trim()))
        .map(|e| e.id)
        .ok_or_else(|| Error::Other(format!("Unknown exercise: {}", exercise)))
}

fn cmd_planned(
    tracker: &mut FileTracker,
    command: PlannedCommands,
    user: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<()> {
    match command {
        PlannedCommands::Start { planned } => {
            let session = tracker.start_planned_workout(planned, now)?;
            println!("Started session {}", session);
        }
        PlannedCommands::Complete { planned } => {
            tracker.complete_planned_workout(planned)?;
            println!("Completed planned workout {}", planned);
        }
        PlannedCommands::Cancel { planned } => {
            tracker.cancel_planned_workout(planned)?;
            println!("Cancelled planned workout {}", planned);
        }
        PlannedCommands::Abandon { planned } => {
            tracker.abandon_planned_workout(planned)?;
            println!("Abandoned planned workout {}", planned);
        }
        PlannedCommands::Reschedule { planned, date } => {
            tracker.reschedule_planned_workout(planned, date)?;
            println!("Rescheduled planned workout {} to {}", planned, date);
        }
        PlannedCommands::List => {
            let today = now.date_naive();
            let planned = tracker.planned_workouts(require_user(user)?)?;
            if planned.is_empty() {
                println!("No planned workouts.");
            }
            for p in planned {
                let flag = if p.is_overdue(today) {
                    " (overdue)"
                } else if p.is_scheduled_for_today(today) {
                    " (today)"
                } else {
                    ""
                };
                println!("{}  {}  {:?}{}", p.id(), p.scheduled_date(), p.status(), flag);
            }
        }
    }
    Ok(())
}

fn cmd_metric(
    tracker: &mut FileTracker,
    command: MetricCommands,
    user: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<()> {
    match command {
        MetricCommands::Record {
            metric_type,
            value,
            unit,
            at,
            notes,
        } => {
            let id = tracker.record_metric(
                require_user(user)?,
                metric_type,
                value,
                unit.as_deref(),
                at.unwrap_or(now),
                notes,
            )?;
            println!("Recorded metric {}", id);
        }
        MetricCommands::Update { metric, value, at } => {
            if value.is_none() && at.is_none() {
                return Err(Error::Other("nothing to update: pass --value or --at".into()));
            }
            if let Some(value) = value {
                tracker.update_metric_value(metric, value)?;
            }
            if let Some(at) = at {
                tracker.update_metric_recorded_at(metric, at)?;
            }
            println!("Updated metric {}", metric);
        }
        MetricCommands::List { metric_type } => {
            let metrics = tracker.metrics(require_user(user)?, metric_type)?;
            if metrics.is_empty() {
                println!("No {:?} metrics recorded.", metric_type);
            }
            for m in metrics {
                println!(
                    "{}  {}  {} {}  {}",
                    m.id(),
                    m.recorded_at().format("%Y-%m-%d %H:%M"),
                    m.value(),
                    m.unit(),
                    m.notes().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn cmd_sync(tracker: &mut FileTracker, data_dir: &Path, cleanup: bool) -> Result<()> {
    let queue = JsonlQueue::new(queue_path(data_dir));
    let report = tracker.sync_measurements(&queue)?;

    if report.batches == 0 {
        println!("No pending profile changes.");
    } else {
        println!(
            "✓ Synchronized {} change(s), {} metric(s) created",
            report.applied, report.metrics_created
        );
        if report.duplicates > 0 {
            println!("  Skipped {} already-applied change(s)", report.duplicates);
        }
        for (revision, reason) in &report.rejected {
            eprintln!("  Rejected revision {}: {}", revision, reason);
        }
    }

    if cleanup {
        if let Some(dir) = queue.path().parent() {
            let cleaned = cleanup_processed_queues(dir)?;
            if cleaned > 0 {
                println!("✓ Cleaned up {} processed queue batches", cleaned);
            }
        }
    }
    Ok(())
}

fn cmd_stats(
    tracker: &FileTracker,
    user: Uuid,
    days: Option<u32>,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let data = tracker.snapshot()?;
    let stats = match days {
        Some(days) => history::session_stats(
            history::recent_sessions(data.sessions(), user, days, now),
            user,
        ),
        None => history::session_stats(data.sessions(), user),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Sessions:   {}", stats.total_sessions);
    println!("  completed {}", stats.completed);
    println!("  abandoned {}", stats.abandoned);
    println!("  cancelled {}", stats.cancelled);
    println!("Duration:   {} min", stats.total_duration_seconds / 60);
    println!("Calories:   {} kcal", stats.total_calories);
    println!("Volume:     {:.1}", stats.total_volume);
    if let Some(avg) = stats.average_score {
        println!("Avg score:  {:.1}", avg);
    }
    if let Some(rate) = stats.completion_rate() {
        println!("Completion: {:.0}%", rate * 100.0);
    }
    Ok(())
}

fn print_summary(summary: &PerformanceSummary) {
    println!();
    println!("  Status:     {:?}", summary.status);
    if let Some(secs) = summary.total_duration_seconds {
        println!("  Duration:   {}m {:02}s", secs / 60, secs % 60);
    }
    if let Some(kcal) = summary.calories_estimated {
        println!("  Calories:   {} kcal", kcal);
    }
    println!("  Score:      {:.1}", summary.performance_score);
    println!(
        "  Exercises:  {} ({} sets, volume {:.1})",
        summary.exercise_count, summary.total_sets, summary.total_volume
    );
    for exercise in &summary.exercises {
        let best = exercise
            .best_performance
            .map(|b| format!("{}", b))
            .unwrap_or_else(|| "-".into());
        println!(
            "    {}. {} [{}]  sets {}  best {}  score {:.1}",
            exercise.order,
            exercise.exercise_name,
            exercise.exercise_id,
            exercise.set_count,
            best,
            exercise.score
        );
    }
    println!();
}
