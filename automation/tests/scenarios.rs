//! End-to-end scenarios for the Automation Loop: bumper-cutoff rotation,
//! silence padding, and override take-over.

use automation::{default_registry, Context, LoopConfig};
use catalog::{ItemType, PlayableItem, Store};
use player::{PlayerSession, SessionConfig};
use requirements::{CommandKind, EngineConfig, Requirement, RequirementEngine, Schedule, TimeSpecification};
use std::time::{Duration, Instant};

fn fast_exit_player() -> PlayerSession {
    PlayerSession::new(SessionConfig {
        player_path: "true".into(),
        ..SessionConfig::default()
    })
}

fn only_at(offset_seconds: i64) -> (Requirement, i64) {
    let now = shared::time_now().timestamp();
    let due_at = now + offset_seconds;
    (
        Requirement {
            kind: CommandKind::NoOp,
            payload: Vec::new(),
            target_name: None,
            when: TimeSpecification {
                only_at_times: vec![due_at],
                ..TimeSpecification::default()
            },
            reboot: false,
            internal_time_advance: 1,
        },
        now,
    )
}

#[test]
fn bumper_cutoff_rotation_abandons_mainshow_without_touching_bumpers() {
    let store = Store::open_in_memory().expect("in-memory store");

    // Mainshow candidate: a weighted playlist fetch_random_weighted_playlist can find.
    let mainshow_item = store
        .insert_item(&PlayableItem::new("variety-1.mp3", ItemType::Local))
        .expect("insert");
    let variety_id = store.create_playlist("variety", 1).expect("create playlist");
    store
        .update_playlist_items(variety_id, &[mainshow_item])
        .expect("set items");

    // Bumpers: a distinct named playlist, referenced by LoopConfig::bumpers.
    let bumper_item = store
        .insert_item(&PlayableItem::new("bumper-1.mp3", ItemType::Local))
        .expect("insert");
    let bumpers_id = store.create_playlist("bumpers", 1).expect("create playlist");
    store
        .update_playlist_items(bumpers_id, &[bumper_item])
        .expect("set items");

    let (requirement, now) = only_at(400);
    let schedule = Schedule {
        schedule: vec![requirement],
    };
    let engine = RequirementEngine::new(EngineConfig::default(), schedule, now);

    let config = LoopConfig {
        bumpers: "bumpers".into(),
        bumpercutoff: 200,
        ..LoopConfig::default()
    };
    let ctx = Context::new(store, fast_exit_player(), engine, default_registry(), config)
        .expect("valid context");
    // Context::new's own initial selection already picked "variety" as the
    // mainshow; drain it so the scenario's "mainshow empty" precondition
    // holds going into run_once.
    ctx.pop_mainshow_with_timelimit(i64::MAX)
        .expect("drain initial mainshow selection")
        .expect("initial mainshow had exactly one item");
    assert_eq!(ctx.mainshow_size(), 0);

    let progressed = automation::run_once(&ctx).expect("run_once");

    assert!(!progressed, "deadline far beyond bumpercutoff should abandon, not progress");
    assert_eq!(ctx.bumperlist_size(), 1, "bumpers must be refreshed but not popped from");
    assert_eq!(ctx.mainshow_size(), 1, "mainshow should have been reselected from the catalog");
}

#[test]
fn silence_padding_sleeps_out_a_short_deadline_with_nothing_to_play() {
    // Catalog with nothing in it at all: mainshow and the synthetic bumpers
    // superlist (LoopConfig::bumpers left empty) are both unfillable.
    let store = Store::open_in_memory().expect("in-memory store");

    let (requirement, now) = only_at(3);
    let schedule = Schedule {
        schedule: vec![requirement],
    };
    let engine = RequirementEngine::new(EngineConfig::default(), schedule, now);

    let ctx = Context::new(
        store,
        fast_exit_player(),
        engine,
        default_registry(),
        LoopConfig::default(),
    )
    .expect("valid context");

    let started = Instant::now();
    let progressed = automation::run_once(&ctx).expect("run_once");
    let elapsed = started.elapsed();

    assert!(progressed, "sleeping out the deadline still counts as progress");
    assert!(
        elapsed >= Duration::from_secs(1),
        "expected a multi-second sleep, took {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(10),
        "sleep should be bounded by the ~3s deadline, took {elapsed:?}"
    );
}

#[test]
fn override_queue_drains_in_order_then_normal_operation_resumes() {
    let store = Store::open_in_memory().expect("in-memory store");
    let first = store
        .insert_item(&PlayableItem::new("override-1.mp3", ItemType::Local))
        .expect("insert");
    let second = store
        .insert_item(&PlayableItem::new("override-2.mp3", ItemType::Local))
        .expect("insert");

    let engine = RequirementEngine::new(EngineConfig::default(), Schedule::default(), 0);
    let ctx = Context::new(
        store,
        fast_exit_player(),
        engine,
        default_registry(),
        LoopConfig::default(),
    )
    .expect("valid context");

    ctx.push_override_item(first);
    ctx.push_override_item(second);
    ctx.set_manual_override(true);
    assert_eq!(ctx.override_queue_size(), 2);

    // Simulates an operator disabling override once the queue has drained:
    // the drain loop busy-polls on the flag while the queue is empty, so a
    // concurrent writer is the only way to observe that without blocking
    // the test forever.
    let flipper = std::thread::spawn({
        let started = Instant::now();
        move || {
            while started.elapsed() < Duration::from_millis(150) {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    });

    let ctx_ref: &Context = &ctx;
    std::thread::scope(|scope| {
        scope.spawn(|| {
            flipper.join().expect("flipper thread");
            ctx_ref.set_manual_override(false);
        });

        let started = Instant::now();
        let result = automation::run_once(ctx_ref);
        let elapsed = started.elapsed();

        assert!(result.is_ok(), "run_once should complete once override is disabled");
        assert_eq!(ctx_ref.override_queue_size(), 0, "both items must have drained");
        assert!(!ctx_ref.manual_override(), "override should be left disabled");
        assert!(
            elapsed >= Duration::from_millis(100),
            "run_once returned before the override flag was disabled, took {elapsed:?}"
        );
    });
}
