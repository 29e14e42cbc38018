//! End-to-end scenarios for progress trees through the public API.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use advancements::{
    Advancement, AdvancementProgress, Collaborators, Criterion, Decision, FileProgressStore,
    ManualClock, ProgressError, ProgressOptions, ProgressStore, SavedProgress, Timestamp,
    TriggerRegistry, UnknownKeyPolicy, Veto, WireProgress, UNACHIEVED,
};

fn ts(millis: i64) -> Timestamp {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
}

/// Refuses grants for the named criteria.
#[derive(Default)]
struct RefuseGrants {
    names: Mutex<HashSet<String>>,
}

impl RefuseGrants {
    fn refuse(&self, name: &str) {
        self.names.lock().unwrap().insert(name.to_string());
    }
}

impl Veto for RefuseGrants {
    fn propose_grant(
        &self,
        criterion: &Criterion,
        _owner: &str,
        proposed: Timestamp,
    ) -> Decision<Timestamp> {
        if self.names.lock().unwrap().contains(criterion.name()) {
            Decision::Cancelled
        } else {
            Decision::Proceed(proposed)
        }
    }
}

/// Tracks which leaves are listening for triggers.
#[derive(Default)]
struct Listening {
    attached: Mutex<HashSet<(String, String)>>,
}

impl Listening {
    fn is_attached(&self, owner: &str, name: &str) -> bool {
        self.attached
            .lock()
            .unwrap()
            .contains(&(owner.to_string(), name.to_string()))
    }
}

impl TriggerRegistry for Listening {
    fn attach(&self, owner: &str, criterion: &Arc<Criterion>) {
        self.attached
            .lock()
            .unwrap()
            .insert((owner.to_string(), criterion.name().to_string()));
    }

    fn detach(&self, owner: &str, criterion: &Arc<Criterion>) {
        self.attached
            .lock()
            .unwrap()
            .remove(&(owner.to_string(), criterion.name().to_string()));
    }
}

fn collaborators(millis: i64) -> (Collaborators, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(millis));
    let hooks = Collaborators::default().with_clock(clock.clone());
    (hooks, clock)
}

struct MineTree {
    advancement: Advancement,
    stone: Arc<Criterion>,
    iron: Arc<Criterion>,
    kills: Arc<Criterion>,
    either: Arc<Criterion>,
}

fn mine_tree() -> MineTree {
    let stone = Criterion::leaf("mine_stone");
    let iron = Criterion::leaf("mine_iron");
    let kills = Criterion::score("kill_zombies", 3).unwrap();
    let either = Criterion::or("any_ore", vec![stone.clone(), iron.clone()]).unwrap();
    let root = Criterion::and("miner", vec![either.clone(), kills.clone()]).unwrap();
    MineTree {
        advancement: Advancement::new("story/miner", root),
        stone,
        iron,
        kills,
        either,
    }
}

#[test]
fn test_and_takes_latest_child() {
    let a = Criterion::leaf("a");
    let b = Criterion::leaf("b");
    let both = Criterion::and("both", vec![a.clone(), b.clone()]).unwrap();
    let adv = Advancement::new("test/and", both.clone());
    let (hooks, clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &adv, hooks).unwrap();

    progress.grant(&a).unwrap();
    assert_eq!(progress.get(&both).unwrap().get(), None);
    assert!(!progress.is_complete());

    clock.set(200);
    progress.grant(&b).unwrap();
    assert_eq!(progress.get(&both).unwrap().get(), Some(ts(200)));
    assert!(progress.is_complete());
    assert_eq!(progress.completed_at(), Some(ts(200)));
}

#[test]
fn test_or_ignores_unachieved_children() {
    let tree = mine_tree();
    let (hooks, clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();

    progress.grant(&tree.stone).unwrap();
    assert_eq!(progress.get(&tree.either).unwrap().get(), Some(ts(100)));

    clock.set(200);
    progress.grant(&tree.iron).unwrap();
    assert_eq!(progress.get(&tree.either).unwrap().get(), Some(ts(200)));
}

#[test]
fn test_grant_is_idempotent() {
    let tree = mine_tree();
    let (hooks, clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();

    let mut changes = 0;
    let first = progress.grant_with(&tree.stone, || changes += 1).unwrap();
    assert_eq!(changes, 1);

    clock.set(500);
    let second = progress.grant_with(&tree.stone, || changes += 1).unwrap();
    assert_eq!(first, second);
    assert_eq!(changes, 1);
}

#[test]
fn test_revoke_returns_previous() {
    let tree = mine_tree();
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();

    progress.grant(&tree.stone).unwrap();
    assert_eq!(progress.revoke(&tree.stone).unwrap(), Some(ts(100)));
    assert_eq!(progress.get(&tree.stone).unwrap().get(), None);
    assert_eq!(progress.revoke(&tree.stone).unwrap(), None);
}

#[test]
fn test_completion_follows_score_goal() {
    let tree = mine_tree();
    let (hooks, clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();

    progress.grant(&tree.iron).unwrap();
    progress.set_score(&tree.kills, 2).unwrap();
    assert!(!progress.is_complete());

    clock.set(300);
    assert_eq!(progress.set_score(&tree.kills, 3).unwrap(), Some(ts(300)));
    assert!(progress.is_complete());
    assert_eq!(progress.completed_at(), Some(ts(300)));

    progress.set_score(&tree.kills, 1).unwrap();
    assert!(!progress.is_complete());
}

#[test]
fn test_score_out_of_range_rejected() {
    let tree = mine_tree();
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();

    let err = progress.set_score(&tree.kills, 4).unwrap_err();
    assert!(matches!(err, ProgressError::InvalidArgument { .. }));
    let err = progress.set_score(&tree.kills, -1).unwrap_err();
    assert!(matches!(err, ProgressError::InvalidArgument { .. }));
    let err = progress.set_score(&tree.stone, 1).unwrap_err();
    assert!(matches!(err, ProgressError::InvalidArgument { .. }));
}

#[test]
fn test_foreign_criterion_not_found() {
    let tree = mine_tree();
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();

    let stranger = Criterion::leaf("mine_diamond");
    let err = progress.grant(&stranger).unwrap_err();
    assert!(matches!(err, ProgressError::NotFound { .. }));
}

#[test]
fn test_and_grant_is_not_atomic() {
    let c1 = Criterion::leaf("c1");
    let c2 = Criterion::leaf("c2");
    let both = Criterion::and("both", vec![c1.clone(), c2.clone()]).unwrap();
    let adv = Advancement::new("test/and", both.clone());

    let veto = Arc::new(RefuseGrants::default());
    veto.refuse("c2");
    let (hooks, _clock) = collaborators(100);
    let mut progress =
        AdvancementProgress::new("steve", &adv, hooks.with_veto(veto.clone())).unwrap();

    assert_eq!(progress.grant(&both).unwrap(), None);
    assert_eq!(progress.get(&c1).unwrap().get(), Some(ts(100)));
    assert_eq!(progress.get(&c2).unwrap().get(), None);
    assert!(!progress.is_complete());
}

#[test]
fn test_triggers_follow_leaf_state() {
    let tree = mine_tree();
    let triggers = Arc::new(Listening::default());
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new(
        "steve",
        &tree.advancement,
        hooks.with_triggers(triggers.clone()),
    )
    .unwrap();

    assert!(triggers.is_attached("steve", "mine_stone"));
    assert!(triggers.is_attached("steve", "mine_iron"));

    progress.grant(&tree.stone).unwrap();
    assert!(!triggers.is_attached("steve", "mine_stone"));

    progress.revoke(&tree.stone).unwrap();
    assert!(triggers.is_attached("steve", "mine_stone"));

    progress.release_triggers();
    assert!(!triggers.is_attached("steve", "mine_stone"));
    assert!(!triggers.is_attached("steve", "mine_iron"));
}

#[test]
fn test_save_load_round_trip_on_mirror_tree() {
    let tree = mine_tree();
    let (hooks, clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();
    progress.grant(&tree.stone).unwrap();
    clock.set(250);
    progress.set_score(&tree.kills, 3).unwrap();

    let saved = progress.save_progress();
    assert!(!saved.contains_key("miner"));
    assert!(!saved.contains_key("any_ore"));

    let mirror_tree = mine_tree();
    let (mirror_hooks, _) = collaborators(9_000);
    let mut mirror =
        AdvancementProgress::new("steve", &mirror_tree.advancement, mirror_hooks).unwrap();
    mirror.load_progress(&saved).unwrap();

    for name in ["mine_stone", "mine_iron", "kill_zombies", "any_ore", "miner"] {
        assert_eq!(
            progress.get_by_name(name).unwrap().get(),
            mirror.get_by_name(name).unwrap().get(),
            "mismatch for {}",
            name
        );
    }
    assert!(mirror.is_complete());
}

#[test]
fn test_load_rejects_unknown_keys_when_strict() {
    let tree = mine_tree();
    let (hooks, _clock) = collaborators(100);
    let options = ProgressOptions {
        unknown_keys: UnknownKeyPolicy::Error,
    };
    let mut progress =
        AdvancementProgress::with_options("steve", &tree.advancement, hooks, options).unwrap();

    let mut saved = SavedProgress::new();
    saved.insert("mine_stone".to_string(), 100);
    saved.insert("mine_gold".to_string(), 100);

    let err = progress.load_progress(&saved).unwrap_err();
    assert!(matches!(err, ProgressError::NotFound { .. }));
    assert_eq!(progress.get(&tree.stone).unwrap().get(), None);
}

#[test]
fn test_dirty_range_for_partial_score() {
    let kills = Criterion::score("kills", 3).unwrap();
    let adv = Advancement::new("test/kills", kills.clone());
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &adv, hooks).unwrap();

    progress.set_score(&kills, 2).unwrap();

    let mut out = WireProgress::new();
    progress.fill_dirty_sync(&mut out);
    assert_eq!(out.len(), 2);
    assert_eq!(out["kills.0"], 100);
    assert_eq!(out["kills.1"], 100);

    let mut again = WireProgress::new();
    progress.fill_dirty_sync(&mut again);
    assert!(again.is_empty());
}

#[test]
fn test_fill_progress_reports_full_state() {
    let tree = mine_tree();
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();
    progress.grant(&tree.iron).unwrap();
    progress.set_score(&tree.kills, 1).unwrap();

    let mut out = WireProgress::new();
    progress.fill_progress(&mut out);

    assert_eq!(out["mine_iron"], 100);
    assert_eq!(out["mine_stone"], UNACHIEVED);
    assert_eq!(out["kill_zombies.0"], 100);
    assert_eq!(out["kill_zombies.1"], UNACHIEVED);
    assert_eq!(out["kill_zombies.2"], UNACHIEVED);
    assert!(!out.contains_key("miner"));
}

#[test]
fn test_persist_and_restore_through_file_store() {
    let dir = TempDir::new().unwrap();
    let store = FileProgressStore::with_dir(dir.path()).unwrap();

    let tree = mine_tree();
    let (hooks, _clock) = collaborators(100);
    let mut progress = AdvancementProgress::new("steve", &tree.advancement, hooks).unwrap();
    progress.grant(&tree.stone).unwrap();
    progress.set_score(&tree.kills, 3).unwrap();
    progress.persist(&store).unwrap();

    assert!(store.exists("steve", "story/miner").unwrap());

    let (fresh_hooks, _) = collaborators(5_000);
    let mut restored =
        AdvancementProgress::new("steve", &tree.advancement, fresh_hooks).unwrap();
    assert!(restored.restore(&store).unwrap());
    assert!(restored.is_complete());
    assert_eq!(restored.completed_at(), Some(ts(100)));

    let (other_hooks, _) = collaborators(5_000);
    let mut other = AdvancementProgress::new("alex", &tree.advancement, other_hooks).unwrap();
    assert!(!other.restore(&store).unwrap());
}

#[test]
fn test_empty_criterion_always_achieved() {
    let always = Criterion::empty("always");
    let leaf = Criterion::leaf("leaf");
    let either = Criterion::or("either", vec![always.clone(), leaf.clone()]).unwrap();
    let adv = Advancement::new("test/empty", either);
    let (hooks, _clock) = collaborators(42);
    let mut progress = AdvancementProgress::new("steve", &adv, hooks).unwrap();

    assert!(progress.is_complete());
    assert_eq!(progress.revoke(&always).unwrap(), None);
    assert_eq!(progress.get(&always).unwrap().get(), Some(ts(42)));
    assert!(progress.save_progress().is_empty());
}

#[test]
fn test_colliding_progress_keys_rejected_at_build() {
    let root = Criterion::and(
        "root",
        vec![Criterion::leaf("kills.0"), Criterion::score("kills", 1).unwrap()],
    )
    .unwrap();
    let adv = Advancement::new("test/clash", root);
    let (hooks, _clock) = collaborators(100);

    let err = AdvancementProgress::new("steve", &adv, hooks).unwrap_err();
    assert!(matches!(err, ProgressError::InvalidArgument { .. }));
}
