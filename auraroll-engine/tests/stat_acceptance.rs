use std::sync::Arc;

use auraroll_engine::{
    Catalog, EngineConfig, NoYield, RollPlan, RunRequest, Selection, SystemClock, TrialRun,
    builtin_catalog, drive, resolve, sequential_weights,
};

const DISTRIBUTION_EPSILON: f64 = 1e-9;
/// Allowed deviation, in binomial standard deviations.
const SIGMA_TOLERANCE: f64 = 5.0;

fn single_item_catalog(chance: u64) -> Arc<Catalog> {
    let json = format!(
        r#"{{"default_context": "NORMAL", "contexts": [{{"id": "NORMAL"}}],
            "items": [{{"name": "Solo", "chance": {chance}}}]}}"#
    );
    Arc::new(Catalog::from_json(&json).expect("single item catalog"))
}

fn run_wins(catalog: &Arc<Catalog>, luck: f64, total: u64, seed: u64) -> (u64, u64) {
    let context = resolve(catalog, &Selection::new("NORMAL", luck)).expect("resolves");
    let run = TrialRun::new(
        Arc::clone(catalog),
        RunRequest::new(total, luck, context).with_seed(seed),
        EngineConfig::default(),
    )
    .expect("valid run");
    let outcome = drive(run, &mut NoYield, &SystemClock, &mut ());
    let completed = outcome.into_completed().expect("run completes");
    let solo = catalog.item_by_name("Solo").expect("item").id;
    (completed.tally.wins(solo), completed.tally.no_win())
}

#[allow(clippy::cast_precision_loss)]
fn assert_binomial(observed: u64, trials: u64, p: f64) {
    let n = trials as f64;
    let mean = n * p;
    let sd = (n * p * (1.0 - p)).sqrt();
    let deviation = (observed as f64 - mean).abs();
    assert!(
        deviation <= SIGMA_TOLERANCE * sd,
        "observed {observed}, expected {mean:.1} +/- {:.1}",
        SIGMA_TOLERANCE * sd
    );
}

#[test]
fn sequential_weights_match_reference_split() {
    let (weights, residual) = sequential_weights(&[0.5, 0.5, 1.0]);
    assert_eq!(weights.len(), 3);
    assert!((weights[0] - 0.5).abs() < f64::EPSILON);
    assert!((weights[1] - 0.25).abs() < f64::EPSILON);
    assert!((weights[2] - 0.25).abs() < f64::EPSILON);
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < f64::EPSILON);
    assert!(residual.abs() < f64::EPSILON);
}

#[test]
fn outcome_distribution_is_conserved_across_contexts() {
    let catalog = builtin_catalog();
    let events: Vec<String> = catalog.events().map(|event| event.id.clone()).collect();
    let presets: Vec<String> = catalog.presets().map(|preset| preset.id.clone()).collect();
    for (_, ctx) in catalog.contexts() {
        let runes = std::iter::once(None).chain(catalog.runes().map(|rune| Some(rune.id.clone())));
        for rune in runes {
            for luck in [0.0, 1.0, 2.5, 1_000.0, 650_000.0, 1e7, 1e12] {
                let mut selection = Selection::new(&ctx.id, luck);
                selection.rune = rune.clone();
                selection.events.clone_from(&events);
                selection.presets.clone_from(&presets);
                let context = resolve(catalog, &selection).expect("resolves");
                let dist = RollPlan::compile(catalog, &context).outcome_distribution();
                assert!(
                    (dist.total() - 1.0).abs() < DISTRIBUTION_EPSILON,
                    "{selection:?}: {dist:?}"
                );
                for part in [dist.preroll, dist.luck_independent, dist.luck_scaled, dist.no_win] {
                    assert!((0.0..=1.0).contains(&part));
                }
            }
        }
    }
}

#[test]
fn luck_equal_to_chance_always_wins() {
    let catalog = single_item_catalog(1_000);
    let (wins, no_win) = run_wins(&catalog, 1_000.0, 100_000, 0xA11);
    assert_eq!(wins, 100_000);
    assert_eq!(no_win, 0);
}

#[test]
fn luck_scales_rare_items_linearly() {
    let catalog = single_item_catalog(1_000_000);
    let trials = 10_000_000;
    let (wins, no_win) = run_wins(&catalog, 500.0, trials, 0x5EED);
    assert_eq!(wins + no_win, trials);
    assert_binomial(wins, trials, 0.0005);
}

#[test]
fn zero_luck_never_wins_luck_scaled_items() {
    let catalog = single_item_catalog(2);
    let (wins, no_win) = run_wins(&catalog, 0.0, 50_000, 3);
    assert_eq!(wins, 0);
    assert_eq!(no_win, 50_000);
}

#[test]
fn sampled_frequencies_track_sequential_weights() {
    let catalog = Arc::new(
        Catalog::from_json(
            r#"{"default_context": "NORMAL", "contexts": [{"id": "NORMAL"}],
                "items": [
                    {"name": "Half", "chance": 2},
                    {"name": "Fifth", "chance": 5},
                    {"name": "Tenth", "chance": 10}
                ]}"#,
        )
        .expect("catalog"),
    );
    let trials = 400_000;
    let context = resolve(&catalog, &Selection::new("NORMAL", 1.0)).expect("resolves");
    let run = TrialRun::new(
        Arc::clone(&catalog),
        RunRequest::new(trials, 1.0, context).with_seed(0xFACE),
        EngineConfig::default(),
    )
    .expect("valid run");
    let completed = drive(run, &mut NoYield, &SystemClock, &mut ())
        .into_completed()
        .expect("completes");

    // Rarest first: Tenth, then Fifth, then Half.
    let tenth = 0.1;
    let fifth = 0.9 * 0.2;
    let half = 0.9 * 0.8 * 0.5;
    for (name, p) in [("Tenth", tenth), ("Fifth", fifth), ("Half", half)] {
        let id = catalog.item_by_name(name).expect("item").id;
        assert_binomial(completed.tally.wins(id), trials, p);
    }
    assert_binomial(completed.tally.no_win(), trials, 1.0 - tenth - fifth - half);
}
