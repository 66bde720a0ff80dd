//! End-to-end run: simulate, store, reload, evaluate, predict and compare.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use moodrl::core::posterior::{LogDensity, Posterior};
use moodrl::core::predictive::simulate_many;
use moodrl::core::ModelConfig;
use moodrl::data::io::{load_task, read_json, write_json, TaskTable};
use moodrl::data::synthetic::{generate, TaskDesign};
use moodrl::diagnostics::{compare, pointwise_log_lik, waic, Observations};
use moodrl::params::{HierarchicalPrior, ModelParams};

#[test]
fn test_simulated_task_round_trip() {
    let prior = HierarchicalPrior::default();
    let config = ModelConfig::default();
    let mut rng = StdRng::seed_from_u64(2024);
    let truth = prior.sample(6, &mut rng).unwrap();
    let design = TaskDesign {
        miss_rate: 0.05,
        ..Default::default()
    };
    let task = generate(&truth, &design, &config, &mut rng).unwrap();

    let dir = tempdir().unwrap();
    let data_path = dir.path().join("task.json");
    let params_path = dir.path().join("params.json");
    write_json(&data_path, &TaskTable::from_data(&task.data)).unwrap();
    write_json(&params_path, &vec![truth.clone()]).unwrap();

    let data = load_task(&data_path).unwrap();
    assert_eq!(data.choices, task.data.choices);
    let draws: Vec<ModelParams> = read_json(&params_path).unwrap();
    assert_eq!(draws[0].raw, truth.raw);

    let posterior = Posterior::new(data, prior, config);
    let direct = posterior.evaluate(&draws[0]).unwrap();
    let in_memory = posterior.evaluate(&truth).unwrap();
    assert!((direct.total() - in_memory.total()).abs() < 1e-9);

    let x = posterior.layout().pack(&truth).unwrap();
    assert_eq!(x.len(), posterior.dim());
    assert!(posterior.log_density(&x).unwrap().is_finite());
}

#[test]
fn test_true_model_wins_comparison() {
    let prior = HierarchicalPrior::default();
    let config = ModelConfig::default();
    let mut rng = StdRng::seed_from_u64(7);
    let truth = prior.sample(8, &mut rng).unwrap();
    let task = generate(&truth, &TaskDesign::default(), &config, &mut rng).unwrap();

    // A jittered posterior around the truth versus one with inflated rating noise.
    let near: Vec<ModelParams> = (0..20)
        .map(|d| {
            let mut p = truth.clone();
            p.mood_noise *= 1.0 + 0.01 * (d as f64 - 10.0) / 10.0;
            p
        })
        .collect();
    let far: Vec<ModelParams> = near
        .iter()
        .map(|p| {
            let mut q = p.clone();
            q.mood_noise *= 10.0;
            q
        })
        .collect();

    let pa = simulate_many(&near, &task.data, &config, 1).unwrap();
    let pb = simulate_many(&far, &task.data, &config, 1).unwrap();
    let wa = waic(&pointwise_log_lik(&pa, &task.data, Observations::Mood).unwrap()).unwrap();
    let wb = waic(&pointwise_log_lik(&pb, &task.data, Observations::Mood).unwrap()).unwrap();
    let c = compare(&wa, &wb).unwrap();
    assert!(c.diff < 0.0, "diff = {}", c.diff);

    // Choice columns are identical because only σ_m differs.
    let ca = waic(&pointwise_log_lik(&pa, &task.data, Observations::Choice).unwrap()).unwrap();
    let cb = waic(&pointwise_log_lik(&pb, &task.data, Observations::Choice).unwrap()).unwrap();
    assert_eq!(compare(&ca, &cb).unwrap().diff, 0.0);
}
