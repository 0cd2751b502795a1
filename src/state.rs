//! Application state: the store, prompts, model client, and analytics hook.
//!
//! This module owns:
//!   - the persistence boundary (exercise sets, attempts, answers, feedback)
//!   - the prompts struct (from TOML or defaults)
//!   - the optional model provider client
//!   - the analytics collaborator
//!
//! Exercise content comes from the optional TOML bank plus built-in seeds;
//! bank entries win on id collisions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::analytics::Analytics;
use crate::config::{load_app_config_from_env, Prompts};
use crate::domain::ExerciseSet;
use crate::llm::{FeedbackModel, OpenAi};
use crate::seeds::seed_exercise_sets;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub model: Option<Arc<dyn FeedbackModel>>,
    pub prompts: Prompts,
    pub analytics: Analytics,
}

impl AppState {
    /// Build state from env: load config, seed exercise sets, init the model
    /// client and analytics hook.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_app_config_from_env();
        let prompts = cfg_opt
            .as_ref()
            .map(|c| c.prompts.clone())
            .unwrap_or_default();

        let mut set_map = HashMap::<String, ExerciseSet>::new();
        let mut bank_count = 0usize;
        if let Some(cfg) = &cfg_opt {
            for entry in cfg.exercise_sets.clone() {
                let set = entry.into_exercise_set();
                bank_count += 1;
                set_map.insert(set.id.clone(), set);
            }
        }

        // Always insert built-in seeds, but don't overwrite bank ids.
        let mut seed_count = 0usize;
        for set in seed_exercise_sets() {
            seed_count += 1;
            set_map.entry(set.id.clone()).or_insert(set);
        }

        for set in set_map.values() {
            info!(target: "aula_backend", set = %set.id, title = %set.title, questions = set.questions.len(), "Startup exercise inventory");
        }
        info!(target: "aula_backend", bank = bank_count, seed = seed_count, "Exercise sets loaded");

        let model: Option<Arc<dyn FeedbackModel>> = match OpenAi::from_env() {
            Some(client) => {
                info!(target: "aula_backend", base_url = %client.base_url, fast_model = %client.fast_model, strong_model = %client.strong_model, "OpenAI enabled.");
                Some(Arc::new(client))
            }
            None => {
                info!(target: "aula_backend", "OpenAI disabled (no OPENAI_API_KEY). Feedback falls back to local synthesis.");
                None
            }
        };

        Self {
            store: Store::with_exercise_sets(set_map.into_values().collect()),
            model,
            prompts,
            analytics: Analytics::from_env(),
        }
    }

    /// State with seed content only; used by tests to inject a fake model.
    #[cfg(test)]
    pub fn for_tests(model: Option<Arc<dyn FeedbackModel>>) -> Self {
        Self {
            store: Store::with_exercise_sets(seed_exercise_sets()),
            model,
            prompts: Prompts::default(),
            analytics: Analytics::from_env(),
        }
    }
}
