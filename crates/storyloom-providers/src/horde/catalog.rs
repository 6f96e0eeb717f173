//! Model and worker catalogs, and model auto-selection

use crate::config::ModelSelector;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKER_CONTEXT_LENGTH: u32 = 2048;
pub const DEFAULT_WORKER_GENERATION_LENGTH: u32 = 512;

/// A text model currently served by the remote queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub worker_count: u32,
    pub performance: f64,
    pub queue_depth: f64,
    /// Estimated seconds until a new job would start
    pub eta: u64,
}

/// A remote worker and the limits it advertises
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerDescriptor {
    pub id: String,
    pub name: String,
    pub supported_models: Vec<String>,
    pub max_context_length: u32,
    pub max_generation_length: u32,
    pub online: bool,
    pub trusted: bool,
    pub performance: String,
}

impl WorkerDescriptor {
    pub fn supports_any(&self, models: &[String]) -> bool {
        self.supported_models
            .iter()
            .any(|supported| models.iter().any(|model| model == supported))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawModel {
    name: String,
    #[serde(default)]
    count: u32,
    #[serde(default)]
    performance: f64,
    #[serde(default)]
    queued: f64,
    #[serde(default)]
    eta: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWorker {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    models: Vec<String>,
    max_context_length: Option<u32>,
    max_length: Option<u32>,
    #[serde(default)]
    online: bool,
    #[serde(default)]
    trusted: bool,
    #[serde(default)]
    performance: Option<String>,
}

/// Shape raw model entries: busiest first
pub(crate) fn shape_models(raw: Vec<RawModel>) -> Vec<ModelDescriptor> {
    let mut models: Vec<ModelDescriptor> = raw
        .into_iter()
        .map(|model| ModelDescriptor {
            name: model.name,
            worker_count: model.count,
            performance: model.performance,
            queue_depth: model.queued,
            eta: model.eta,
        })
        .collect();
    models.sort_by(|a, b| b.worker_count.cmp(&a.worker_count));
    models
}

/// Shape raw worker entries: online only, with missing or zero limits defaulted
pub(crate) fn shape_workers(raw: Vec<RawWorker>) -> Vec<WorkerDescriptor> {
    raw.into_iter()
        .filter(|worker| worker.online)
        .map(|worker| WorkerDescriptor {
            id: worker.id,
            name: worker.name,
            supported_models: worker.models,
            max_context_length: worker
                .max_context_length
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_WORKER_CONTEXT_LENGTH),
            max_generation_length: worker
                .max_length
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_WORKER_GENERATION_LENGTH),
            online: worker.online,
            trusted: worker.trusted,
            performance: worker.performance.unwrap_or_default(),
        })
        .collect()
}

fn matches_pattern(name: &str, patterns: &[String]) -> bool {
    let name = name.to_lowercase();
    patterns
        .iter()
        .any(|pattern| name.contains(&pattern.to_lowercase()))
}

/// Pick models for a call that did not pin any
///
/// Keeps non-excluded models from a preferred family that have at least
/// one worker; when none qualify, falls back to the busiest non-excluded
/// models.
pub fn auto_select_models(models: &[ModelDescriptor], selector: &ModelSelector) -> Vec<String> {
    let candidates: Vec<&ModelDescriptor> = models
        .iter()
        .filter(|model| !matches_pattern(&model.name, &selector.excluded))
        .collect();

    let preferred: Vec<String> = candidates
        .iter()
        .filter(|model| model.worker_count > 0 && matches_pattern(&model.name, &selector.preferred))
        .map(|model| model.name.clone())
        .collect();

    if !preferred.is_empty() {
        return preferred;
    }

    let mut fallback = candidates;
    fallback.sort_by(|a, b| b.worker_count.cmp(&a.worker_count));
    fallback
        .into_iter()
        .take(selector.fallback_count)
        .map(|model| model.name.clone())
        .collect()
}

/// Smallest context length among workers serving any of `models`
pub fn min_context_length(workers: &[WorkerDescriptor], models: &[String]) -> Option<u32> {
    workers
        .iter()
        .filter(|worker| worker.supports_any(models))
        .map(|worker| worker.max_context_length)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, worker_count: u32) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            worker_count,
            performance: 0.0,
            queue_depth: 0.0,
            eta: 0,
        }
    }

    fn worker(models: &[&str], max_context_length: u32) -> WorkerDescriptor {
        WorkerDescriptor {
            id: "w".to_string(),
            name: "worker".to_string(),
            supported_models: models.iter().map(|m| m.to_string()).collect(),
            max_context_length,
            max_generation_length: 512,
            online: true,
            trusted: false,
            performance: String::new(),
        }
    }

    #[test]
    fn test_auto_select_preferred_families() {
        let models = vec![
            model("koboldcpp/Llama-3-8B-Stheno", 4),
            model("koboldcpp/Mistral-7B", 0),
            model("aphrodite/TinyLlama-1.1B", 9),
            model("koboldcpp/Pygmalion-6B", 12),
        ];
        let selected = auto_select_models(&models, &ModelSelector::default());
        assert_eq!(selected, vec!["koboldcpp/Llama-3-8B-Stheno".to_string()]);
    }

    #[test]
    fn test_auto_select_falls_back_to_busiest() {
        let models = vec![
            model("a/Pygmalion", 2),
            model("b/Erebus", 7),
            model("c/debug-model", 50),
            model("d/Janeway", 5),
            model("e/Nerys", 1),
        ];
        let selected = auto_select_models(&models, &ModelSelector::default());
        assert_eq!(selected, vec!["b/Erebus", "d/Janeway", "a/Pygmalion"]);
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let models = vec![model("Llama-3-TEST", 3)];
        assert!(auto_select_models(&models, &ModelSelector::default()).is_empty());
    }

    #[test]
    fn test_min_context_length() {
        let workers = vec![
            worker(&["a"], 4096),
            worker(&["a", "b"], 2048),
            worker(&["c"], 1024),
        ];
        let models = vec!["a".to_string()];
        assert_eq!(min_context_length(&workers, &models), Some(2048));
        assert_eq!(min_context_length(&workers, &["z".to_string()]), None);
    }

    #[test]
    fn test_shape_workers_filters_offline_and_fills_defaults() {
        let raw: Vec<RawWorker> = serde_json::from_value(serde_json::json!([
            {"id": "1", "name": "on", "models": ["m"], "online": true},
            {"id": "2", "name": "off", "models": ["m"], "online": false, "max_context_length": 8192}
        ]))
        .unwrap();
        let workers = shape_workers(raw);
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].max_context_length, 2048);
        assert_eq!(workers[0].max_generation_length, 512);
    }

    #[test]
    fn test_shape_workers_defaults_zero_limits() {
        let raw: Vec<RawWorker> = serde_json::from_value(serde_json::json!([
            {"id": "1", "name": "zero", "models": ["m"], "online": true, "max_context_length": 0, "max_length": 0},
            {"id": "2", "name": "big", "models": ["m"], "online": true, "max_context_length": 4096, "max_length": 256}
        ]))
        .unwrap();
        let workers = shape_workers(raw);
        assert_eq!(workers[0].max_context_length, 2048);
        assert_eq!(workers[0].max_generation_length, 512);
        assert_eq!(workers[1].max_context_length, 4096);
        assert_eq!(
            min_context_length(&workers, &["m".to_string()]),
            Some(2048)
        );
    }

    #[test]
    fn test_shape_models_sorted_by_workers() {
        let raw: Vec<RawModel> = serde_json::from_value(serde_json::json!([
            {"name": "small", "count": 1},
            {"name": "big", "count": 10, "queued": 3.0, "eta": 12}
        ]))
        .unwrap();
        let models = shape_models(raw);
        assert_eq!(models[0].name, "big");
        assert_eq!(models[0].eta, 12);
    }
}
