use crate::analysis::anomaly::AnomalyParams;
use crate::analysis::isolation_forest::IsolationForestParams;
use crate::analysis::risk::RiskParams;
use crate::error::Result;
use crate::models::panel::ChangeMetric;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// Environment variable naming an optional JSON file with site-wide defaults.
pub const SETTINGS_FILE_ENV: &str = "FORENINGSLENS_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub contamination: f64,
    pub anomaly_trees: usize,
    pub anomaly_max_samples: usize,
    pub anomaly_seed: u64,
    pub risk_trees: usize,
    pub test_fraction: f64,
    pub risk_seed: u64,
    pub deviation_threshold: f64,
    pub deviation_metric: ChangeMetric,
}

impl AnalysisSettings {
    pub fn anomaly_params(&self) -> AnomalyParams {
        AnomalyParams {
            contamination: self.contamination,
            forest: IsolationForestParams {
                n_estimators: self.anomaly_trees,
                max_samples: self.anomaly_max_samples,
                seed: self.anomaly_seed,
            },
        }
    }

    pub fn risk_params(&self) -> RiskParams {
        RiskParams {
            n_estimators: self.risk_trees,
            test_fraction: self.test_fraction,
            seed: self.risk_seed,
        }
    }
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn get_settings() -> Result<Value, String> {
    resolve_settings_value(&Value::Null).map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub async fn resolve_settings(overrides: Value) -> Result<Value, String> {
    resolve_settings_value(&overrides).map_err(|e| e.to_string())
}

/// Defaults, then the optional settings file, then per-call overrides;
/// the merged result is clamped into valid ranges. Nothing is written back.
pub fn load_effective_settings(overrides: &Value) -> Result<AnalysisSettings> {
    let resolved = resolve_settings_value(overrides)?;
    Ok(serde_json::from_value(resolved)?)
}

pub fn resolve_settings_value(overrides: &Value) -> Result<Value> {
    let mut merged = default_settings();

    if let Ok(path) = std::env::var(SETTINGS_FILE_ENV) {
        if let Some(from_file) = load_settings_file(Path::new(&path))? {
            merge_settings(&mut merged, &from_file);
        }
    }

    merge_settings(&mut merged, overrides);
    normalize_percentages(&mut merged);
    sanitize_settings(&mut merged);
    Ok(merged)
}

/// Read a settings file if it exists. A malformed file is an error; the
/// dashboard should not silently run with settings the user did not choose.
pub fn load_settings_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        log::debug!("No settings file at {}", path.display());
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str::<Value>(&raw)?))
}

pub fn default_settings() -> Value {
    json!({
        "contamination": 0.1,
        "anomalyTrees": 100,
        "anomalyMaxSamples": 256,
        "anomalySeed": 42,
        "riskTrees": 100,
        "testFraction": 0.2,
        "riskSeed": 42,
        "deviationThreshold": 20.0,
        "deviationMetric": ChangeMetric::ActivitiesPerMember.column()
    })
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        // Null means "no overrides".
        (_, Value::Null) => {}
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

/// Sliders report whole percentages; `10` for contamination means 10 %.
fn normalize_percentages(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };
    for key in ["contamination", "testFraction"] {
        if let Some(v) = obj.get(key).and_then(Value::as_f64) {
            if v > 1.0 {
                obj.insert(key.to_string(), json!(v / 100.0));
            }
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        *settings = default_settings();
        return;
    };

    clamp_f64(obj, "contamination", 0.001, 0.5, 0.1);
    clamp_u64(obj, "anomalyTrees", 10, 1000, 100);
    clamp_u64(obj, "anomalyMaxSamples", 2, 4096, 256);
    clamp_u64(obj, "anomalySeed", 0, u64::MAX, 42);
    clamp_u64(obj, "riskTrees", 10, 1000, 100);
    clamp_f64(obj, "testFraction", 0.05, 0.5, 0.2);
    clamp_u64(obj, "riskSeed", 0, u64::MAX, 42);
    clamp_f64(obj, "deviationThreshold", 0.0, 100.0, 20.0);

    let metrics: Vec<&str> = ChangeMetric::ALL.iter().map(|m| m.column()).collect();
    sanitize_enum(obj, "deviationMetric", &metrics, ChangeMetric::ActivitiesPerMember.column());

    // Unknown keys would fail deserialization into `AnalysisSettings`.
    let known = default_settings();
    if let Some(known) = known.as_object() {
        obj.retain(|key, _| known.contains_key(key));
    }
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_into_settings() {
        let settings = load_effective_settings(&Value::Null).unwrap();
        assert_eq!(settings.contamination, 0.1);
        assert_eq!(settings.risk_trees, 100);
        assert_eq!(settings.test_fraction, 0.2);
        assert_eq!(settings.deviation_metric, ChangeMetric::ActivitiesPerMember);
    }

    #[test]
    fn percentage_contamination_is_converted_and_clamped() {
        let settings = load_effective_settings(&json!({ "contamination": 10 })).unwrap();
        assert!((settings.contamination - 0.1).abs() < 1e-12);

        let settings = load_effective_settings(&json!({ "contamination": 0.9 })).unwrap();
        assert_eq!(settings.contamination, 0.5);
    }

    #[test]
    fn merges_partial_overrides_without_losing_defaults() {
        let settings = load_effective_settings(&json!({
            "deviationThreshold": 35,
            "deviationMetric": "Grants per Member Change (%)"
        }))
        .unwrap();

        assert_eq!(settings.deviation_threshold, 35.0);
        assert_eq!(settings.deviation_metric, ChangeMetric::GrantsPerMember);
        assert_eq!(settings.anomaly_seed, 42);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let resolved = resolve_settings_value(&json!({
            "deviationMetric": "Members per Grant",
            "riskTrees": "many",
            "colorScheme": "heatwave"
        }))
        .unwrap();

        assert_eq!(resolved["deviationMetric"], json!("Activities per Member Change (%)"));
        assert_eq!(resolved["riskTrees"], json!(100));
        assert!(resolved.get("colorScheme").is_none());
    }

    #[test]
    fn reads_settings_file_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert!(load_settings_file(&path).unwrap().is_none());

        fs::write(&path, r#"{ "riskSeed": 7 }"#).unwrap();
        let value = load_settings_file(&path).unwrap().unwrap();
        assert_eq!(value["riskSeed"], json!(7));
    }
}
