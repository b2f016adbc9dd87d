//! Retraining trigger detection.
//!
//! Three conditions fire a [`RetrainingTrigger`]:
//! - enough negative signals share the same pattern (signal type plus
//!   configured data fields such as `soil_type`)
//! - estimate accuracy drifts: MAPE over recent variance signals reaches the
//!   drift threshold
//! - too many recent decisions fall below the confidence threshold
//!
//! Each condition resets its own window after firing so a single burst does
//! not produce a stream of duplicate triggers.

use crate::config::toml_config::RetrainingConfig;
use crate::domain::model::{FeedbackSignal, RetrainingTrigger, TriggerReason};
use crate::feedback::signal::Polarity;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MonitorState {
    pattern_counts: HashMap<String, usize>,
    percentage_errors: VecDeque<f64>,
    low_confidence_flags: VecDeque<bool>,
}

#[derive(Debug)]
pub struct RetrainingMonitor {
    config: RetrainingConfig,
    low_confidence_threshold: f64,
    model_version: String,
    state: Mutex<MonitorState>,
}

impl RetrainingMonitor {
    pub fn new(config: RetrainingConfig, low_confidence_threshold: f64, model_version: String) -> Self {
        Self {
            config,
            low_confidence_threshold,
            model_version,
            state: Mutex::new(MonitorState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn trigger(&self, reason: TriggerReason) -> RetrainingTrigger {
        RetrainingTrigger {
            reason,
            detected_at: Utc::now(),
            model_version: self.model_version.clone(),
        }
    }

    pub fn pattern_key(&self, signal: &FeedbackSignal) -> String {
        let mut key = signal.signal_type.as_str().to_string();
        for field in &self.config.pattern_fields {
            let value = match signal.data.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => continue,
            };
            key.push_str(&format!("|{}={}", field, value));
        }
        key
    }

    /// Feed one captured signal; returns every trigger it completes.
    pub fn observe_signal(&self, signal: &FeedbackSignal) -> Vec<RetrainingTrigger> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut triggers = Vec::new();

        if signal.signal_type.is_negative() {
            tracing::debug!("Negative signal detected: {}", signal.signal_type);
            let key = self.pattern_key(signal);
            let mut state = self.state();
            let count = state.pattern_counts.entry(key.clone()).or_insert(0);
            *count += 1;
            if *count >= self.config.pattern_threshold {
                let count = *count;
                state.pattern_counts.remove(&key);
                drop(state);
                triggers.push(self.trigger(TriggerReason::SimilarPatterns {
                    pattern: key,
                    count,
                }));
            }
        }

        let variance = signal.signal_type.polarity() == Polarity::Variance;
        if let Some(error) = percentage_error(&signal.data).filter(|_| variance) {
            let mut state = self.state();
            state.percentage_errors.push_back(error);
            while state.percentage_errors.len() > self.config.window_size {
                state.percentage_errors.pop_front();
            }

            let samples = state.percentage_errors.len();
            if samples >= self.config.min_samples {
                let mape = state.percentage_errors.iter().sum::<f64>() / samples as f64;
                if mape >= self.config.drift_mape {
                    state.percentage_errors.clear();
                    drop(state);
                    triggers.push(self.trigger(TriggerReason::AccuracyDrift {
                        baseline_mape: self.config.baseline_mape,
                        current_mape: mape,
                        samples,
                    }));
                }
            }
        }

        triggers
    }

    /// Feed one decision's confidence score.
    pub fn observe_decision(&self, confidence: f64) -> Option<RetrainingTrigger> {
        if !self.config.enabled {
            return None;
        }

        let mut state = self.state();
        state
            .low_confidence_flags
            .push_back(confidence < self.low_confidence_threshold);
        while state.low_confidence_flags.len() > self.config.window_size {
            state.low_confidence_flags.pop_front();
        }

        let decisions = state.low_confidence_flags.len();
        if decisions < self.config.min_decisions {
            return None;
        }

        let low_confidence = state.low_confidence_flags.iter().filter(|low| **low).count();
        let ratio = low_confidence as f64 / decisions as f64;
        if ratio < self.config.low_confidence_ratio {
            return None;
        }

        state.low_confidence_flags.clear();
        drop(state);
        Some(self.trigger(TriggerReason::LowConfidence {
            ratio,
            low_confidence,
            decisions,
        }))
    }

    /// MAPE over the current window, if any variance samples exist.
    pub fn current_mape(&self) -> Option<f64> {
        let state = self.state();
        if state.percentage_errors.is_empty() {
            return None;
        }
        Some(state.percentage_errors.iter().sum::<f64>() / state.percentage_errors.len() as f64)
    }
}

fn percentage_error(data: &Value) -> Option<f64> {
    let estimated = data.get("estimated_cost")?.as_f64()?;
    let actual = data.get("actual_cost")?.as_f64()?;
    if actual == 0.0 {
        return None;
    }
    Some(((actual - estimated) / actual).abs() * 100.0)
}
