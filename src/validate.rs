//! Config validation (friendly errors)
//!
//! Purpose:
//! - Catch common misconfigurations before the first frame goes out
//! - Explain *what* is wrong, *where* it lives, and *what to do*
//! - Errors abort startup; warnings are logged and the run continues

use fanstream_engine::config::{unknown_keys, StreamConfig};
use serde_json::Value;

use crate::{loge, logw};

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

impl ValidationIssue {
    pub fn warn(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Warn, path: path.into(), message: message.into(), hint }
    }
    pub fn error(path: impl Into<String>, message: impl Into<String>, hint: Option<String>) -> Self {
        Self { level: IssueLevel::Error, path: path.into(), message: message.into(), hint }
    }
}

pub fn emit_issues(tag: &str, issues: &[ValidationIssue]) {
    for it in issues {
        match it.level {
            IssueLevel::Warn => {
                if let Some(h) = &it.hint {
                    logw!(tag, "{}: {} (hint: {})", it.path, it.message, h);
                } else {
                    logw!(tag, "{}: {}", it.path, it.message);
                }
            }
            IssueLevel::Error => {
                if let Some(h) = &it.hint {
                    loge!(tag, "{}: {} (hint: {})", it.path, it.message, h);
                } else {
                    loge!(tag, "{}: {}", it.path, it.message);
                }
            }
        }
    }
}

/// Emit a one-line summary even when there are zero issues.
pub fn emit_summary(tag: &str, label: &str, issues: &[ValidationIssue]) {
    let warns = issues.iter().filter(|i| i.level == IssueLevel::Warn).count();
    let errs = error_count(issues);
    if errs == 0 && warns == 0 {
        crate::logi!(tag, "validation: {label} OK (0 issues)");
    } else {
        crate::logw!(tag, "validation: {label} issues found (errors={errs} warnings={warns})");
    }
}

pub fn error_count(issues: &[ValidationIssue]) -> usize {
    issues.iter().filter(|i| i.level == IssueLevel::Error).count()
}

fn at(field: &str) -> String {
    format!("fanstream.json:/{}", field.replace('.', "/"))
}

/// Check the typed config, plus the raw document (when one was loaded) for unknown keys.
pub fn validate_stream_config(cfg: &StreamConfig, raw: Option<&Value>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(raw) = raw {
        for key in unknown_keys(raw) {
            issues.push(ValidationIssue::warn(
                at(&key),
                "unknown key is ignored",
                Some("check for typos; set FANSTREAM_STRICT_CONFIG=1 to make this an error".into()),
            ));
        }
    }

    if cfg.version != 1 {
        issues.push(ValidationIssue::warn(
            at("version"),
            format!("version {} is newer than this build understands (1)", cfg.version),
            None,
        ));
    }

    // endpoint
    let ep = &cfg.endpoint;
    if !(ep.base_url.starts_with("http://") || ep.base_url.starts_with("https://")) {
        issues.push(ValidationIssue::error(
            at("endpoint.base_url"),
            format!("'{}' is not an http(s) URL", ep.base_url),
            Some("use the fan's address, e.g. http://192.168.4.1".into()),
        ));
    }
    if !ep.path.is_empty() && !ep.path.starts_with('/') {
        issues.push(ValidationIssue::warn(
            at("endpoint.path"),
            format!("'{}' has no leading '/'; one will be inserted", ep.path),
            None,
        ));
    }
    if ep.field_name.trim().is_empty() {
        issues.push(ValidationIssue::error(
            at("endpoint.field_name"),
            "multipart field name is empty",
            Some("the fan reads the image from the 'frame' field".into()),
        ));
    }
    if ep.timeout_ms == 0 {
        issues.push(ValidationIssue::error(
            at("endpoint.timeout_ms"),
            "0 disables the request timeout and a hung device would block forever",
            Some("5000 is a sensible bound".into()),
        ));
    }
    if ep.connect_timeout_ms > ep.timeout_ms && ep.timeout_ms > 0 {
        issues.push(ValidationIssue::warn(
            at("endpoint.connect_timeout_ms"),
            "longer than timeout_ms; the overall timeout wins",
            None,
        ));
    }

    // render
    let r = &cfg.render;
    if !(r.figure_size_in.is_finite() && r.figure_size_in > 0.0) || r.dpi == 0 {
        issues.push(ValidationIssue::error(
            at("render.figure_size_in"),
            format!("figure {} in @ {} dpi gives an empty raster", r.figure_size_in, r.dpi),
            None,
        ));
    }
    if r.samples < 2 {
        issues.push(ValidationIssue::error(
            at("render.samples"),
            format!("{} samples cannot draw a curve", r.samples),
            Some("use at least 2 (default 100)".into()),
        ));
    }
    if !(r.axis_limit.is_finite() && r.axis_limit > 0.0) {
        issues.push(ValidationIssue::error(
            at("render.axis_limit"),
            format!("axis limit must be positive, got {}", r.axis_limit),
            None,
        ));
    }
    if !(-90.0..=90.0).contains(&r.elevation_deg) {
        issues.push(ValidationIssue::warn(
            at("render.elevation_deg"),
            format!("{}° is outside [-90, 90]; the view flips over", r.elevation_deg),
            None,
        ));
    }

    // animation
    let a = &cfg.animation;
    if !a.step_deg.is_finite() {
        issues.push(ValidationIssue::error(at("animation.step_deg"), "step must be finite", None));
    } else if a.step_deg.rem_euclid(360.0) == 0.0 {
        issues.push(ValidationIssue::warn(
            at("animation.step_deg"),
            "step is a multiple of 360°, the image will never rotate",
            None,
        ));
    }
    if a.frame_interval_ms == 0 {
        issues.push(ValidationIssue::warn(
            at("animation.frame_interval_ms"),
            "no pause between frames; the device is flooded as fast as it answers",
            None,
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(issues: &[ValidationIssue], level: IssueLevel) -> Vec<String> {
        issues.iter().filter(|i| i.level == level).map(|i| i.path.clone()).collect()
    }

    #[test]
    fn defaults_are_clean() {
        let issues = validate_stream_config(&StreamConfig::default(), None);
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn unknown_keys_are_warnings() {
        let raw = serde_json::json!({ "render": { "dpl": 90 }, "extra": true });
        let issues = validate_stream_config(&StreamConfig::default(), Some(&raw));
        let mut warns = paths(&issues, IssueLevel::Warn);
        warns.sort();
        assert_eq!(warns, vec!["fanstream.json:/extra", "fanstream.json:/render/dpl"]);
        assert_eq!(error_count(&issues), 0);
    }

    #[test]
    fn broken_values_are_errors() {
        let mut cfg = StreamConfig::default();
        cfg.endpoint.base_url = "ftp://fan".into();
        cfg.endpoint.timeout_ms = 0;
        cfg.render.samples = 1;
        cfg.render.dpi = 0;

        let issues = validate_stream_config(&cfg, None);
        let errs = paths(&issues, IssueLevel::Error);
        assert!(errs.contains(&"fanstream.json:/endpoint/base_url".to_string()));
        assert!(errs.contains(&"fanstream.json:/endpoint/timeout_ms".to_string()));
        assert!(errs.contains(&"fanstream.json:/render/samples".to_string()));
        assert!(errs.contains(&"fanstream.json:/render/figure_size_in".to_string()));
        assert_eq!(error_count(&issues), 4);
    }

    #[test]
    fn questionable_pacing_is_a_warning() {
        let mut cfg = StreamConfig::default();
        cfg.animation.step_deg = 360.0;
        cfg.animation.frame_interval_ms = 0;
        cfg.endpoint.path = "upload_frame".into();

        let issues = validate_stream_config(&cfg, None);
        assert_eq!(error_count(&issues), 0);
        assert_eq!(paths(&issues, IssueLevel::Warn).len(), 3);
    }
}
