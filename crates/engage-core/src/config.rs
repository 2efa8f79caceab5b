use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use llm_chain::ChainConfig;
use serde::{Deserialize, Serialize};

use crate::error::{EngageError, Result};
use crate::filter::ItemFilter;
use crate::orchestrator::EngageSettings;
use crate::pacing::PacingGovernor;
use crate::paths;
use crate::recency::RecencyWindow;
use crate::selection::Discovery;
use crate::types::ActionKind;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A channel the runner engages on behalf of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Channel URL or handle, passed to the bridge as `ENGAGE_CHANNEL`.
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub discovery: Discovery,
    #[serde(default = "default_actions")]
    pub actions: Vec<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_comments_per_video: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency_window_days: Option<u64>,
}

fn default_actions() -> Vec<ActionKind> {
    vec![ActionKind::Heart]
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            discovery: Discovery::default(),
            actions: default_actions(),
            max_comments_per_video: None,
            ignore_keywords: Vec::new(),
            recency_window_days: None,
        }
    }
}

impl Scenario {
    pub fn window(&self) -> Option<RecencyWindow> {
        self.recency_window_days.map(RecencyWindow::days)
    }

    pub fn filter(&self) -> ItemFilter {
        ItemFilter::new(self.window(), &self.ignore_keywords)
    }
}

// ---------------------------------------------------------------------------
// PacingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: Option<u32>,
}

fn default_min_delay() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    5.0
}

fn default_max_per_minute() -> Option<u32> {
    Some(10)
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            max_per_minute: default_max_per_minute(),
        }
    }
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        EngageError::Configuration(format!(
            "pacing.{field} must be a non-negative number of seconds, got {value}"
        ))
    })
}

impl PacingConfig {
    pub fn governor(&self) -> Result<PacingGovernor> {
        let min = secs("min_delay_secs", self.min_delay_secs)?;
        let max = secs("max_delay_secs", self.max_delay_secs)?;
        let governor = PacingGovernor::new(min, max)?;
        match self.max_per_minute {
            Some(n) => governor.with_max_per_minute(n),
            None => Ok(governor),
        }
    }
}

// ---------------------------------------------------------------------------
// EngageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngageConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_max_action_retries")]
    pub max_action_retries: u32,
    #[serde(default = "default_action_retry_delay_ms")]
    pub action_retry_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
    #[serde(default = "default_video_concurrency")]
    pub video_concurrency: usize,
}

fn default_max_action_retries() -> u32 {
    2
}

fn default_action_retry_delay_ms() -> u64 {
    2_000
}

fn default_video_concurrency() -> usize {
    1
}

impl Default for EngageConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_action_retries: default_max_action_retries(),
            action_retry_delay_ms: default_action_retry_delay_ms(),
            run_timeout_secs: None,
            video_concurrency: default_video_concurrency(),
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeConfig
// ---------------------------------------------------------------------------

/// Shell commands backing the command-bridge collaborator. Each runs under
/// `sh -c` with its context in `ENGAGE_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Prints one JSON `VideoRef` per line, newest first.
    #[serde(default)]
    pub list_videos: String,
    /// Prints one JSON comment per line: `id`, `author`, `text`, and `posted`
    /// (display text) or `posted_at` (RFC 3339).
    #[serde(default)]
    pub discover: String,
    /// Exit 0 on success, 75 on a transient failure, anything else is fatal.
    #[serde(default)]
    pub perform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub scenarios: BTreeMap<String, Scenario>,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub engage: EngageConfig,
    #[serde(default)]
    pub llm: ChainConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub defaults: Defaults,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            profiles: BTreeMap::new(),
            scenarios: BTreeMap::new(),
            pacing: PacingConfig::default(),
            engage: EngageConfig::default(),
            llm: ChainConfig::default(),
            bridge: BridgeConfig::default(),
            defaults: Defaults::default(),
        }
    }
}

impl Config {
    /// Starter config written by `init`: one profile, one scenario.
    pub fn starter(channel: impl Into<String>) -> Self {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "main".to_string(),
            Profile {
                channel: channel.into(),
                description: None,
            },
        );
        cfg.scenarios.insert(
            "heart-recent".to_string(),
            Scenario {
                recency_window_days: Some(7),
                max_comments_per_video: Some(50),
                ..Scenario::default()
            },
        );
        cfg.defaults = Defaults {
            profile: Some("main".to_string()),
            scenario: Some("heart-recent".to_string()),
        };
        cfg
    }

    pub fn load(home: &Path) -> Result<Self> {
        let path = paths::config_path(home);
        if !path.exists() {
            return Err(EngageError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        let path = paths::config_path(home);
        crate::io::atomic_write(&path, self.to_yaml()?.as_bytes())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Resolve a profile by name, falling back to `defaults.profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile)> {
        let name = name
            .or(self.defaults.profile.as_deref())
            .ok_or_else(|| EngageError::Configuration("no profile given and no defaults.profile set".into()))?;
        self.profiles
            .get(name)
            .map(|p| (name.to_string(), p))
            .ok_or_else(|| EngageError::ProfileNotFound(name.to_string()))
    }

    /// Resolve a scenario by name, falling back to `defaults.scenario`.
    pub fn scenario(&self, name: Option<&str>) -> Result<(String, &Scenario)> {
        let name = name
            .or(self.defaults.scenario.as_deref())
            .ok_or_else(|| EngageError::Configuration("no scenario given and no defaults.scenario set".into()))?;
        self.scenarios
            .get(name)
            .map(|s| (name.to_string(), s))
            .ok_or_else(|| EngageError::ScenarioNotFound(name.to_string()))
    }

    pub fn pacing_governor(&self) -> Result<PacingGovernor> {
        self.pacing.governor()
    }

    /// Orchestrator settings for `scenario`. `force_dry_run` overrides
    /// `engage.dry_run` when set.
    pub fn engage_settings(&self, scenario: &Scenario, force_dry_run: bool) -> Result<EngageSettings> {
        if scenario.actions.is_empty() {
            return Err(EngageError::Configuration("scenario has no actions".into()));
        }
        if self.engage.video_concurrency == 0 {
            return Err(EngageError::Configuration(
                "engage.video_concurrency must be at least 1".into(),
            ));
        }
        Ok(EngageSettings {
            actions: scenario.actions.clone(),
            filter: scenario.filter(),
            dry_run: force_dry_run || self.engage.dry_run,
            max_action_retries: self.engage.max_action_retries,
            action_retry_delay: Duration::from_millis(self.engage.action_retry_delay_ms),
            max_items_per_video: scenario.max_comments_per_video,
            video_concurrency: self.engage.video_concurrency,
            run_timeout: self.engage.run_timeout_secs.map(Duration::from_secs),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| warnings.push(ConfigWarning { level, message });

        if let Err(e) = self.pacing.governor() {
            push(WarnLevel::Error, e.to_string());
        }
        if self.pacing.max_delay_secs > 0.0 && self.pacing.max_delay_secs < 1.0 {
            push(
                WarnLevel::Warning,
                format!(
                    "pacing.max_delay_secs={} is very aggressive and likely to trip anti-abuse checks",
                    self.pacing.max_delay_secs
                ),
            );
        }

        if self.engage.video_concurrency == 0 {
            push(WarnLevel::Error, "engage.video_concurrency must be at least 1".into());
        }
        if self.engage.max_action_retries > 10 {
            push(
                WarnLevel::Warning,
                format!(
                    "engage.max_action_retries={} (>10 is unusual)",
                    self.engage.max_action_retries
                ),
            );
        }

        for (name, profile) in &self.profiles {
            if profile.channel.trim().is_empty() {
                push(WarnLevel::Error, format!("profile '{name}' has an empty channel"));
            }
        }

        for (name, scenario) in &self.scenarios {
            if scenario.actions.is_empty() {
                push(WarnLevel::Error, format!("scenario '{name}' has no actions"));
            }
            if scenario.recency_window_days == Some(0) {
                push(
                    WarnLevel::Warning,
                    format!("scenario '{name}' has recency_window_days=0; only items posted right now qualify"),
                );
            }
            if scenario.discovery.limit == 0 {
                push(WarnLevel::Warning, format!("scenario '{name}' has discovery.limit=0"));
            }
            if scenario.ignore_keywords.iter().any(|k| k.trim().is_empty()) {
                push(WarnLevel::Warning, format!("scenario '{name}' has an empty ignore keyword"));
            }
        }

        if let Some(p) = &self.defaults.profile {
            if !self.profiles.contains_key(p) {
                push(WarnLevel::Error, format!("defaults.profile '{p}' is not defined"));
            }
        }
        if let Some(s) = &self.defaults.scenario {
            if !self.scenarios.contains_key(s) {
                push(WarnLevel::Error, format!("defaults.scenario '{s}' is not defined"));
            }
        }

        for (field, cmd) in [
            ("list_videos", &self.bridge.list_videos),
            ("discover", &self.bridge.discover),
            ("perform", &self.bridge.perform),
        ] {
            if cmd.trim().is_empty() {
                push(
                    WarnLevel::Warning,
                    format!("bridge.{field} is not set; 'engage' cannot run without it"),
                );
            }
        }

        for problem in self.llm.problems() {
            push(WarnLevel::Error, problem);
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::DiscoveryMethod;
    use tempfile::TempDir;

    fn errors(cfg: &Config) -> Vec<String> {
        cfg.validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn starter_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::starter("https://www.youtube.com/@example");
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(Config::load(dir.path()), Err(EngageError::NotInitialized)));
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "profiles:\n  me:\n    channel: '@me'\nscenarios:\n  s:\n    discovery:\n      method: recent_days\n      limit: 3\n",
        )
        .unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.pacing.min_delay_secs, 2.0);
        assert_eq!(cfg.pacing.max_per_minute, Some(10));
        assert_eq!(cfg.engage.max_action_retries, 2);
        let (_, s) = cfg.scenario(Some("s")).unwrap();
        assert_eq!(s.discovery.method, DiscoveryMethod::RecentDays);
        assert_eq!(s.actions, vec![ActionKind::Heart]);
    }

    #[test]
    fn starter_has_only_bridge_warnings() {
        let cfg = Config::starter("@me");
        let warnings = cfg.validate();
        assert!(errors(&cfg).is_empty(), "{warnings:?}");
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.message.starts_with("bridge.")));
    }

    #[test]
    fn inverted_pacing_is_an_error() {
        let mut cfg = Config::starter("@me");
        cfg.pacing.min_delay_secs = 6.0;
        assert!(matches!(cfg.pacing_governor(), Err(EngageError::Configuration(_))));
        assert_eq!(errors(&cfg).len(), 1);

        cfg.pacing.min_delay_secs = -1.0;
        assert!(matches!(cfg.pacing_governor(), Err(EngageError::Configuration(_))));
    }

    #[test]
    fn dangling_defaults_are_errors() {
        let mut cfg = Config::starter("@me");
        cfg.defaults.scenario = Some("ghost".into());
        let errs = errors(&cfg);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("ghost"));
        assert!(matches!(cfg.scenario(None), Err(EngageError::ScenarioNotFound(_))));
    }

    #[test]
    fn llm_problems_surface_as_errors() {
        let mut cfg = Config::starter("@me");
        cfg.llm.max_retries_per_model = 0;
        assert!(errors(&cfg).iter().any(|e| e.contains("max_retries_per_model")));
    }

    #[test]
    fn profile_falls_back_to_default() {
        let cfg = Config::starter("@me");
        let (name, p) = cfg.profile(None).unwrap();
        assert_eq!(name, "main");
        assert_eq!(p.channel, "@me");
        assert!(matches!(cfg.profile(Some("other")), Err(EngageError::ProfileNotFound(_))));
    }

    #[test]
    fn engage_settings_from_scenario() {
        let mut cfg = Config::starter("@me");
        cfg.engage.run_timeout_secs = Some(600);
        let (_, scenario) = cfg.scenario(None).unwrap();
        let settings = cfg.engage_settings(scenario, true).unwrap();
        assert!(settings.dry_run);
        assert_eq!(settings.max_items_per_video, Some(50));
        assert_eq!(settings.filter.window(), Some(RecencyWindow::days(7)));
        assert_eq!(settings.run_timeout, Some(Duration::from_secs(600)));

        let empty = Scenario {
            actions: vec![],
            ..Scenario::default()
        };
        assert!(cfg.engage_settings(&empty, false).is_err());
    }
}
