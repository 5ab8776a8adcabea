//! Visitor intent scoring.
//!
//! Weighted additive model over six behavioral components. Each component is
//! independently capped, then the sum is clamped to [0, 100]. Weights and
//! thresholds are configuration data (`settings` key `intent.scoring`), not
//! hard-coded constants, so they can be tuned without redeploying.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::errors::AppError;

pub const SCORING_SETTINGS_KEY: &str = "intent.scoring";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points per page view up to `page_view_full_rate`, half points after.
    pub page_view_points: u32,
    pub page_view_full_rate: u32,
    pub page_views_cap: u32,

    /// Points per minute on site up to `minutes_full_rate`, half after.
    pub minute_points: u32,
    pub minutes_full_rate: u32,
    pub time_on_site_cap: u32,

    /// Engagement: scroll-depth share of `scroll_max_points`, plus
    /// `event_points` per interaction event.
    pub scroll_max_points: u32,
    pub event_points: u32,
    pub engagement_cap: u32,

    pub started_form_bonus: u32,
    pub completed_form_bonus: u32,
    pub form_cap: u32,

    /// Per-milestone bonus among the six conversion-signal flags.
    pub signal_points: u32,
    pub signals_cap: u32,

    pub returning_bonus: u32,

    /// Tier cut points; a boundary value belongs to the higher tier.
    pub warm_threshold: u32,
    pub hot_threshold: u32,
    pub qualified_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            page_view_points: 4,
            page_view_full_rate: 4,
            page_views_cap: 20,

            minute_points: 3,
            minutes_full_rate: 4,
            time_on_site_cap: 15,

            scroll_max_points: 7,
            event_points: 2,
            engagement_cap: 15,

            started_form_bonus: 10,
            completed_form_bonus: 15,
            form_cap: 25,

            signal_points: 3,
            signals_cap: 15,

            returning_bonus: 10,

            warm_threshold: 25,
            hot_threshold: 50,
            qualified_threshold: 75,
        }
    }
}

impl ScoringConfig {
    /// Current config from the settings table, falling back to defaults when
    /// the key is absent or unparseable.
    pub async fn load(pool: &SqlitePool) -> Result<Self, AppError> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(SCORING_SETTINGS_KEY)
            .fetch_optional(pool)
            .await?;

        Ok(raw
            .and_then(|value| serde_json::from_str(&value).ok())
            .unwrap_or_default())
    }
}

/// Behavioral signals for one session, as fed to the scorer.
#[derive(Debug, Clone, Default)]
pub struct SessionSignals {
    pub page_views: u32,
    pub total_seconds: u32,
    /// Average scroll depth across page views, 0..=100.
    pub avg_scroll_depth: u32,
    pub interaction_events: u32,
    pub started_form: bool,
    pub completed_form: bool,
    pub visited_pricing: bool,
    pub visited_services: bool,
    pub visited_portfolio: bool,
    pub visited_contact: bool,
    pub clicked_cta: bool,
    pub watched_video: bool,
    pub is_returning: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IntentLevel {
    Cold,
    Warm,
    Hot,
    Qualified,
}

impl IntentLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLevel::Cold => "cold",
            IntentLevel::Warm => "warm",
            IntentLevel::Hot => "hot",
            IntentLevel::Qualified => "qualified",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "warm" => IntentLevel::Warm,
            "hot" => IntentLevel::Hot,
            "qualified" => IntentLevel::Qualified,
            _ => IntentLevel::Cold,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentScores {
    pub page_views: u32,
    pub time_on_site: u32,
    pub engagement: u32,
    pub form_interaction: u32,
    pub conversion_signals: u32,
    pub returning_visitor: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntentScore {
    pub total: u32,
    pub level: IntentLevel,
    pub components: ComponentScores,
}

/// Monotonic count-based contribution with diminishing returns: full points
/// per unit up to `full_rate`, half points after, capped.
fn diminishing(count: u32, per_unit: u32, full_rate: u32, cap: u32) -> u32 {
    let full = count.min(full_rate) * per_unit;
    let extra = count.saturating_sub(full_rate) * per_unit / 2;
    (full + extra).min(cap)
}

pub fn score(signals: &SessionSignals, config: &ScoringConfig) -> IntentScore {
    let page_views = diminishing(
        signals.page_views,
        config.page_view_points,
        config.page_view_full_rate,
        config.page_views_cap,
    );

    let time_on_site = diminishing(
        signals.total_seconds / 60,
        config.minute_points,
        config.minutes_full_rate,
        config.time_on_site_cap,
    );

    let scroll = config.scroll_max_points * signals.avg_scroll_depth.min(100) / 100;
    let engagement =
        (scroll + signals.interaction_events * config.event_points).min(config.engagement_cap);

    // Completed implies the started bonus as well, whether or not the
    // started flag was ever set.
    let mut form = 0;
    if signals.started_form || signals.completed_form {
        form += config.started_form_bonus;
    }
    if signals.completed_form {
        form += config.completed_form_bonus;
    }
    let form_interaction = form.min(config.form_cap);

    let flags = [
        signals.visited_pricing,
        signals.visited_services,
        signals.visited_portfolio,
        signals.visited_contact,
        signals.clicked_cta,
        signals.watched_video,
    ];
    let conversion_signals =
        (flags.iter().filter(|flag| **flag).count() as u32 * config.signal_points)
            .min(config.signals_cap);

    let returning_visitor = if signals.is_returning {
        config.returning_bonus
    } else {
        0
    };

    let total = (page_views
        + time_on_site
        + engagement
        + form_interaction
        + conversion_signals
        + returning_visitor)
        .min(100);

    let level = if total >= config.qualified_threshold {
        IntentLevel::Qualified
    } else if total >= config.hot_threshold {
        IntentLevel::Hot
    } else if total >= config.warm_threshold {
        IntentLevel::Warm
    } else {
        IntentLevel::Cold
    };

    IntentScore {
        total,
        level,
        components: ComponentScores {
            page_views,
            time_on_site,
            engagement,
            form_interaction,
            conversion_signals,
            returning_visitor,
        },
    }
}
