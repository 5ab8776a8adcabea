//! Dashboard aggregation over visitor sessions, page views and leads.
//!
//! Pure rollup over already-fetched rows; the analytics routes do the
//! fetching and period filtering at the SQL level where cheap, then hand the
//! filtered subset here. Ratios over an empty period are 0, never an error.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::intent::IntentLevel;

/// Minimal session facts needed for aggregation.
#[derive(Debug, Clone)]
pub struct SessionFacts {
    pub id: Uuid,
    pub visitor_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub intent_level: IntentLevel,
    pub interaction_events: u32,
}

#[derive(Debug, Clone)]
pub struct PageViewFacts {
    pub session_id: Uuid,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageCount {
    pub path: String,
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyPoint {
    /// Calendar day, UTC.
    pub date: NaiveDate,
    pub sessions: u64,
    pub leads: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TierDistribution {
    pub cold: u64,
    pub warm: u64,
    pub hot: u64,
    pub qualified: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_sessions: u64,
    pub unique_visitors: u64,
    pub avg_duration_seconds: f64,
    pub avg_pages_per_session: f64,
    /// Sessions with exactly one page view and no interaction, over total.
    pub bounce_rate: f64,
    /// Sessions with an associated lead, over total.
    pub conversion_rate: f64,
    pub intent_tiers: TierDistribution,
    pub top_pages: Vec<PageCount>,
    pub daily: Vec<DailyPoint>,
}

const TOP_PAGES_LIMIT: usize = 10;

pub fn aggregate(
    sessions: &[SessionFacts],
    page_views: &[PageViewFacts],
    lead_sessions: &[(Uuid, DateTime<Utc>)],
) -> DashboardStats {
    let total = sessions.len() as u64;

    let unique_visitors = sessions
        .iter()
        .map(|s| s.visitor_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut views_per_session: HashMap<Uuid, u64> = HashMap::new();
    let mut path_counts: HashMap<&str, u64> = HashMap::new();
    for view in page_views {
        *views_per_session.entry(view.session_id).or_default() += 1;
        *path_counts.entry(view.path.as_str()).or_default() += 1;
    }

    let converted: HashSet<Uuid> = lead_sessions.iter().map(|(id, _)| *id).collect();

    let mut total_duration = 0i64;
    let mut total_views = 0u64;
    let mut bounces = 0u64;
    let mut conversions = 0u64;
    let mut tiers = TierDistribution {
        cold: 0,
        warm: 0,
        hot: 0,
        qualified: 0,
    };
    let mut daily_sessions: BTreeMap<NaiveDate, u64> = BTreeMap::new();

    for session in sessions {
        let duration = (session.last_activity_at - session.started_at)
            .num_seconds()
            .max(0);
        total_duration += duration;

        let views = views_per_session.get(&session.id).copied().unwrap_or(0);
        total_views += views;

        if views == 1 && session.interaction_events == 0 {
            bounces += 1;
        }
        if converted.contains(&session.id) {
            conversions += 1;
        }

        match session.intent_level {
            IntentLevel::Cold => tiers.cold += 1,
            IntentLevel::Warm => tiers.warm += 1,
            IntentLevel::Hot => tiers.hot += 1,
            IntentLevel::Qualified => tiers.qualified += 1,
        }

        *daily_sessions.entry(session.started_at.date_naive()).or_default() += 1;
    }

    let mut daily_leads: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for (_, created_at) in lead_sessions {
        *daily_leads.entry(created_at.date_naive()).or_default() += 1;
    }

    let ratio = |num: u64| if total == 0 { 0.0 } else { num as f64 / total as f64 };

    let mut top_pages: Vec<PageCount> = path_counts
        .into_iter()
        .map(|(path, views)| PageCount {
            path: path.to_string(),
            views,
        })
        .collect();
    top_pages.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.path.cmp(&b.path)));
    top_pages.truncate(TOP_PAGES_LIMIT);

    let mut days: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for (date, count) in daily_sessions {
        days.entry(date).or_default().0 = count;
    }
    for (date, count) in daily_leads {
        days.entry(date).or_default().1 = count;
    }
    let daily = days
        .into_iter()
        .map(|(date, (sessions, leads))| DailyPoint {
            date,
            sessions,
            leads,
        })
        .collect();

    DashboardStats {
        total_sessions: total,
        unique_visitors,
        avg_duration_seconds: if total == 0 {
            0.0
        } else {
            total_duration as f64 / total as f64
        },
        avg_pages_per_session: ratio(total_views),
        bounce_rate: ratio(bounces),
        conversion_rate: ratio(conversions),
        intent_tiers: tiers,
        top_pages,
        daily,
    }
}
