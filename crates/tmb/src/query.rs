//! 🔍 The Query Engine — where stored quakes get interrogated politely.
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. RECORDS DEPARTMENT — PERPETUAL FLUORESCENT NOON
//!
//! A caller approaches the counter. "Everything above magnitude 5, off the
//! coast, last Tuesday, newest first, ten per page." The clerk does not
//! blink. The clerk compiles the request into a stack of stamped predicates,
//! walks the archive ONCE, and returns page one with the total count written
//! neatly in the corner.
//!
//! The clerk has never returned a partial answer. The clerk would rather
//! reject the request at the counter — loudly, with a typed error naming
//! exactly what was wrong — than hand back something silently truncated.
//! We love the clerk. Be like the clerk. 🦆
//!
//! ---
//!
//! # Shape of the thing
//! [`EventCriteria`] (everything optional, AND-combined) compiles into a
//! [`QueryPlan`]: a validated conjunction of leaf [`Predicate`]s plus resolved
//! sort and pagination. Adding a filter dimension = adding a leaf variant and
//! its `matches` arm. That's it. That's the extensibility story. No trait
//! objects, no visitor pattern, no 400-line match on a stringly-typed DSL.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::SeismicEvent;

// 🔍 QueryConfig — the house rules of the records department, living next to
// the engine they govern. What's the DEAL with configs that live three
// modules away from the code that reads them? Not here. Not on my watch.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// 📏 Largest page_size a caller may request. Over this → typed rejection,
    /// never a silent truncation. Truncation is lying with extra steps.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// 📄 Page size used when the caller asks for a page but forgot to say
    /// how big. Opinionated, overridable, documented. The trifecta.
    #[serde(default = "default_default_page_size")]
    pub default_page_size: u32,
}

fn default_max_page_size() -> u32 {
    500
}

fn default_default_page_size() -> u32 {
    50
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_page_size: default_default_page_size(),
        }
    }
}

/// 📊 Which field a sort leans on. Three numeric-ish axes, zero relevance
/// scores — this is a records department, not a search startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// ⏰ When the ground moved. The default, because recency is what 95% of
    /// callers mean when they say "show me the earthquakes".
    #[default]
    OccurredAt,
    /// 📊 How hard the ground moved.
    Magnitude,
    /// 📏 How far down the disagreement started.
    DepthKm,
}

/// ↕️ Which way the sorted column runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    /// 📉 Default: biggest/newest/deepest first. Drama leads.
    #[default]
    Descending,
}

/// 📋 What the caller wants. Every field optional; present fields AND
/// together. An empty criteria is a valid question ("everything, please")
/// and gets the full default-ordered listing as its answer.
#[derive(Debug, Clone, Default)]
pub struct EventCriteria {
    /// 📊 Inclusive magnitude floor.
    pub magnitude_min: Option<f64>,
    /// 📊 Inclusive magnitude ceiling.
    pub magnitude_max: Option<f64>,
    /// 🎯 Exact magnitude match, `==` and proud of it. Combines with the
    /// range bounds by AND like everything else; asking for exact 5.5 within
    /// [6, 7] is legal, empty, and arguably a cry for help.
    pub magnitude_exact: Option<f64>,
    /// ⏰ Inclusive lower bound on `occurred_at`.
    pub occurred_after: Option<DateTime<Utc>>,
    /// ⏰ Inclusive upper bound on `occurred_at`.
    pub occurred_before: Option<DateTime<Utc>>,
    /// 📅 Everything on one UTC calendar day.
    pub occurred_on_date: Option<NaiveDate>,
    /// 📝 Case-insensitive substring over the description blurb. Events with
    /// no description never match — can't contain anything if you're `None`.
    pub description_contains: Option<String>,
    pub sort_field: Option<SortField>,
    pub sort_direction: Option<SortDirection>,
    /// 📄 1-based. Page zero is not a page, it's a fencepost error with ambition.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 🚫 Why a query died at the counter. Validation is all-or-nothing and
/// synchronous: a rejected query touches zero events and returns zero
/// partial results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryValidationError {
    #[error("page_size {requested} exceeds the configured maximum of {max}")]
    PageSizeTooLarge { requested: u32, max: u32 },
    #[error("page_size must be at least 1")]
    ZeroPageSize,
    #[error("pages are 1-based; page 0 does not exist")]
    ZeroPage,
    #[error("magnitude range is inverted: min {min} > max {max}")]
    InvertedMagnitudeRange { min: f64, max: f64 },
    #[error("time range is inverted: occurred_after {after} > occurred_before {before}")]
    InvertedTimeRange { after: DateTime<Utc>, before: DateTime<Utc> },
}

/// 🧱 One leaf of the filter conjunction. Each variant knows exactly one
/// trick and performs it in `matches`, which is how a filter pipeline stays
/// debuggable at 3 AM: print the plan, read the leaves, find the liar.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    MagnitudeAtLeast(f64),
    MagnitudeAtMost(f64),
    MagnitudeExactly(f64),
    OccurredAtOrAfter(DateTime<Utc>),
    OccurredAtOrBefore(DateTime<Utc>),
    OccurredOnDate(NaiveDate),
    /// 📝 needle stored pre-lowercased; the haystack lowercases per event.
    DescriptionContains(String),
}

impl Predicate {
    fn matches(&self, event: &SeismicEvent) -> bool {
        match self {
            // 📊 inclusive bounds — ">= means >=" is the whole policy
            Predicate::MagnitudeAtLeast(min) => event.magnitude >= *min,
            Predicate::MagnitudeAtMost(max) => event.magnitude <= *max,
            Predicate::MagnitudeExactly(exact) => event.magnitude == *exact,
            Predicate::OccurredAtOrAfter(after) => event.occurred_at >= *after,
            Predicate::OccurredAtOrBefore(before) => event.occurred_at <= *before,
            Predicate::OccurredOnDate(date) => event.occurred_at.date_naive() == *date,
            Predicate::DescriptionContains(needle) => event
                .description
                .as_deref()
                .is_some_and(|blurb| blurb.to_lowercase().contains(needle)),
        }
    }
}

/// 📜 A validated, ready-to-run query: leaves to filter with, a resolved
/// sort, and pagination with all the defaults already applied. If one of
/// these exists, the criteria it came from was legal. That's the deal.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    predicates: Vec<Predicate>,
    sort_field: SortField,
    sort_direction: SortDirection,
    page: u32,
    /// `None` means "the whole listing on one page" — no page/page_size was
    /// requested, so none is imposed.
    page_size: Option<u32>,
}

impl QueryPlan {
    /// 🏗️ Validate criteria into a plan, or bounce it with a typed error.
    ///
    /// Pagination resolution, for the record: explicit page_size is honored
    /// (after the max check); a page number without a page_size borrows
    /// `default_page_size`; neither present means the full listing.
    pub fn compile(
        criteria: &EventCriteria,
        config: &QueryConfig,
    ) -> Result<Self, QueryValidationError> {
        // 🚫 bounce the illegal before building anything
        if let Some(size) = criteria.page_size {
            if size == 0 {
                return Err(QueryValidationError::ZeroPageSize);
            }
            if size > config.max_page_size {
                return Err(QueryValidationError::PageSizeTooLarge {
                    requested: size,
                    max: config.max_page_size,
                });
            }
        }
        if criteria.page == Some(0) {
            return Err(QueryValidationError::ZeroPage);
        }
        if let (Some(min), Some(max)) = (criteria.magnitude_min, criteria.magnitude_max) {
            if min > max {
                return Err(QueryValidationError::InvertedMagnitudeRange { min, max });
            }
        }
        if let (Some(after), Some(before)) = (criteria.occurred_after, criteria.occurred_before) {
            if after > before {
                return Err(QueryValidationError::InvertedTimeRange { after, before });
            }
        }

        // 🧱 one leaf per present criterion, in declaration order
        let mut predicates = Vec::new();
        if let Some(min) = criteria.magnitude_min {
            predicates.push(Predicate::MagnitudeAtLeast(min));
        }
        if let Some(max) = criteria.magnitude_max {
            predicates.push(Predicate::MagnitudeAtMost(max));
        }
        if let Some(exact) = criteria.magnitude_exact {
            predicates.push(Predicate::MagnitudeExactly(exact));
        }
        if let Some(after) = criteria.occurred_after {
            predicates.push(Predicate::OccurredAtOrAfter(after));
        }
        if let Some(before) = criteria.occurred_before {
            predicates.push(Predicate::OccurredAtOrBefore(before));
        }
        if let Some(date) = criteria.occurred_on_date {
            predicates.push(Predicate::OccurredOnDate(date));
        }
        if let Some(needle) = &criteria.description_contains {
            predicates.push(Predicate::DescriptionContains(needle.to_lowercase()));
        }

        let page_size = match (criteria.page_size, criteria.page) {
            (Some(size), _) => Some(size),
            (None, Some(_)) => Some(config.default_page_size),
            (None, None) => None,
        };

        Ok(Self {
            predicates,
            sort_field: criteria.sort_field.unwrap_or_default(),
            sort_direction: criteria.sort_direction.unwrap_or_default(),
            page: criteria.page.unwrap_or(1),
            page_size,
        })
    }

    /// 🚀 Run the plan over a snapshot of events: one filter pass, one sort,
    /// one slice. `total` is counted after filtering and before slicing, so
    /// it reads the same on every page — pagination math that actually adds up.
    pub fn execute(&self, mut events: Vec<SeismicEvent>) -> EventPage {
        events.retain(|event| self.predicates.iter().all(|leaf| leaf.matches(event)));

        events.sort_by(|a, b| {
            let ordering = match self.sort_field {
                SortField::OccurredAt => a.occurred_at.cmp(&b.occurred_at),
                // 📊 total_cmp: validated magnitudes are never NaN, but the
                // compiler doesn't know that and partial_cmp().unwrap() is
                // how crates end up in incident reports
                SortField::Magnitude => a.magnitude.total_cmp(&b.magnitude),
                SortField::DepthKm => a.depth_km.total_cmp(&b.depth_km),
            };
            let ordering = match self.sort_direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            // 🏷️ the tie-break is ALWAYS external_id ascending, whatever the
            // direction — two magnitude-5.0 quakes must not swap seats
            // between page loads
            ordering.then_with(|| a.external_id.cmp(&b.external_id))
        });

        let total = events.len();
        match self.page_size {
            Some(size) => {
                let skip = (self.page as usize - 1).saturating_mul(size as usize);
                // 📄 a page past the end is empty, not an error — the caller
                // can see `total` and do the arithmetic of disappointment
                let items: Vec<SeismicEvent> =
                    events.into_iter().skip(skip).take(size as usize).collect();
                EventPage { items, page: self.page, page_size: size, total }
            }
            // 📜 the full listing: one page, exactly as long as it needs to be
            None => EventPage { items: events, page: 1, page_size: total as u32, total },
        }
    }
}

/// 📄 One page of query results, with enough metadata that a caller can
/// paginate without guessing: `total` is the filtered count across ALL
/// pages, identical whichever page you ask for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPage {
    pub items: Vec<SeismicEvent>,
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
}

/// 🔍 Compile + execute in one call. The whole engine behind one function,
/// the way the service likes it.
pub fn run_query(
    criteria: &EventCriteria,
    config: &QueryConfig,
    events: Vec<SeismicEvent>,
) -> Result<EventPage, QueryValidationError> {
    Ok(QueryPlan::compile(criteria, config)?.execute(events))
}
