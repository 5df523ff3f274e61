//! Recurring-shift expansion.
//!
//! A parent opportunity plus a [`RecurrenceSpec`] produces the dated child rows
//! stored alongside it. The parent row already stands for the anchor date, so
//! the anchor itself is never emitted.
//!
//! Count-bounded rules scan `count` calendar days starting at the anchor, one
//! day per step, and a weekly rule only emits on the scanned days whose weekday
//! it lists. `count` therefore bounds the days scanned, not the instances
//! produced: `{weekly, [mon], count: 8}` anchored on a Monday yields a single
//! instance a week later.
//!
//! Horizon-bounded rules scan from the day after the anchor through
//! `today + months` inclusive. Weekly rules emit on their listed weekdays
//! there too, while daily and monthly rules emit on every scanned day.
//!
//! Monthly rules step by calendar days exactly like daily rules.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{NewOpportunity, Opportunity};

/// Months scanned by a horizon-bounded rule that does not say otherwise.
pub const DEFAULT_HORIZON_MONTHS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    Daily,
    Weekly { days: Vec<Weekday> },
    Monthly,
}

impl RecurrenceRule {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly { .. } => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Whether a scanned (non-anchor) day produces an instance.
    pub fn emits_on(&self, date: NaiveDate) -> bool {
        match self {
            Self::Weekly { days } => days.contains(&date.weekday()),
            Self::Daily | Self::Monthly => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionBound {
    /// Total occurrences including the parent; scans this many days from the anchor.
    Count(u32),
    /// Scans through `today + months`.
    Horizon { months: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecurrenceRuleInput", try_from = "RecurrenceRuleInput")]
pub struct RecurrenceSpec {
    pub rule: RecurrenceRule,
    pub bound: ExpansionBound,
}

impl RecurrenceSpec {
    pub fn counted(rule: RecurrenceRule, count: u32) -> Self {
        Self {
            rule,
            bound: ExpansionBound::Count(count),
        }
    }

    pub fn until_horizon(rule: RecurrenceRule, months: u32) -> Self {
        Self {
            rule,
            bound: ExpansionBound::Horizon { months },
        }
    }

    /// Number of calendar days expansion walks past the anchor.
    pub fn scan_days(&self, anchor: NaiveDate, today: NaiveDate) -> u64 {
        match self.bound {
            ExpansionBound::Count(count) => u64::from(count.saturating_sub(1)),
            ExpansionBound::Horizon { months } => today
                .checked_add_months(Months::new(months))
                .map(|horizon| (horizon - anchor).num_days().max(0) as u64)
                .unwrap_or(0),
        }
    }
}

/// Untyped rule shape as it arrives in request bodies and sits in the store.
///
/// Decoding never fails on a field's shape: a value of the wrong type reads as
/// absent, so a malformed rule degrades to "no recurrence" in
/// [`RecurrenceRuleInput::into_spec`] instead of rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRuleInput {
    #[serde(rename = "type", default, deserialize_with = "loose_kind")]
    pub kind: String,
    #[serde(default, deserialize_with = "loose_days", skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<String>>,
    /// Negative counts clamp to zero.
    #[serde(default, deserialize_with = "loose_u32", skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(
        default,
        alias = "boundBy",
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub bound_by: Option<String>,
    #[serde(
        default,
        alias = "horizonMonths",
        deserialize_with = "loose_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub horizon_months: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<LooseValue>),
    Other(IgnoredAny),
}

impl LooseValue {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn loose_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match LooseValue::deserialize(deserializer)? {
        LooseValue::Int(n) => Some(clamp_u32(n)),
        // `as` saturates and maps NaN to zero.
        LooseValue::Float(f) => Some(f.max(0.0) as u32),
        LooseValue::Text(text) => text.trim().parse::<i64>().ok().map(clamp_u32),
        LooseValue::List(_) | LooseValue::Other(_) => None,
    })
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(LooseValue::deserialize(deserializer)?.into_text())
}

fn loose_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(loose_string(deserializer)?.unwrap_or_default())
}

/// A list of names, or one comma-separated string.
fn loose_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match LooseValue::deserialize(deserializer)? {
        LooseValue::List(items) => Some(items.into_iter().filter_map(LooseValue::into_text).collect()),
        LooseValue::Text(text) => Some(text.split(',').map(str::to_string).collect()),
        _ => None,
    })
}

impl RecurrenceRuleInput {
    /// Typed form of the rule, or `None` when the rule names an unknown type or
    /// bound. Unknown day names are dropped.
    pub fn into_spec(self) -> Option<RecurrenceSpec> {
        let rule = match self.kind.trim().to_ascii_lowercase().as_str() {
            "daily" => RecurrenceRule::Daily,
            "monthly" => RecurrenceRule::Monthly,
            "weekly" => {
                let mut days = Vec::new();
                for day in self.days.unwrap_or_default() {
                    if let Some(weekday) = parse_weekday(&day) {
                        if !days.contains(&weekday) {
                            days.push(weekday);
                        }
                    }
                }
                RecurrenceRule::Weekly { days }
            }
            _ => return None,
        };

        let bound = match self.bound_by.as_deref().map(str::trim) {
            None | Some("count") => ExpansionBound::Count(self.count.unwrap_or(1)),
            Some("horizon") => ExpansionBound::Horizon {
                months: self.horizon_months.unwrap_or(DEFAULT_HORIZON_MONTHS),
            },
            Some(_) => return None,
        };

        Some(RecurrenceSpec { rule, bound })
    }
}

impl From<RecurrenceSpec> for RecurrenceRuleInput {
    fn from(spec: RecurrenceSpec) -> Self {
        let days = match &spec.rule {
            RecurrenceRule::Weekly { days } => Some(
                days.iter()
                    .map(|d| weekday_abbrev(*d).to_string())
                    .collect(),
            ),
            RecurrenceRule::Daily | RecurrenceRule::Monthly => None,
        };
        let (count, bound_by, horizon_months) = match spec.bound {
            ExpansionBound::Count(count) => (Some(count), None, None),
            ExpansionBound::Horizon { months } => (None, Some("horizon".to_string()), Some(months)),
        };
        Self {
            kind: spec.rule.kind().to_string(),
            days,
            count,
            bound_by,
            horizon_months,
        }
    }
}

impl TryFrom<RecurrenceRuleInput> for RecurrenceSpec {
    type Error = String;

    fn try_from(input: RecurrenceRuleInput) -> Result<Self, Self::Error> {
        let kind = input.kind.clone();
        input
            .into_spec()
            .ok_or_else(|| format!("unsupported recurrence rule type {kind:?}"))
    }
}

/// `sun`..`sat`, case-insensitive.
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sun" => Some(Weekday::Sun),
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn weekday_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sun",
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
    }
}

/// Dates of the generated instances for a rule anchored at `anchor`, in order.
/// `today` is only consulted by horizon-bounded rules.
pub fn occurrence_dates(anchor: NaiveDate, spec: &RecurrenceSpec, today: NaiveDate) -> Vec<NaiveDate> {
    match spec.bound {
        ExpansionBound::Count(count) => {
            let mut dates = Vec::new();
            let mut cursor = anchor;
            let mut instances_created = 0u32;
            while instances_created < count {
                if instances_created > 0 && spec.rule.emits_on(cursor) {
                    dates.push(cursor);
                }
                let Some(next) = cursor.succ_opt() else {
                    break;
                };
                cursor = next;
                instances_created += 1;
            }
            dates
        }
        ExpansionBound::Horizon { months } => {
            let Some(horizon) = today.checked_add_months(Months::new(months)) else {
                return Vec::new();
            };
            anchor
                .iter_days()
                .skip(1)
                .take_while(|date| *date <= horizon)
                .filter(|date| spec.rule.emits_on(*date))
                .collect()
        }
    }
}

/// Child rows for `parent` under `spec`. Pure: identical inputs give identical output.
pub fn expand(parent: &Opportunity, spec: &RecurrenceSpec, today: NaiveDate) -> Vec<NewOpportunity> {
    occurrence_dates(parent.start_date, spec, today)
        .into_iter()
        .map(|date| parent.instance_on(date))
        .collect()
}
