//! Core domain model for HopeDeeds: opportunities (shifts), volunteers,
//! organizations, and recurrence expansion.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub mod recurrence;

pub use recurrence::{
    expand, occurrence_dates, ExpansionBound, RecurrenceRule, RecurrenceRuleInput, RecurrenceSpec,
};

pub const CRATE_NAME: &str = "hopedeeds-core";

/// Capacity stored when a draft does not name one.
pub const DEFAULT_MAX_CAPACITY: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Active,
    Retired,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Retired => "retired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }
}

/// Shift length: numeric hours, or whatever free text the organization typed ("1h").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShiftDuration {
    Hours(f64),
    Text(String),
}

impl ShiftDuration {
    pub fn hours(&self) -> Option<f64> {
        match self {
            Self::Hours(h) => Some(*h),
            Self::Text(text) => text.trim().trim_end_matches(['h', 'H']).trim().parse().ok(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Hours(h) => h.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    /// Reads a stored text column back, preferring the numeric form when it parses.
    pub fn from_text(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(h) => Self::Hours(h),
            Err(_) => Self::Text(text.to_string()),
        }
    }
}

/// Client-submitted opportunity, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityDraft {
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// A blank string (an empty date input) reads as absent.
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "start_time")]
    pub time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: Option<ShiftDuration>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub max_capacity: Option<i32>,
    #[serde(default)]
    pub special_type: Option<String>,
}

impl OpportunityDraft {
    /// Names of the required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.title.as_deref()) {
            missing.push("title");
        }
        if self.start_date.is_none() {
            missing.push("start_date");
        }
        if is_blank(self.time.as_deref()) {
            missing.push("time");
        }
        missing
    }

    /// Turns the draft into the parent row to insert. Errors with the missing field names.
    pub fn into_parent_row(
        self,
        default_organization_id: i64,
        recurrence: Option<RecurrenceSpec>,
    ) -> Result<NewOpportunity, Vec<&'static str>> {
        let missing = self.missing_fields();
        let (Some(title), Some(start_date), Some(time)) = (self.title, self.start_date, self.time)
        else {
            return Err(missing);
        };
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(NewOpportunity {
            organization_id: self.organization_id.unwrap_or(default_organization_id),
            title: title.trim().to_string(),
            description: self.description.unwrap_or_default(),
            start_date,
            time: time.trim().to_string(),
            end_time: non_blank(self.end_time),
            duration: self.duration,
            area: non_blank(self.area),
            max_capacity: self.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY),
            special_type: non_blank(self.special_type),
            recurrence_rule: recurrence,
            parent_id: None,
            status: OpportunityStatus::Active,
        })
    }
}

/// A row handed to the persistence layer; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOpportunity {
    pub organization_id: i64,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub time: String,
    pub end_time: Option<String>,
    pub duration: Option<ShiftDuration>,
    pub area: Option<String>,
    pub max_capacity: i32,
    pub special_type: Option<String>,
    pub recurrence_rule: Option<RecurrenceSpec>,
    pub parent_id: Option<Uuid>,
    pub status: OpportunityStatus,
}

/// Persisted opportunity: a parent shift or one generated instance of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub organization_id: i64,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub time: String,
    pub end_time: Option<String>,
    pub duration: Option<ShiftDuration>,
    pub area: Option<String>,
    pub max_capacity: i32,
    pub special_type: Option<String>,
    pub recurrence_rule: Option<RecurrenceSpec>,
    pub parent_id: Option<Uuid>,
    pub status: OpportunityStatus,
    pub created_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, row: NewOpportunity) -> Self {
        Self {
            id,
            organization_id: row.organization_id,
            title: row.title,
            description: row.description,
            start_date: row.start_date,
            time: row.time,
            end_time: row.end_time,
            duration: row.duration,
            area: row.area,
            max_capacity: row.max_capacity,
            special_type: row.special_type,
            recurrence_rule: row.recurrence_rule,
            parent_id: row.parent_id,
            status: row.status,
            created_at,
        }
    }

    pub fn is_instance(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Child row for `date`, carrying this opportunity's shift details.
    pub fn instance_on(&self, date: NaiveDate) -> NewOpportunity {
        NewOpportunity {
            organization_id: self.organization_id,
            title: self.title.clone(),
            description: self.description.clone(),
            start_date: date,
            time: self.time.clone(),
            end_time: self.end_time.clone(),
            duration: self.duration.clone(),
            area: self.area.clone(),
            max_capacity: self.max_capacity,
            special_type: self.special_type.clone(),
            recurrence_rule: None,
            parent_id: Some(self.id),
            status: OpportunityStatus::Active,
        }
    }
}

/// Filters accepted by the opportunity listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityFilter {
    pub date: Option<NaiveDate>,
    pub organization_id: Option<i64>,
    pub area: Option<String>,
    pub frequency: Option<String>,
}

impl OpportunityFilter {
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        if let Some(date) = self.date {
            if opportunity.start_date != date {
                return false;
            }
        }
        if let Some(org) = self.organization_id {
            if opportunity.organization_id != org {
                return false;
            }
        }
        if let Some(area) = &self.area {
            if !opportunity
                .area
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(area))
            {
                return false;
            }
        }
        if let Some(frequency) = &self.frequency {
            let kind = opportunity.recurrence_rule.as_ref().map(|r| r.rule.kind());
            if kind != Some(frequency.to_ascii_lowercase().as_str()) {
                return false;
            }
        }
        true
    }
}

/// Registration form as posted by the volunteer sign-up page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolunteerRegistration {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub waiver_agreed: Option<String>,
}

impl VolunteerRegistration {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("birthdate", &self.birthdate),
            ("waiver_agreed", &self.waiver_agreed),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value.as_deref()))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn into_new_volunteer(self) -> Result<NewVolunteer, Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }
        let waiver_agreed = matches!(
            self.waiver_agreed.as_deref().map(str::trim),
            Some("true" | "on")
        );
        Ok(NewVolunteer {
            full_name: self.full_name.unwrap_or_default().trim().to_string(),
            email: self.email.unwrap_or_default().trim().to_string(),
            phone: self.phone.unwrap_or_default().trim().to_string(),
            birthdate: self.birthdate.unwrap_or_default().trim().to_string(),
            zipcode: non_blank(self.zipcode),
            emergency_contact: non_blank(self.emergency_contact),
            waiver_agreed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVolunteer {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birthdate: String,
    pub zipcode: Option<String>,
    pub emergency_contact: Option<String>,
    pub waiver_agreed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volunteer {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birthdate: String,
    pub zipcode: Option<String>,
    pub emergency_contact: Option<String>,
    pub waiver_agreed: bool,
    pub waiver_agreed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Volunteer {
    /// Waiver timestamp and creation time are both the submission time.
    pub fn from_new(id: Uuid, submitted_at: DateTime<Utc>, new: NewVolunteer) -> Self {
        Self {
            id,
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            birthdate: new.birthdate,
            zipcode: new.zipcode,
            emergency_contact: new.emergency_contact,
            waiver_agreed: new.waiver_agreed,
            waiver_agreed_at: submitted_at,
            created_at: submitted_at,
        }
    }
}

/// Registration form for a hosting organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRegistration {
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl OrganizationRegistration {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [("org_name", &self.org_name), ("email", &self.email)]
            .into_iter()
            .filter(|(_, value)| is_blank(value.as_deref()))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn into_new_organization(self) -> Result<NewOrganization, Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(NewOrganization {
            org_name: self.org_name.unwrap_or_default().trim().to_string(),
            email: self.email.unwrap_or_default().trim().to_string(),
            phone: non_blank(self.phone),
            address: non_blank(self.address),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub org_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A hosting organization. `id` is what opportunities carry as
/// `organization_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub org_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Organization {
    pub fn from_new(id: i64, new: NewOrganization) -> Self {
        Self {
            id,
            org_name: new.org_name,
            email: new.email,
            phone: new.phone,
            address: new.address,
        }
    }
}

fn blank_date_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).unwrap_or_default().is_empty()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
