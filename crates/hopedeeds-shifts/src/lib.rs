//! Shift service: turns submitted opportunities into stored parent rows plus
//! their generated instances, and fronts the volunteer and organization
//! registries.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use hopedeeds_core::{
    expand, NewOpportunity, Opportunity, OpportunityDraft, OpportunityFilter, Organization,
    OrganizationRegistration, RecurrenceRuleInput, RecurrenceSpec, Volunteer, VolunteerRegistration,
};
use hopedeeds_storage::{OpportunityStore, OrganizationStore, StoreError, VolunteerStore};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

mod config;

pub use config::ServiceConfig;

pub const CRATE_NAME: &str = "hopedeeds-shifts";

#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("missing required fields: {}", .missing.join(", "))]
    InvalidInput { missing: Vec<&'static str> },
    #[error("recurrence would scan {scan_days} days; the limit is {max_scan_days}")]
    RecurrenceTooLong { scan_days: u64, max_scan_days: u64 },
    #[error("{what} not found")]
    NotFound { what: &'static str },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Source of "today" for horizon-bounded recurrence.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShiftSettings {
    /// Instance inserts in flight at once; 1 means strictly one after another.
    pub insert_concurrency: usize,
    pub max_scan_days: u64,
    pub default_organization_id: i64,
}

impl Default for ShiftSettings {
    fn default() -> Self {
        ServiceConfig::default().settings()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedInstance {
    pub start_date: NaiveDate,
    pub error: String,
}

/// Outcome of a create request. Nothing is rolled back: `instances` holds the
/// rows that were stored, `failed` the dates whose insert did not go through.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOpportunity {
    pub parent: Opportunity,
    pub instances: Vec<Opportunity>,
    pub failed: Vec<FailedInstance>,
}

impl CreatedOpportunity {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityDetail {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub instances: Vec<Opportunity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub volunteers: Vec<Volunteer>,
    pub opportunities: Vec<Opportunity>,
}

#[derive(Clone)]
pub struct ShiftService {
    opportunities: Arc<dyn OpportunityStore>,
    volunteers: Arc<dyn VolunteerStore>,
    organizations: Arc<dyn OrganizationStore>,
    clock: Arc<dyn Clock>,
    settings: ShiftSettings,
}

impl ShiftService {
    pub fn new(
        opportunities: Arc<dyn OpportunityStore>,
        volunteers: Arc<dyn VolunteerStore>,
        organizations: Arc<dyn OrganizationStore>,
        settings: ShiftSettings,
    ) -> Self {
        Self {
            opportunities,
            volunteers,
            organizations,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stores the parent, then each generated instance. An unrecognized rule
    /// type stores a one-off opportunity.
    pub async fn create_opportunity_with_recurrence(
        &self,
        draft: OpportunityDraft,
        rule: Option<RecurrenceRuleInput>,
    ) -> Result<CreatedOpportunity, ShiftError> {
        let spec = rule.and_then(|input| {
            let kind = input.kind.clone();
            let spec = input.into_spec();
            if spec.is_none() {
                warn!(rule_type = %kind, "unsupported recurrence rule; creating a one-off opportunity");
            }
            spec
        });
        self.create_with_spec(draft, spec).await
    }

    pub async fn create_with_spec(
        &self,
        draft: OpportunityDraft,
        spec: Option<RecurrenceSpec>,
    ) -> Result<CreatedOpportunity, ShiftError> {
        let missing = draft.missing_fields();
        if !missing.is_empty() {
            return Err(ShiftError::InvalidInput { missing });
        }

        let today = self.clock.today();
        if let (Some(spec), Some(anchor)) = (&spec, draft.start_date) {
            let scan_days = spec.scan_days(anchor, today);
            if scan_days > self.settings.max_scan_days {
                return Err(ShiftError::RecurrenceTooLong {
                    scan_days,
                    max_scan_days: self.settings.max_scan_days,
                });
            }
        }

        let parent_row = draft
            .into_parent_row(self.settings.default_organization_id, spec.clone())
            .map_err(|missing| ShiftError::InvalidInput { missing })?;
        let parent = self.opportunities.insert_opportunity(parent_row).await?;

        let Some(spec) = spec else {
            info!(id = %parent.id, "created one-off opportunity");
            return Ok(CreatedOpportunity {
                parent,
                instances: Vec::new(),
                failed: Vec::new(),
            });
        };

        let rows = expand(&parent, &spec, today);
        let span = info_span!(
            "insert_instances",
            parent_id = %parent.id,
            rule = spec.rule.kind(),
            planned = rows.len()
        );
        let (instances, failed) = self.insert_instances(rows).instrument(span).await;

        if failed.is_empty() {
            info!(id = %parent.id, instances = instances.len(), "created recurring opportunity");
        } else {
            warn!(
                id = %parent.id,
                instances = instances.len(),
                failed = failed.len(),
                "recurring opportunity partially created"
            );
        }

        Ok(CreatedOpportunity {
            parent,
            instances,
            failed,
        })
    }

    /// Inserts rows in date order; results come back in the same order whether
    /// dispatch is sequential or concurrent.
    async fn insert_instances(
        &self,
        rows: Vec<NewOpportunity>,
    ) -> (Vec<Opportunity>, Vec<FailedInstance>) {
        let outcomes: Vec<(NaiveDate, Result<Opportunity, StoreError>)> =
            if self.settings.insert_concurrency <= 1 {
                let mut outcomes = Vec::with_capacity(rows.len());
                for row in rows {
                    let date = row.start_date;
                    outcomes.push((date, self.opportunities.insert_opportunity(row).await));
                }
                outcomes
            } else {
                stream::iter(rows)
                    .map(|row| async move {
                        let date = row.start_date;
                        (date, self.opportunities.insert_opportunity(row).await)
                    })
                    .buffered(self.settings.insert_concurrency)
                    .collect()
                    .await
            };

        let mut instances = Vec::new();
        let mut failed = Vec::new();
        for (start_date, outcome) in outcomes {
            match outcome {
                Ok(instance) => instances.push(instance),
                Err(err) => {
                    warn!(%start_date, error = %err, "instance insert failed");
                    failed.push(FailedInstance {
                        start_date,
                        error: err.to_string(),
                    });
                }
            }
        }
        (instances, failed)
    }

    pub async fn list(&self, filter: &OpportunityFilter) -> Result<Vec<Opportunity>, ShiftError> {
        Ok(self.opportunities.list_active_opportunities(filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<OpportunityDetail, ShiftError> {
        let opportunity = self
            .opportunities
            .get_opportunity(id)
            .await?
            .ok_or(ShiftError::NotFound { what: "opportunity" })?;
        let instances = if opportunity.is_instance() {
            Vec::new()
        } else {
            self.opportunities.list_instances(id).await?
        };
        Ok(OpportunityDetail {
            opportunity,
            instances,
        })
    }

    /// Retires one row. Instances of a retired parent stay listed.
    pub async fn retire(&self, id: Uuid) -> Result<(), ShiftError> {
        if self.opportunities.retire_opportunity(id).await? {
            info!(%id, "retired opportunity");
            Ok(())
        } else {
            Err(ShiftError::NotFound { what: "opportunity" })
        }
    }

    pub async fn register_volunteer(
        &self,
        registration: VolunteerRegistration,
    ) -> Result<Volunteer, ShiftError> {
        let new = registration
            .into_new_volunteer()
            .map_err(|missing| ShiftError::InvalidInput { missing })?;
        match self.volunteers.save_volunteer(new).await {
            Ok(volunteer) => {
                info!(id = %volunteer.id, "registered volunteer");
                Ok(volunteer)
            }
            Err(StoreError::Duplicate { .. }) => Err(ShiftError::Conflict(
                "This email address is already registered. Please log in.".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn volunteer_by_email(&self, email: &str) -> Result<Volunteer, ShiftError> {
        self.volunteers
            .volunteer_by_email(email)
            .await?
            .ok_or(ShiftError::NotFound { what: "volunteer" })
    }

    pub async fn register_organization(
        &self,
        registration: OrganizationRegistration,
    ) -> Result<Organization, ShiftError> {
        let new = registration
            .into_new_organization()
            .map_err(|missing| ShiftError::InvalidInput { missing })?;
        match self.organizations.save_organization(new).await {
            Ok(organization) => {
                info!(id = organization.id, "registered organization");
                Ok(organization)
            }
            Err(StoreError::Duplicate { .. }) => Err(ShiftError::Conflict(
                "An organization with this email address already exists.".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn organization_by_email(&self, email: &str) -> Result<Organization, ShiftError> {
        self.organizations
            .organization_by_email(email)
            .await?
            .ok_or(ShiftError::NotFound { what: "organization" })
    }

    pub async fn admin_overview(&self) -> Result<AdminOverview, ShiftError> {
        let volunteers = self.volunteers.list_volunteers().await?;
        let opportunities = self
            .opportunities
            .list_active_opportunities(&OpportunityFilter::default())
            .await?;
        Ok(AdminOverview {
            volunteers,
            opportunities,
        })
    }
}
