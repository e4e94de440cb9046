//! Billing collector reporting organization consumption per project and category.

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    collector::{Collect, ObservationSink},
    descriptors::{Descriptor, GaugeDescriptor},
    errors::{ErrorCounter, ErrorCounters},
    label_set,
    labels::NoLabels,
    upstream::{Paginated, ScalewayClient, ScrapeContext, UpstreamError},
};

label_set! {
    /// Labels of the consumption gauge.
    pub struct ConsumptionLabels {
        project_id => "project_id",
        project_name => "project_name",
        category => "category",
        operation_path => "operation_path",
        description => "description",
        currency_code => "currency_code",
    }
}

static CONSUMPTIONS: GaugeDescriptor<ConsumptionLabels> =
    GaugeDescriptor::new("scaleway_billing_consumptions", "Consumptions");
static UPDATED_AT: GaugeDescriptor<NoLabels> = GaugeDescriptor::new(
    "scaleway_billing_update_timestamp_seconds",
    "Timestamp of the last update",
);

/// Project of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    /// Project ID.
    pub id: String,
    /// Project name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    total_count: u64,
}

impl Paginated for ProjectList {
    type Item = Project;

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn into_items(self) -> Vec<Project> {
        self.projects
    }
}

/// Monetary amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Money {
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: String,
    /// Whole units.
    #[serde(default)]
    pub units: i64,
    /// Nano units.
    #[serde(default)]
    pub nanos: i64,
}

impl Money {
    /// Converts the amount to a floating-point number of units.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        self.units as f64 + self.nanos as f64 / 1e9
    }
}

/// Consumption of a single operation by a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Consumption {
    /// Project the consumption is billed to.
    #[serde(default)]
    pub project_id: String,
    /// Category, e.g. `Compute`.
    #[serde(default)]
    pub category: String,
    /// Operation path, e.g. `instance/dev1-s`.
    #[serde(default)]
    pub operation_path: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Consumed amount.
    #[serde(default)]
    pub value: Money,
}

/// Consumption report for an organization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsumptionReport {
    /// Consumptions in the report.
    #[serde(default)]
    pub consumptions: Vec<Consumption>,
    /// Time of the last report update.
    pub updated_at: DateTime<Utc>,
}

/// Account and billing API calls used by the collector.
#[async_trait]
pub trait BillingApi: fmt::Debug + Send + Sync + 'static {
    /// Lists all projects of an organization.
    async fn list_projects(
        &self,
        organization_id: &str,
        cx: &ScrapeContext,
    ) -> Result<Vec<Project>, UpstreamError>;

    /// Fetches the consumption report of an organization.
    async fn consumption(
        &self,
        organization_id: &str,
        cx: &ScrapeContext,
    ) -> Result<ConsumptionReport, UpstreamError>;
}

#[async_trait]
impl BillingApi for ScalewayClient {
    async fn list_projects(
        &self,
        organization_id: &str,
        cx: &ScrapeContext,
    ) -> Result<Vec<Project>, UpstreamError> {
        let query = [("organization_id", organization_id.to_owned())];
        self.list_all::<ProjectList>("/account/v2/projects", &query, cx)
            .await
    }

    async fn consumption(
        &self,
        organization_id: &str,
        cx: &ScrapeContext,
    ) -> Result<ConsumptionReport, UpstreamError> {
        let query = [("organization_id", organization_id.to_owned())];
        self.get("/billing/v2alpha1/consumption", &query, cx).await
    }
}

/// Collector of billing consumptions for an organization.
#[derive(Debug)]
pub struct BillingCollector<A = ScalewayClient> {
    api: A,
    organization_id: String,
    errors: ErrorCounter,
}

impl<A: BillingApi> BillingCollector<A> {
    /// Collector name.
    pub const NAME: &'static str = "billing";

    /// Creates a collector for the specified organization.
    pub fn new(api: A, organization_id: impl Into<String>, errors: &ErrorCounters) -> Self {
        let errors = errors.register(Self::NAME);
        tracing::info!(collector = Self::NAME, "Collector enabled");
        Self {
            api,
            organization_id: organization_id.into(),
            errors,
        }
    }
}

#[async_trait]
impl<A: BillingApi> Collect for BillingCollector<A> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> Vec<&'static Descriptor> {
        vec![CONSUMPTIONS.descriptor(), UPDATED_AT.descriptor()]
    }

    async fn collect(&self, sink: &ObservationSink, cx: &ScrapeContext) {
        let projects = match self.api.list_projects(&self.organization_id, cx).await {
            Ok(projects) => projects,
            Err(err) => {
                self.errors.inc();
                tracing::warn!(%err, "Can't fetch the list of projects");
                return;
            }
        };
        if projects.is_empty() {
            self.errors.inc();
            tracing::error!(
                organization_id = %self.organization_id,
                "No projects were found, perhaps you are missing the 'ProjectManager' permission"
            );
            return;
        }
        let project_names: HashMap<_, _> = projects
            .into_iter()
            .map(|project| (project.id, project.name))
            .collect();

        let report = match self.api.consumption(&self.organization_id, cx).await {
            Ok(report) => report,
            Err(err) => {
                self.errors.inc();
                tracing::warn!(
                    %err,
                    "Could not fetch the billing data, perhaps you are missing the 'BillingReadOnly' permission"
                );
                return;
            }
        };

        for consumption in report.consumptions {
            let value = consumption.value.as_f64();
            let project_name = project_names
                .get(&consumption.project_id)
                .cloned()
                .unwrap_or_default();
            let labels = ConsumptionLabels {
                project_id: consumption.project_id,
                project_name,
                category: consumption.category,
                operation_path: consumption.operation_path,
                description: consumption.description,
                currency_code: consumption.value.currency_code,
            };
            sink.emit(CONSUMPTIONS.observe(labels, value));
        }
        #[allow(clippy::cast_precision_loss)]
        let updated_at = report.updated_at.timestamp() as f64;
        sink.emit(UPDATED_AT.observe(NoLabels, updated_at));
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn money_conversion() {
        let money = Money {
            currency_code: "EUR".to_owned(),
            units: 12,
            nanos: 340_000_000,
        };
        assert!((money.as_f64() - 12.34).abs() < 1e-9);
        assert_eq!(Money::default().as_f64(), 0.0);
    }

    #[test]
    fn deserializing_report() {
        let raw = r#"{
            "consumptions": [{
                "description": "DEV1-S instance",
                "project_id": "5c1e",
                "category": "Compute",
                "operation_path": "instance/dev1-s",
                "value": { "currency_code": "EUR", "units": 3, "nanos": 500000000 }
            }],
            "updated_at": "2024-03-01T06:00:00Z"
        }"#;
        let report: ConsumptionReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.consumptions.len(), 1);
        assert_eq!(report.consumptions[0].value.as_f64(), 3.5);
        assert_eq!(report.updated_at.timestamp(), 1_709_272_800);
    }

    #[test]
    fn deserializing_consumption_without_project() {
        let raw = r#"{
            "consumptions": [{
                "category": "Storage",
                "value": { "currency_code": "EUR", "units": 1 }
            }],
            "updated_at": "2024-03-01T06:00:00Z"
        }"#;
        let report: ConsumptionReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.consumptions[0].project_id, "");
        assert_eq!(report.consumptions[0].category, "Storage");
    }
}
