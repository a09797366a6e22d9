//! Plan based resource requirements
//!
//! Limits come straight from the job's plan. Requests are the limits divided
//! by the configured overcommit factor, so a factor of 1 reserves the full
//! limit. A zero plan value means unlimited and produces no entry.

use crate::config::ResourceConfig;
use cronpilot_core::Job;
use cronpilot_ports::{ResourceError, ResourceRequirementResolver};
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

pub const MEMORY: &str = "memory";
pub const CPU: &str = "cpu";

#[derive(Debug, Clone, Copy)]
pub struct PlanResourceResolver {
    config: ResourceConfig,
}

impl PlanResourceResolver {
    pub fn new(config: ResourceConfig) -> Self {
        Self { config }
    }

    fn factor(resource: &str, factor: f64) -> Result<f64, ResourceError> {
        if factor.is_nan() || factor < 1.0 {
            return Err(ResourceError::InvalidOvercommit {
                resource: resource.to_string(),
                factor,
            });
        }
        Ok(factor)
    }
}

impl Default for PlanResourceResolver {
    fn default() -> Self {
        Self::new(ResourceConfig::default())
    }
}

fn check_plan_value(job: &Job, resource: &str, value: i64) -> Result<(), ResourceError> {
    if value < 0 {
        return Err(ResourceError::InvalidPlan {
            plan: job.plan.name.clone(),
            reason: format!("negative {resource} limit {value}"),
        });
    }
    Ok(())
}

fn request(limit: i64, factor: f64) -> i64 {
    ((limit as f64) / factor).floor() as i64
}

impl ResourceRequirementResolver for PlanResourceResolver {
    fn resolve(&self, job: &Job) -> Result<ResourceRequirements, ResourceError> {
        let memory_factor = Self::factor(MEMORY, self.config.memory_overcommit)?;
        let cpu_factor = Self::factor(CPU, self.config.cpu_overcommit)?;
        let plan = &job.plan;
        check_plan_value(job, MEMORY, plan.memory)?;
        check_plan_value(job, CPU, plan.cpu_milli)?;

        let mut limits = BTreeMap::new();
        let mut requests = BTreeMap::new();
        if plan.memory > 0 {
            limits.insert(MEMORY.to_string(), Quantity(plan.memory.to_string()));
            requests.insert(
                MEMORY.to_string(),
                Quantity(request(plan.memory, memory_factor).to_string()),
            );
        }
        if plan.cpu_milli > 0 {
            limits.insert(CPU.to_string(), Quantity(format!("{}m", plan.cpu_milli)));
            requests.insert(
                CPU.to_string(),
                Quantity(format!("{}m", request(plan.cpu_milli, cpu_factor))),
            );
        }

        Ok(ResourceRequirements {
            limits: (!limits.is_empty()).then_some(limits),
            requests: (!requests.is_empty()).then_some(requests),
            ..Default::default()
        })
    }
}
