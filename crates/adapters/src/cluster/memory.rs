//! In-memory cluster
//!
//! Behaves like the API server for the calls the provisioner makes: names
//! are unique per namespace and kind, updates and deletes of missing objects
//! fail with not found, and created objects get a uid and a creation
//! timestamp. Failures can be injected per operation.

use async_trait::async_trait;
use chrono::Utc;
use cronpilot_ports::{ClusterClient, ClusterError, NamespacePolicy};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClusterOp {
    CreateCronJob,
    GetCronJob,
    UpdateCronJob,
    DeleteCronJob,
    CreateJob,
    GetJob,
    ListJobs,
    ListPods,
    GetServiceAccount,
    CreateServiceAccount,
    UpdateServiceAccount,
    DeleteServiceAccount,
}

type Key = (String, String);

#[derive(Default)]
struct State {
    cron_jobs: BTreeMap<Key, CronJob>,
    jobs: BTreeMap<Key, Job>,
    pods: BTreeMap<Key, Pod>,
    service_accounts: BTreeMap<Key, ServiceAccount>,
    failures: BTreeMap<ClusterOp, ClusterError>,
    writes: usize,
}

pub struct InMemoryCluster {
    name: String,
    namespaces: NamespacePolicy,
    state: Mutex<State>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn meta_name(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

/// Fills in the fields the API server sets on create.
fn stamp(meta: &mut ObjectMeta, namespace: &str) {
    meta.namespace = Some(namespace.to_string());
    if meta.uid.is_none() {
        meta.uid = Some(Uuid::new_v4().to_string());
    }
    if meta.creation_timestamp.is_none() {
        meta.creation_timestamp = Some(Time(Utc::now()));
    }
}

/// Server-owned fields survive a replace.
fn carry_over(meta: &mut ObjectMeta, existing: &ObjectMeta) {
    meta.uid = existing.uid.clone();
    meta.creation_timestamp = existing.creation_timestamp.clone();
    meta.namespace = existing.namespace.clone();
}

/// Equality-based selector: `k=v` pairs separated by commas
pub fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.and_then(|l| l.get(k)).map(String::as_str) == Some(v),
            None => labels.is_some_and(|l| l.contains_key(term)),
        })
}

fn create_in<T: Clone>(
    store: &mut BTreeMap<Key, T>,
    kind: &str,
    namespace: &str,
    mut object: T,
    meta: impl Fn(&mut T) -> &mut ObjectMeta,
) -> Result<T, ClusterError> {
    let name = meta_name(meta(&mut object));
    if name.is_empty() {
        return Err(ClusterError::Transport(format!("{kind} without a name")));
    }
    let k = key(namespace, &name);
    if store.contains_key(&k) {
        return Err(ClusterError::already_exists(kind, &name));
    }
    stamp(meta(&mut object), namespace);
    store.insert(k, object.clone());
    Ok(object)
}

fn replace_in<T: Clone>(
    store: &mut BTreeMap<Key, T>,
    kind: &str,
    namespace: &str,
    mut object: T,
    meta: impl Fn(&mut T) -> &mut ObjectMeta,
) -> Result<T, ClusterError> {
    let name = meta_name(meta(&mut object));
    let k = key(namespace, &name);
    let Some(existing) = store.get_mut(&k) else {
        return Err(ClusterError::not_found(kind, &name));
    };
    let existing_meta = meta(&mut *existing).clone();
    carry_over(meta(&mut object), &existing_meta);
    *existing = object.clone();
    Ok(object)
}

impl InMemoryCluster {
    pub fn new(name: impl Into<String>, namespaces: NamespacePolicy) -> Self {
        Self {
            name: name.into(),
            namespaces,
            state: Mutex::new(State::default()),
        }
    }

    /// The next call of `op` fails with `error`.
    pub fn fail_next(&self, op: ClusterOp, error: ClusterError) {
        self.state.lock().failures.insert(op, error);
    }

    /// Number of successful mutating calls
    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }

    /// Stores an execution as the job controller would, bypassing failure
    /// injection and the write counter.
    pub fn insert_job(&self, namespace: &str, mut job: Job) -> Job {
        stamp(&mut job.metadata, namespace);
        let name = meta_name(&job.metadata);
        self.state.lock().jobs.insert(key(namespace, &name), job.clone());
        job
    }

    pub fn insert_pod(&self, namespace: &str, mut pod: Pod) -> Pod {
        stamp(&mut pod.metadata, namespace);
        let name = meta_name(&pod.metadata);
        self.state.lock().pods.insert(key(namespace, &name), pod.clone());
        pod
    }

    pub fn cron_job(&self, namespace: &str, name: &str) -> Option<CronJob> {
        self.state.lock().cron_jobs.get(&key(namespace, name)).cloned()
    }

    pub fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.state.lock().jobs.get(&key(namespace, name)).cloned()
    }

    pub fn jobs(&self, namespace: &str) -> Vec<Job> {
        self.state
            .lock()
            .jobs
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, job)| job.clone())
            .collect()
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
        self.state
            .lock()
            .service_accounts
            .get(&key(namespace, name))
            .cloned()
    }

    fn injected(&self, state: &mut State, op: ClusterOp) -> Result<(), ClusterError> {
        match state.failures.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    fn name(&self) -> &str {
        &self.name
    }

    fn pool_namespace(&self, pool: &str) -> String {
        self.namespaces.namespace_for(pool)
    }

    async fn create_cron_job(
        &self,
        namespace: &str,
        cron_job: &CronJob,
    ) -> Result<CronJob, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::CreateCronJob)?;
        let created = create_in(
            &mut state.cron_jobs,
            "CronJob",
            namespace,
            cron_job.clone(),
            |c| &mut c.metadata,
        )?;
        state.writes += 1;
        Ok(created)
    }

    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<CronJob, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::GetCronJob)?;
        state
            .cron_jobs
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("CronJob", name))
    }

    async fn update_cron_job(
        &self,
        namespace: &str,
        cron_job: &CronJob,
    ) -> Result<CronJob, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::UpdateCronJob)?;
        let updated = replace_in(
            &mut state.cron_jobs,
            "CronJob",
            namespace,
            cron_job.clone(),
            |c| &mut c.metadata,
        )?;
        state.writes += 1;
        Ok(updated)
    }

    async fn delete_cron_job(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::DeleteCronJob)?;
        state
            .cron_jobs
            .remove(&key(namespace, name))
            .ok_or_else(|| ClusterError::not_found("CronJob", name))?;
        state.writes += 1;
        Ok(())
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::CreateJob)?;
        let created = create_in(&mut state.jobs, "Job", namespace, job.clone(), |j| {
            &mut j.metadata
        })?;
        state.writes += 1;
        Ok(created)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::GetJob)?;
        state
            .jobs
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Job", name))
    }

    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Job>, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::ListJobs)?;
        Ok(state
            .jobs
            .iter()
            .filter(|((ns, _), job)| {
                ns == namespace && matches_selector(job.metadata.labels.as_ref(), label_selector)
            })
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::ListPods)?;
        Ok(state
            .pods
            .iter()
            .filter(|((ns, _), pod)| {
                ns == namespace && matches_selector(pod.metadata.labels.as_ref(), label_selector)
            })
            .map(|(_, pod)| pod.clone())
            .collect())
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceAccount, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::GetServiceAccount)?;
        state
            .service_accounts
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("ServiceAccount", name))
    }

    async fn create_service_account(
        &self,
        namespace: &str,
        service_account: &ServiceAccount,
    ) -> Result<ServiceAccount, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::CreateServiceAccount)?;
        let created = create_in(
            &mut state.service_accounts,
            "ServiceAccount",
            namespace,
            service_account.clone(),
            |s| &mut s.metadata,
        )?;
        state.writes += 1;
        Ok(created)
    }

    async fn update_service_account(
        &self,
        namespace: &str,
        service_account: &ServiceAccount,
    ) -> Result<ServiceAccount, ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::UpdateServiceAccount)?;
        let updated = replace_in(
            &mut state.service_accounts,
            "ServiceAccount",
            namespace,
            service_account.clone(),
            |s| &mut s.metadata,
        )?;
        state.writes += 1;
        Ok(updated)
    }

    async fn delete_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        self.injected(&mut state, ClusterOp::DeleteServiceAccount)?;
        state
            .service_accounts
            .remove(&key(namespace, name))
            .ok_or_else(|| ClusterError::not_found("ServiceAccount", name))?;
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> InMemoryCluster {
        InMemoryCluster::new("test", NamespacePolicy::new("default"))
    }

    fn cron_job(name: &str) -> CronJob {
        CronJob {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_matches_selector() {
        let labels = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        assert!(matches_selector(Some(&labels), "a=1,b=2"));
        assert!(matches_selector(Some(&labels), "b"));
        assert!(matches_selector(Some(&labels), ""));
        assert!(!matches_selector(Some(&labels), "a=2"));
        assert!(!matches_selector(None, "a=1"));
    }

    #[tokio::test]
    async fn test_create_is_unique_and_stamped() {
        let cluster = cluster();
        let created = cluster.create_cron_job("ns", &cron_job("mailer")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
        assert_eq!(created.metadata.namespace.as_deref(), Some("ns"));

        let err = cluster
            .create_cron_job("ns", &cron_job("mailer"))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert!(cluster.create_cron_job("other", &cron_job("mailer")).await.is_ok());
        assert_eq!(cluster.writes(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_server_fields() {
        let cluster = cluster();
        let created = cluster.create_cron_job("ns", &cron_job("mailer")).await.unwrap();

        let mut changed = cron_job("mailer");
        changed.metadata.labels = Some(BTreeMap::from([("x".to_string(), "y".to_string())]));
        let updated = cluster.update_cron_job("ns", &changed).await.unwrap();
        assert_eq!(updated.metadata.uid, created.metadata.uid);
        assert_eq!(
            cluster.cron_job("ns", "mailer").unwrap().metadata.labels,
            changed.metadata.labels
        );

        let err = cluster
            .update_cron_job("ns", &cron_job("ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let cluster = cluster();
        cluster.fail_next(ClusterOp::GetJob, ClusterError::Transport("eof".into()));
        let run = Job {
            metadata: ObjectMeta {
                name: Some("run-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        cluster.insert_job("ns", run);

        assert_eq!(
            cluster.get_job("ns", "run-1").await.unwrap_err(),
            ClusterError::Transport("eof".into())
        );
        assert!(cluster.get_job("ns", "run-1").await.is_ok());
        assert_eq!(cluster.writes(), 0);
    }
}
