// src/remote/mock.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{DeliveryApi, EnvelopeRequest, RemoteCampaign, RemoteList};
use crate::config::Credentials;
use crate::error::DispatchError;

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    CreateEnvelope(EnvelopeRequest),
    TriggerEnvelope(String),
    Lists,
    CreateList(String),
    Campaigns,
    CreateCampaign(String),
    Subscribe { list_id: String, email: String },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<RemoteCall>,
    envelope_results: VecDeque<Result<Option<String>, DispatchError>>,
    trigger_results: VecDeque<Result<(), DispatchError>>,
    subscribe_results: VecDeque<Result<(), DispatchError>>,
    lists: Vec<RemoteList>,
    campaigns: Vec<RemoteCampaign>,
    fail_all: Option<DispatchError>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        (100 + self.next_id).to_string()
    }
}

/// Records every call and answers from scripted queues; unscripted calls
/// succeed with generated ids. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockDeliveryApi {
    state: Arc<Mutex<MockState>>,
}

impl MockDeliveryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_envelope_result(&self, r: Result<Option<String>, DispatchError>) -> &Self {
        self.state.lock().envelope_results.push_back(r);
        self
    }

    pub fn push_trigger_result(&self, r: Result<(), DispatchError>) -> &Self {
        self.state.lock().trigger_results.push_back(r);
        self
    }

    pub fn push_subscribe_result(&self, r: Result<(), DispatchError>) -> &Self {
        self.state.lock().subscribe_results.push_back(r);
        self
    }

    pub fn with_lists(self, lists: Vec<RemoteList>) -> Self {
        self.state.lock().lists = lists;
        self
    }

    pub fn with_campaigns(self, campaigns: Vec<RemoteCampaign>) -> Self {
        self.state.lock().campaigns = campaigns;
        self
    }

    /// Every later call fails with `err`.
    pub fn fail_with(&self, err: DispatchError) {
        self.state.lock().fail_all = Some(err);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn envelope_requests(&self) -> Vec<EnvelopeRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RemoteCall::CreateEnvelope(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn envelope_count(&self) -> usize {
        self.envelope_requests().len()
    }

    pub fn trigger_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RemoteCall::TriggerEnvelope(_)))
            .count()
    }

    fn record(&self, call: RemoteCall) -> Result<(), DispatchError> {
        let mut s = self.state.lock();
        s.calls.push(call);
        match &s.fail_all {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeliveryApi for MockDeliveryApi {
    async fn create_envelope(
        &self,
        _creds: &Credentials,
        request: &EnvelopeRequest,
    ) -> Result<Option<String>, DispatchError> {
        self.record(RemoteCall::CreateEnvelope(request.clone()))?;
        let mut s = self.state.lock();
        let scripted = s.envelope_results.pop_front();
        match scripted {
            Some(r) => r,
            None => Ok(Some(format!("env-{}", s.next_id()))),
        }
    }

    async fn trigger_envelope(&self, _creds: &Credentials, env_id: &str) -> Result<(), DispatchError> {
        self.record(RemoteCall::TriggerEnvelope(env_id.to_string()))?;
        self.state.lock().trigger_results.pop_front().unwrap_or(Ok(()))
    }

    async fn lists(&self, _creds: &Credentials) -> Result<Vec<RemoteList>, DispatchError> {
        self.record(RemoteCall::Lists)?;
        Ok(self.state.lock().lists.clone())
    }

    async fn create_list(&self, _creds: &Credentials, name: &str) -> Result<String, DispatchError> {
        self.record(RemoteCall::CreateList(name.to_string()))?;
        let mut s = self.state.lock();
        let id = s.next_id();
        s.lists.push(RemoteList {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn campaigns(&self, _creds: &Credentials) -> Result<Vec<RemoteCampaign>, DispatchError> {
        self.record(RemoteCall::Campaigns)?;
        Ok(self.state.lock().campaigns.clone())
    }

    async fn create_campaign(&self, _creds: &Credentials, name: &str) -> Result<String, DispatchError> {
        self.record(RemoteCall::CreateCampaign(name.to_string()))?;
        let mut s = self.state.lock();
        let id = s.next_id();
        s.campaigns.push(RemoteCampaign {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn subscribe(
        &self,
        _creds: &Credentials,
        list_id: &str,
        email: &str,
    ) -> Result<(), DispatchError> {
        self.record(RemoteCall::Subscribe {
            list_id: list_id.to_string(),
            email: email.to_string(),
        })?;
        self.state.lock().subscribe_results.pop_front().unwrap_or(Ok(()))
    }
}
