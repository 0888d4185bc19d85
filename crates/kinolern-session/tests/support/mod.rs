//! Scripted in-process recommendation service for session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use kinolern_core::{Candidate, ItemIndex, RecommendRequest, RecommendResponse};
use kinolern_session::{RecommendationService, ServiceError};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<RecommendResponse, ServiceError>>>,
    requests: Mutex<Vec<RecommendRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, ids: &[u64]) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(RecommendResponse {
            candidates: candidates(ids),
        }));
        self
    }

    pub fn fail(&self) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(ServiceError::Status {
                status: 500,
                body: "internal error".into(),
            }));
        self
    }

    pub fn requests(&self) -> Vec<RecommendRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecommendRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl RecommendationService for ScriptedService {
    async fn recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Unavailable("script exhausted".into())))
    }
}

pub fn candidates(ids: &[u64]) -> Vec<Candidate> {
    ids.iter().map(|&i| Candidate::new(ItemIndex(i))).collect()
}

pub fn indexes(ids: &[u64]) -> Vec<ItemIndex> {
    ids.iter().map(|&i| ItemIndex(i)).collect()
}
