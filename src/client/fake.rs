//! In-memory transport for unit tests.

use crate::client::http::{SubmitMethod, Transport, TransportResponse};
use crate::LcpError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// A form submission seen by the fake.
#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub method: SubmitMethod,
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// Serves canned bodies by URL and records every call.
#[derive(Default)]
pub(crate) struct FakeTransport {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    responses: Mutex<HashMap<String, TransportResponse>>,
    fetches: Mutex<Vec<String>>,
    submissions: Mutex<Vec<Submission>>,
}

impl FakeTransport {
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            TransportResponse {
                status,
                body: body.as_bytes().to_vec(),
            },
        );
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LcpError> {
        self.fetches.lock().unwrap().push(url.to_string());
        self.resources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| LcpError::Transport(format!("GET {} failed: 404", url)))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, LcpError> {
        let body = self.fetch(url)?;
        fs::write(destination, &body).map_err(|e| LcpError::Transport(e.to_string()))?;
        Ok(body.len() as u64)
    }

    fn submit(
        &self,
        method: SubmitMethod,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<TransportResponse, LcpError> {
        self.submissions.lock().unwrap().push(Submission {
            method,
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| LcpError::Transport(format!("{:?} {} failed: refused", method, url)))
    }
}
