use resumelens::client::{ApiRequest, ApiResponse, HttpTransport};
use resumelens::{Error, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// An admin access token (claims: sub, role=admin, type=access). Signature is junk.
pub const ADMIN_JWT: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiI2NGYwYzBmZmVlMTIzNCIsInJvbGUiOiJhZG1pbiIsInR5cGUiOiJhY2Nlc3MifQ.c2ln";

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub path: String,
    pub bearer: Option<String>,
    pub request: ApiRequest,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<ApiResponse>>,
    sent: Vec<Sent>,
}

/// Transport that answers from a queue of canned replies and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reply(&self, status: u16, body: Value) -> &Self {
        self.script
            .borrow_mut()
            .replies
            .push_back(Ok(ApiResponse { status, body }));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.script
            .borrow_mut()
            .replies
            .push_back(Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message.to_string(),
            ))));
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.script.borrow().sent.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.path).collect()
    }

    pub fn pending(&self) -> usize {
        self.script.borrow().replies.len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let mut script = self.script.borrow_mut();
        script.sent.push(Sent {
            path: request.path.clone(),
            bearer: bearer.map(|b| b.to_string()),
            request: request.clone(),
        });
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request to {}", request.path))
    }
}
