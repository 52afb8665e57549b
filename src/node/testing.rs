//! Scripted node used by service tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::rpc::{NodeEndpoint, NodeRpc, RpcError};

type Reply = Result<Value, RpcError>;

pub fn endpoint() -> NodeEndpoint {
    NodeEndpoint {
        host: "node.test".to_string(),
        port: 8232,
        rpc_user: "user".to_string(),
        rpc_password: "pass".to_string(),
    }
}

/// Replies per method; the last scripted reply of a method repeats
#[derive(Default)]
pub struct ScriptedNode {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(NodeEndpoint, String, Value)>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ScriptedNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, reply: Reply) {
        self.respond_seq(method, vec![reply]);
    }

    pub fn respond_seq(&self, method: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), replies.into_iter().collect());
    }

    /// Calls to `method` park until a permit is added to the returned gate
    pub fn hold(&self, method: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().unwrap().insert(method.to_string(), gate.clone());
        gate
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, m, _)| m.clone()).collect()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.methods().iter().filter(|m| *m == method).count()
    }

    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == method)
            .map(|(_, _, p)| p.clone())
            .collect()
    }

    pub fn endpoints(&self) -> Vec<NodeEndpoint> {
        self.calls.lock().unwrap().iter().map(|(e, _, _)| e.clone()).collect()
    }
}

#[async_trait]
impl NodeRpc for ScriptedNode {
    async fn call(&self, endpoint: &NodeEndpoint, method: &str, params: Value) -> Reply {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.clone(), method.to_string(), params));

        let gate = self.gates.lock().unwrap().get(method).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(method) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Err(RpcError::NetworkError(format!("no scripted reply for {}", method))),
        }
    }
}
