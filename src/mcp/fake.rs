//! In-memory provider for tests: records calls, counts releases and can be
//! told to fail or hang.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Value, json};

use super::{DiscoveryError, InvocationError, JsonObject, Provider};

#[derive(Debug, Clone)]
pub enum CallBehavior {
    /// Success result echoing the arguments back as structured content.
    Echo,
    /// Return this value verbatim.
    Respond(Value),
    /// Transport-level failure with this message.
    Fail(String),
    /// Never complete.
    Hang,
}

pub type CallLog = Rc<RefCell<Vec<(String, JsonObject)>>>;

pub struct FakeProvider {
    tools: RefCell<Vec<Value>>,
    fail_discovery: Cell<bool>,
    behavior: CallBehavior,
    calls: CallLog,
    closes: Rc<Cell<usize>>,
}

impl FakeProvider {
    pub fn new(tools: Vec<Value>) -> Self {
        Self {
            tools: RefCell::new(tools),
            fail_discovery: Cell::new(false),
            behavior: CallBehavior::Echo,
            calls: Rc::new(RefCell::new(Vec::new())),
            closes: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_behavior(mut self, behavior: CallBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn set_tools(&self, tools: Vec<Value>) {
        *self.tools.borrow_mut() = tools;
    }

    pub fn set_discovery_failure(&self, fail: bool) {
        self.fail_discovery.set(fail);
    }

    pub fn call_log(&self) -> CallLog {
        Rc::clone(&self.calls)
    }

    pub fn close_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.closes)
    }
}

impl Provider for FakeProvider {
    async fn list_capabilities(&self) -> Result<Vec<Value>, DiscoveryError> {
        if self.fail_discovery.get() {
            return Err(DiscoveryError::Request("connection reset".into()));
        }
        Ok(self.tools.borrow().clone())
    }

    async fn call(&self, name: &str, arguments: JsonObject) -> Result<Value, InvocationError> {
        self.calls
            .borrow_mut()
            .push((name.to_string(), arguments.clone()));
        match &self.behavior {
            CallBehavior::Echo => Ok(json!({
                "content": [{"type": "text", "text": format!("called {name}")}],
                "structuredContent": Value::Object(arguments),
                "isError": false
            })),
            CallBehavior::Respond(v) => Ok(v.clone()),
            CallBehavior::Fail(msg) => Err(InvocationError::ExecutionFailed(msg.clone())),
            CallBehavior::Hang => std::future::pending().await,
        }
    }

    async fn close(self) {
        self.closes.set(self.closes.get() + 1);
    }
}

/// The two capabilities used across the test suite.
pub fn sample_tools() -> Vec<Value> {
    vec![
        json!({"name": "get_current_page"}),
        json!({
            "name": "navigate_page",
            "description": "Navigate to a page",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "pageId": {"type": "string", "required": true}
                },
                "required": ["pageId"]
            }
        }),
    ]
}
