use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{Map, Value};

use segway_pipeline_utils::error::SegwayError;
use segway_pipeline_utils::portal::PortalClient;

/// Canned portal responses keyed by `path` or `path?k=v&k=v` in request order.
/// Unknown requests answer 404 like the portal does.
#[derive(Default)]
pub struct FakePortal {
    responses: HashMap<String, Value>,
    pub requests: RefCell<Vec<String>>,
}

impl FakePortal {
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.responses.insert(key.to_string(), value);
        self
    }
}

pub fn request_key(url_or_path: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return url_or_path.to_string();
    }
    let params = query
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url_or_path}?{params}")
}

impl PortalClient for FakePortal {
    fn get_json(
        &self,
        url_or_path: &str,
        query: &[(&str, &str)],
    ) -> Result<Map<String, Value>, SegwayError> {
        let key = request_key(url_or_path, query);
        self.requests.borrow_mut().push(key.clone());
        match self.responses.get(&key) {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(SegwayError::NonObjectResponse(key)),
            None => Err(SegwayError::PortalStatus {
                status: 404,
                message: key,
            }),
        }
    }
}
