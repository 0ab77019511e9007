//! Generation request and response types.

use serde::{Deserialize, Serialize};

/// Sampling options for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.3,
            system_prompt: None,
        }
    }
}

impl GenerateOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// `generate` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub options: GenerateOptions,
}

/// `generate` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<T> {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: T,
    pub id: u64,
}

impl<T> JsonRpcRequest<T> {
    pub fn new(method: impl Into<String>, params: T, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
    pub id: u64,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match crate::error::RpcErrorCode::from_code(self.code) {
            Some(code) => write!(f, "[{}:{:?}] {}", self.code, code, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_flattens_options() {
        let request = JsonRpcRequest::new(
            "generate",
            GenerateRequest {
                prompt: "hi".to_string(),
                options: GenerateOptions::new(100, 0.5).with_system_prompt("sys"),
            },
            7,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["params"]["prompt"], "hi");
        assert_eq!(value["params"]["max_tokens"], 100);
        assert_eq!(value["params"]["system_prompt"], "sys");
    }

    #[test]
    fn test_error_display_names_known_codes() {
        let err = JsonRpcError {
            code: -32003,
            message: "model down".to_string(),
        };
        assert_eq!(err.to_string(), "[-32003:ModelUnavailable] model down");

        let err = JsonRpcError {
            code: 1,
            message: "x".to_string(),
        };
        assert_eq!(err.to_string(), "[1] x");
    }
}
