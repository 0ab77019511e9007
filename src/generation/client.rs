//! JSON-RPC 2.0 generation client over Unix socket.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, error};

use super::types::{
    GenerateOptions, GenerateRequest, GenerateResponse, JsonRpcRequest, JsonRpcResponse,
};
use super::TextGenerator;
use crate::config::GenerationConfig;
use crate::Error;

/// Client for the text-generation service.
pub struct IpcGenerator {
    socket_path: String,
    request_id: AtomicU64,
}

impl Default for IpcGenerator {
    fn default() -> Self {
        Self::new(GenerationConfig::default().socket_path)
    }
}

impl IpcGenerator {
    pub fn new(socket_path: String) -> Self {
        Self {
            socket_path,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.socket_path.clone())
    }

    /// Get the next request ID.
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Check if the generation service is listening.
    pub async fn is_service_running(&self) -> bool {
        UnixStream::connect(&self.socket_path).await.is_ok()
    }

    /// Send a JSON-RPC request and receive the response.
    async fn send_request<T, R>(&self, request: JsonRpcRequest<T>) -> Result<R, Error>
    where
        T: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        debug!(method = %request.method, id = request.id, "Sending generation request");

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Generation(format!("Failed to connect to {}: {}", self.socket_path, e))
        })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request_json = serde_json::to_string(&request)?;
        writer
            .write_all(request_json.as_bytes())
            .await
            .map_err(|e| Error::Generation(format!("Failed to write request: {}", e)))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| Error::Generation(format!("Failed to write newline: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Generation(format!("Failed to flush: {}", e)))?;

        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| Error::Generation(format!("Failed to read response: {}", e)))?;

        let response: JsonRpcResponse<R> = serde_json::from_str(&response_line)
            .map_err(|e| Error::Generation(format!("Failed to parse response: {}", e)))?;

        if response.id != request.id {
            return Err(Error::Generation(format!(
                "Response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        if let Some(error) = response.error {
            error!(code = error.code, message = %error.message, "Generation service error");
            return Err(Error::Generation(error.to_string()));
        }

        response
            .result
            .ok_or_else(|| Error::Generation("No result in response".to_string()))
    }
}

impl TextGenerator for IpcGenerator {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, Error> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            options: options.clone(),
        };
        let rpc_request = JsonRpcRequest::new("generate", request, self.next_id());
        let response: GenerateResponse = self.send_request(rpc_request).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::net::UnixListener;

    #[test]
    fn test_request_id_increment() {
        let client = IpcGenerator::default();
        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);
        assert_eq!(client.next_id(), 3);
    }

    #[tokio::test]
    async fn test_generate_round_trip() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("gen.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.unwrap();
            let request: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(request["method"], "generate");
            let reply = serde_json::json!({
                "jsonrpc": "2.0",
                "result": {"text": format!("echo: {}", request["params"]["prompt"].as_str().unwrap())},
                "id": request["id"],
            });
            writer
                .write_all(format!("{}\n", reply).as_bytes())
                .await
                .unwrap();
        });

        let client = IpcGenerator::new(socket.to_string_lossy().to_string());
        let text = client
            .generate("hello", &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "echo: hello");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_service_not_running() {
        let client = IpcGenerator::new("/nonexistent/captionist.sock".to_string());
        assert!(!client.is_service_running().await);
        let err = client
            .generate("hello", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
