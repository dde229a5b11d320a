//! Startup configuration for a llama.cpp server runtime.

use parley_core::error::ParleyError;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// First four bytes of every GGUF weight file
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// Startup-time constants for the model runtime.
///
/// None of these change after the runtime is built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlamaServerConfig {
    /// Base URL of the server's OpenAI-compatible API
    pub api_base: String,
    /// Key sent as a bearer token, if the server was started with one
    pub api_key: Option<String>,
    /// GGUF weight file the server loads
    pub model_path: PathBuf,
    /// Chat template name
    pub chat_format: String,
    /// Context window in tokens
    pub context_window: u32,
    /// Layers offloaded to the GPU: -1 for all, 0 for CPU only
    pub gpu_layers: i32,
    /// Whether the server compiles JSON schemas into a decoding grammar
    pub constrained_decoding: bool,
}

impl Default for LlamaServerConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8080/v1".to_string(),
            api_key: None,
            model_path: PathBuf::from("./Meta-Llama-3-8B-Instruct.Q2_K.gguf"),
            chat_format: "chatml".to_string(),
            context_window: 4096,
            gpu_layers: -1,
            constrained_decoding: true,
        }
    }
}

impl LlamaServerConfig {
    /// Check the configuration, including the weight file on disk.
    ///
    /// A missing or corrupt weight file is a startup abort, so this fails
    /// with `Configuration` rather than anything a request could recover from.
    pub fn validate(&self) -> Result<(), ParleyError> {
        if self.api_base.trim().is_empty() {
            return Err(ParleyError::configuration("api_base must not be empty"));
        }
        if self.context_window == 0 {
            return Err(ParleyError::configuration(
                "context_window must be greater than zero",
            ));
        }
        if self.gpu_layers < -1 {
            return Err(ParleyError::configuration(format!(
                "gpu_layers must be -1 (all), 0 (cpu) or a positive count, got {}",
                self.gpu_layers
            )));
        }
        check_weight_file(&self.model_path)
    }

    /// Model name reported to the server: the weight file's stem
    pub fn model_name(&self) -> String {
        self.model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string())
    }

    /// `llama-server` arguments matching this configuration
    pub fn launch_args(&self) -> Vec<String> {
        let gpu_layers = match self.gpu_layers {
            -1 => "999".to_string(),
            n => n.to_string(),
        };

        vec![
            "--model".to_string(),
            self.model_path.display().to_string(),
            "--ctx-size".to_string(),
            self.context_window.to_string(),
            "--n-gpu-layers".to_string(),
            gpu_layers,
            "--chat-template".to_string(),
            self.chat_format.clone(),
        ]
    }
}

fn check_weight_file(path: &Path) -> Result<(), ParleyError> {
    if !path.is_file() {
        return Err(ParleyError::configuration(format!(
            "model weight file not found: {}",
            path.display()
        )));
    }

    let mut magic = [0u8; 4];
    std::fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .map_err(|e| {
            ParleyError::configuration(format!(
                "model weight file unreadable: {}: {}",
                path.display(),
                e
            ))
        })?;

    if &magic != GGUF_MAGIC {
        return Err(ParleyError::configuration(format!(
            "model weight file is not GGUF: {}",
            path.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("parley-{}-{}.gguf", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = LlamaServerConfig::default();
        assert_eq!(config.chat_format, "chatml");
        assert_eq!(config.context_window, 4096);
        assert_eq!(config.gpu_layers, -1);
        assert_eq!(config.model_name(), "Meta-Llama-3-8B-Instruct.Q2_K");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LlamaServerConfig = serde_json::from_value(serde_json::json!({
            "model_path": "/models/lexi.gguf",
            "gpu_layers": 40
        }))
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/models/lexi.gguf"));
        assert_eq!(config.gpu_layers, 40);
        assert_eq!(config.api_base, "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn test_missing_weight_file_is_fatal() {
        let config = LlamaServerConfig {
            model_path: PathBuf::from("/nonexistent/model.gguf"),
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ParleyError::Configuration(_))
        ));
    }

    #[test]
    fn test_corrupt_weight_file_is_fatal() {
        let path = weight_file("corrupt", b"not a model");
        let config = LlamaServerConfig {
            model_path: path.clone(),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not GGUF"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_valid_weight_file() {
        let path = weight_file("valid", b"GGUF\x03\x00\x00\x00");
        let config = LlamaServerConfig {
            model_path: path.clone(),
            gpu_layers: 0,
            ..Default::default()
        };

        assert!(config.validate().is_ok());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let config = LlamaServerConfig {
            context_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LlamaServerConfig {
            gpu_layers: -5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_launch_args() {
        let config = LlamaServerConfig {
            model_path: PathBuf::from("/models/llama.gguf"),
            gpu_layers: -1,
            ..Default::default()
        };

        assert_eq!(
            config.launch_args(),
            vec![
                "--model",
                "/models/llama.gguf",
                "--ctx-size",
                "4096",
                "--n-gpu-layers",
                "999",
                "--chat-template",
                "chatml",
            ]
        );
    }
}
