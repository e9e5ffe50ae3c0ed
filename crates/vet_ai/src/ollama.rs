use vet_core::error::AppError;

/// Handle to a locally hosted Ollama instance.
///
/// Every model call in this crate goes through this client; the assistant is
/// deliberately local-only, so anything other than a loopback base URL is
/// rejected up front.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

fn is_loopback_base_url(url: &str) -> bool {
    let rest = match url.strip_prefix("http://") {
        Some(r) => r,
        None => return false,
    };
    let (host, port) = match rest.split_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (rest, None),
    };
    if host != "127.0.0.1" && host != "localhost" {
        return false;
    }
    match port {
        None => true,
        Some(p) => p.parse::<u16>().map(|n| n > 0).unwrap_or(false),
    }
}

impl OllamaClient {
    /// Create a client for Ollama. Only `http://127.0.0.1[:port]` and
    /// `http://localhost[:port]` are accepted.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !is_loopback_base_url(&base_url) {
            return Err(AppError::new(
                "AI_REMOTE_NOT_ALLOWED",
                "Ollama base URL must be a loopback address",
            )
            .with_details(format!("base_url={base_url}")));
        }
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `/api/tags` with a short timeout so startup fails promptly when
    /// Ollama is not running.
    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url)
            .timeout(std::time::Duration::from_millis(1_000))
            .call();

        match resp {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(
                AppError::new("AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={code}")),
            ),
            Err(e) => Err(AppError::new(
                "AI_OLLAMA_UNREACHABLE",
                "Failed to reach the local Ollama service",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }
}
