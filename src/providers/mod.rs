//! LLM providers and the priority-ordered fallback chain.
//!
//! The chain only sees `dyn ProviderClient`; it never inspects concrete provider types.
//! Any provider error (HTTP status, transport, timeout, bad envelope) means "try the next one".

use std::{sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::PipelineSettings;
use crate::error::{GenerateError, ProviderError};
use crate::prompt::Prompt;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

#[async_trait]
pub trait ProviderClient: Send + Sync {
  /// Stable label reported as `apiUsed`.
  fn name(&self) -> &str;
  async fn call(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// Raw model text plus the provider that produced it.
#[derive(Debug, Clone)]
pub struct Generated {
  pub text: String,
  pub provider: String,
}

#[derive(Clone)]
pub struct ProviderFallbackChain {
  providers: Vec<Arc<dyn ProviderClient>>,
  call_timeout: Duration,
}

impl ProviderFallbackChain {
  pub fn new(providers: Vec<Arc<dyn ProviderClient>>, call_timeout: Duration) -> Self {
    Self { providers, call_timeout }
  }

  /// Build the chain from `provider_order`, skipping providers without credentials.
  pub fn from_env(settings: &PipelineSettings) -> Self {
    Self::from_vars(settings, &|k| std::env::var(k).ok())
  }

  /// Same as `from_env`, reading credentials through `var`.
  pub fn from_vars(settings: &PipelineSettings, var: &dyn Fn(&str) -> Option<String>) -> Self {
    let timeout_secs = settings.provider_timeout_secs;
    let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();
    for name in &settings.provider_order {
      let built: Option<Arc<dyn ProviderClient>> = match name.as_str() {
        "openai" => OpenAiProvider::from_vars(var, timeout_secs).map(|p| Arc::new(p) as Arc<dyn ProviderClient>),
        "gemini" => GeminiProvider::from_vars(var, timeout_secs).map(|p| Arc::new(p) as Arc<dyn ProviderClient>),
        other => {
          warn!(target: "provider", provider = %other, "Unknown provider in provider_order; ignoring");
          continue;
        }
      };
      match built {
        Some(p) => {
          info!(target: "provider", provider = %p.name(), priority = providers.len() + 1, "Provider enabled.");
          providers.push(p);
        }
        None => info!(target: "provider", provider = %name, "Provider disabled (no API key)."),
      }
    }
    Self::new(providers, Duration::from_secs(timeout_secs))
  }

  pub fn is_empty(&self) -> bool { self.providers.is_empty() }

  pub fn names(&self) -> Vec<String> {
    self.providers.iter().map(|p| p.name().to_string()).collect()
  }

  /// Try each provider in order until one returns text.
  /// A cancelled token aborts the in-flight request immediately.
  #[instrument(level = "info", skip(self, prompt, cancel), fields(providers = self.providers.len()))]
  pub async fn generate(&self, prompt: &Prompt, cancel: &CancellationToken) -> Result<Generated, GenerateError> {
    let mut attempts: Vec<(String, ProviderError)> = Vec::new();

    for provider in &self.providers {
      if cancel.is_cancelled() {
        return Err(GenerateError::Cancelled);
      }
      let name = provider.name().to_string();
      let start = Instant::now();

      let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          warn!(target: "provider", provider = %name, "Caller went away; aborting in-flight provider call");
          return Err(GenerateError::Cancelled);
        }
        r = tokio::time::timeout(self.call_timeout, provider.call(prompt)) => match r {
          Ok(inner) => inner,
          Err(_) => Err(ProviderError::Timeout(self.call_timeout.as_secs())),
        },
      };

      let elapsed = start.elapsed();
      match outcome {
        Ok(text) => {
          info!(target: "provider", provider = %name, ?elapsed, response_len = text.len(), "Provider call succeeded");
          return Ok(Generated { text, provider: name });
        }
        Err(e) => {
          warn!(target: "provider", provider = %name, ?elapsed, error = %e, "Provider call failed; trying next provider");
          attempts.push((name, e));
        }
      }
    }

    Err(GenerateError::AllProvidersExhausted { attempts })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct Scripted {
    name: &'static str,
    reply: Result<&'static str, u16>,
    delay: Duration,
    calls: AtomicUsize,
  }

  impl Scripted {
    fn ok(name: &'static str, text: &'static str) -> Arc<Self> {
      Arc::new(Self { name, reply: Ok(text), delay: Duration::ZERO, calls: AtomicUsize::new(0) })
    }
    fn http(name: &'static str, status: u16) -> Arc<Self> {
      Arc::new(Self { name, reply: Err(status), delay: Duration::ZERO, calls: AtomicUsize::new(0) })
    }
    fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
      Arc::new(Self { name, reply: Ok("late"), delay, calls: AtomicUsize::new(0) })
    }
  }

  #[async_trait]
  impl ProviderClient for Scripted {
    fn name(&self) -> &str { self.name }
    async fn call(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      match self.reply {
        Ok(t) => Ok(t.to_string()),
        Err(status) => Err(ProviderError::Http { status, message: "scripted".into() }),
      }
    }
  }

  fn prompt() -> Prompt {
    Prompt { system: "s".into(), user: "u".into() }
  }

  #[tokio::test]
  async fn falls_back_to_secondary_on_http_500() {
    let primary = Scripted::http("primary", 500);
    let secondary = Scripted::ok("secondary", "[]");
    let chain = ProviderFallbackChain::new(vec![primary.clone(), secondary.clone()], Duration::from_secs(5));

    let got = chain.generate(&prompt(), &CancellationToken::new()).await.expect("secondary answers");
    assert_eq!(got.provider, "secondary");
    assert_eq!(got.text, "[]");
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn first_success_short_circuits() {
    let primary = Scripted::ok("primary", "[1]");
    let secondary = Scripted::ok("secondary", "[2]");
    let chain = ProviderFallbackChain::new(vec![primary, secondary.clone()], Duration::from_secs(5));
    let got = chain.generate(&prompt(), &CancellationToken::new()).await.expect("primary answers");
    assert_eq!(got.provider, "primary");
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn all_failing_is_exhausted_with_every_attempt() {
    let chain = ProviderFallbackChain::new(
      vec![Scripted::http("primary", 500), Scripted::http("secondary", 429)],
      Duration::from_secs(5),
    );
    match chain.generate(&prompt(), &CancellationToken::new()).await {
      Err(GenerateError::AllProvidersExhausted { attempts }) => {
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].0, "primary");
        assert_eq!(attempts[1].0, "secondary");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn timeout_counts_as_provider_error() {
    let chain = ProviderFallbackChain::new(
      vec![Scripted::slow("primary", Duration::from_secs(10)), Scripted::ok("secondary", "[]")],
      Duration::from_millis(50),
    );
    let got = chain.generate(&prompt(), &CancellationToken::new()).await.expect("secondary answers");
    assert_eq!(got.provider, "secondary");
  }

  #[tokio::test]
  async fn cancellation_aborts_in_flight_call() {
    let slow = Scripted::slow("primary", Duration::from_secs(30));
    let chain = ProviderFallbackChain::new(vec![slow], Duration::from_secs(60));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      trigger.cancel();
    });
    let started = Instant::now();
    let res = chain.generate(&prompt(), &token).await;
    assert!(matches!(res, Err(GenerateError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
  }

  #[test]
  fn from_vars_follows_order_and_skips_missing_keys() {
    let settings = PipelineSettings {
      provider_order: vec!["gemini".into(), "mystery".into(), "openai".into()],
      ..PipelineSettings::default()
    };

    let only_gemini = |k: &str| (k == "GEMINI_API_KEY").then(|| "g".to_string());
    assert_eq!(ProviderFallbackChain::from_vars(&settings, &only_gemini).names(), vec!["gemini"]);

    let both = |k: &str| k.ends_with("_API_KEY").then(|| "key".to_string());
    let chain = ProviderFallbackChain::from_vars(&settings, &both);
    assert_eq!(chain.names(), vec!["gemini", "openai"]);
    assert_eq!(chain.call_timeout, Duration::from_secs(settings.provider_timeout_secs));

    assert!(ProviderFallbackChain::from_vars(&settings, &|_: &str| None).is_empty());
  }

  #[tokio::test]
  async fn empty_chain_is_exhausted() {
    let chain = ProviderFallbackChain::new(vec![], Duration::from_secs(1));
    assert!(matches!(
      chain.generate(&prompt(), &CancellationToken::new()).await,
      Err(GenerateError::AllProvidersExhausted { .. })
    ));
  }
}
