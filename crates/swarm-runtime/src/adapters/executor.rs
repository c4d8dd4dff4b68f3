//! Payload-driven directive executor.

use async_trait::async_trait;
use hs_03_worker::DirectiveExecutor;
use shared_types::Directive;
use std::time::Duration;
use tracing::debug;

/// Interprets two optional payload keys and otherwise succeeds:
///
/// - `delay_ms` (number): sleep before completing, simulating work.
/// - `fail_with` (string): fail with the given reason.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

#[async_trait]
impl DirectiveExecutor for LocalExecutor {
    async fn execute(&self, directive: &Directive) -> Result<(), String> {
        if let Some(delay) = directive.payload.get("delay_ms").and_then(|v| v.as_u64()) {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(reason) = directive.payload.get("fail_with").and_then(|v| v.as_str()) {
            return Err(reason.to_owned());
        }
        debug!(directive = %directive.id, directive_type = %directive.directive_type, "executed");
        Ok(())
    }
}
