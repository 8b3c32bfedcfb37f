use chrono::Utc;
use oktsec_policy::PolicyPipeline;
use oktsec_types::{EvalMode, Message, PolicyDecision};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Proxies a child MCP server's stdio, evaluating every client request
/// through `PolicyPipeline` before it reaches the child.
///
/// Spawns with piped stdio, runs one task per direction, and guards the
/// shared output handle with a `tokio::sync::Mutex`.
pub struct StdioWrapper {
    pipeline: Arc<PolicyPipeline>,
    from_agent: String,
    to_agent: String,
}

impl StdioWrapper {
    pub fn new(pipeline: Arc<PolicyPipeline>, from_agent: String, to_agent: String) -> Self {
        Self {
            pipeline,
            from_agent,
            to_agent,
        }
    }

    /// Spawns `command` and proxies stdin/stdout until either side closes.
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> anyhow::Result<()> {
        let mut child: Child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let child_stdin = child.stdin.take().expect("piped stdin");
        let child_stdout = child.stdout.take().expect("piped stdout");
        let output = Arc::new(Mutex::new(tokio::io::stdout()));

        let inbound = self.proxy_client_to_child(child_stdin, Arc::clone(&output));
        let outbound = proxy_child_to_client(child_stdout, output);

        tokio::select! {
            result = inbound => result?,
            result = outbound => result?,
            status = child.wait() => {
                info!(?status, "child process exited");
            }
        }
        Ok(())
    }

    /// Client (our own stdin) -> child. Blocked requests get a local
    /// JSON-RPC error and are never forwarded; blocked notifications (no
    /// `id`) are dropped silently.
    async fn proxy_client_to_child(
        &self,
        mut child_stdin: tokio::process::ChildStdin,
        output: Arc<Mutex<tokio::io::Stdout>>,
    ) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let request: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "discarding unparseable stdio line");
                    continue;
                }
            };
            let id = request.get("id").cloned();

            let message = Message {
                from: self.from_agent.clone(),
                to: self.to_agent.clone(),
                content: line.clone(),
                timestamp: Utc::now(),
                signature: None,
            };
            let verdict = self.pipeline.evaluate(&message, EvalMode::Enforce).await;

            if verdict.decision == PolicyDecision::Block {
                let rule = verdict
                    .rules_triggered
                    .first()
                    .map(|r| r.rule_id.clone())
                    .unwrap_or_else(|| "policy".to_string());
                if let Some(error) = block_response(id, &rule) {
                    write_line(&output, &error.to_string()).await?;
                }
                continue;
            }

            child_stdin.write_all(line.as_bytes()).await?;
            child_stdin.write_all(b"\n").await?;
        }
        Ok(())
    }
}

/// Builds the JSON-RPC error reply for a blocked request. Returns `None` for
/// notifications (no `id`), which are dropped silently rather than answered.
fn block_response(id: Option<Value>, rule: &str) -> Option<Value> {
    let id = id?;
    Some(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": -32600, "message": format!("blocked by oktsec-gateway: {rule}") },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_response_answers_requests_with_an_id() {
        let response = block_response(Some(json!(7)), "secret-aws-access-key").unwrap();
        assert_eq!(response["id"], json!(7));
        assert_eq!(response["error"]["code"], json!(-32600));
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("secret-aws-access-key"));
    }

    #[test]
    fn block_response_drops_notifications_without_an_id() {
        assert!(block_response(None, "secret-aws-access-key").is_none());
    }
}

/// Child -> client. Always forwarded, only observed.
async fn proxy_child_to_client(
    child_stdout: tokio::process::ChildStdout,
    output: Arc<Mutex<tokio::io::Stdout>>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(child_stdout).lines();
    while let Some(line) = lines.next_line().await? {
        write_line(&output, &line).await?;
    }
    Ok(())
}

async fn write_line(output: &Arc<Mutex<tokio::io::Stdout>>, line: &str) -> anyhow::Result<()> {
    let mut out = output.lock().await;
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
