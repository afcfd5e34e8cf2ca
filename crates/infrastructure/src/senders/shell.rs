use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{DispatchContext, RelayError, RelayResult, Sender, MESSAGE_ID_KEY};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::timeout::with_timeout;

/// Environment variable prefix for context values passed to the command.
pub const CONTEXT_ENV_PREFIX: &str = "RELAY_CTX_";

/// Shell命令发送器
///
/// Writes the payload to the command's stdin and returns its stdout as the
/// reply. A non-zero exit status is a transport failure carrying stderr.
/// Context values are exported as `RELAY_CTX_<KEY>` environment variables.
#[derive(Debug, Clone)]
pub struct ShellSender {
    name: String,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ShellSender {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, payload: &str, context: &DispatchContext) -> RelayResult<String> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in context.values() {
            cmd.env(env_key(key), value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| RelayError::transport_error(format!("启动Shell命令失败: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RelayError::Internal("无法获取stdin".to_string()))?;
        // 命令可能不读取stdin
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(RelayError::transport_error(format!("写入stdin失败: {e}")));
            }
        }
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RelayError::transport_error(format!("等待进程结束失败: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            Err(RelayError::transport_error(if stderr.is_empty() {
                format!("命令执行失败，退出码: {:?}", output.status.code())
            } else {
                stderr
            }))
        }
    }
}

fn env_key(key: &str) -> String {
    let normalized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{CONTEXT_ENV_PREFIX}{normalized}")
}

#[async_trait]
impl Sender for ShellSender {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &str, context: &DispatchContext) -> RelayResult<String> {
        info!(
            "执行Shell发送: sender={}, command={}, args={:?}",
            self.name, self.command, self.args
        );
        let reply = with_timeout(self.run(payload, context), self.timeout, &self.command).await?;
        debug!(
            "Shell发送完成: message_id={}, reply_len={}",
            context.get(MESSAGE_ID_KEY).unwrap_or("-"),
            reply.len()
        );
        Ok(reply)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("messageId"), "RELAY_CTX_MESSAGEID");
        assert_eq!(env_key("item-no"), "RELAY_CTX_ITEM_NO");
    }

    #[tokio::test]
    async fn test_payload_piped_through_command() {
        let sender = ShellSender::new("upper", "tr", vec!["a-z".into(), "A-Z".into()]);
        let reply = sender.send("hello", &DispatchContext::new()).await.unwrap();
        assert_eq!(reply, "HELLO");
    }

    #[tokio::test]
    async fn test_context_exported_to_environment() {
        let sender = ShellSender::new(
            "env",
            "sh",
            vec!["-c".into(), "printf %s \"$RELAY_CTX_BATCH\"".into()],
        );
        let context = DispatchContext::new().with_value("batch", "b-7");
        assert_eq!(sender.send("", &context).await.unwrap(), "b-7");
    }

    #[tokio::test]
    async fn test_failing_command_is_transport_failure() {
        let sender = ShellSender::new(
            "fail",
            "sh",
            vec!["-c".into(), "echo broken >&2; exit 3".into()],
        );
        match sender.send("x", &DispatchContext::new()).await {
            Err(RelayError::TransportFailure(message)) => assert_eq!(message, "broken"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let sender = ShellSender::new("slow", "sleep", vec!["5".into()])
            .with_timeout(Duration::from_millis(100));
        let result = sender.send("", &DispatchContext::new()).await;
        assert!(matches!(result, Err(RelayError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let sender = ShellSender::new("missing", "/nonexistent/relay-command", vec![]);
        assert!(matches!(
            sender.send("", &DispatchContext::new()).await,
            Err(RelayError::TransportFailure(_))
        ));
    }
}
