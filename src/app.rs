use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use relay_core::{
    AppConfig, DispatchContext, IterationReport, LinkMethod, Listener, Sender, SenderKind,
    ShutdownSignal,
};
use relay_dispatcher::Dispatcher;
use relay_infrastructure::{EchoSender, InMemoryQueue, ShellSender, TracingMonitoringSink};
use relay_iteration::{IterationEngine, IterationSource, LineSource, ReaderLineSource};
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tracing::info;

/// 发送器及其可选的应答监听器
struct SenderWiring {
    sender: Arc<dyn Sender>,
    listener: Option<Arc<dyn Listener>>,
    responder: Option<JoinHandle<()>>,
}

/// 主应用程序
///
/// Wires the configured sender into a dispatcher and iterates line based
/// input through it.
pub struct Application {
    dispatcher: Arc<Dispatcher>,
    engine: IterationEngine,
    responder: Option<JoinHandle<()>>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig, signal: &ShutdownSignal) -> Result<Self> {
        config.validate()?;
        if config.sender.kind == SenderKind::Queue
            && config.dispatch.link_method == LinkMethod::CorrelationId
            && config.iteration.parallel
        {
            bail!("并行模式下队列发送器必须使用 MESSAGEID 关联, 否则应答无法区分");
        }
        info!(
            "初始化应用程序, 分发器 [{}], 发送器 [{:?}]",
            config.dispatch.name, config.sender.kind
        );

        let wiring = create_sender(&config)?;
        let mut builder = Dispatcher::builder(config.dispatch.clone(), wiring.sender)
            .with_monitoring(Arc::new(TracingMonitoringSink::new()))
            .with_interrupt(signal.token());
        if let Some(listener) = wiring.listener {
            builder = builder.with_listener(listener);
        }
        let dispatcher = Arc::new(builder.build().context("创建分发器失败")?);

        let engine = IterationEngine::builder(config.iteration.clone(), dispatcher.clone())
            .with_interrupt(signal.token())
            .build()
            .context("创建迭代引擎失败")?;

        Ok(Self {
            dispatcher,
            engine,
            responder: wiring.responder,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Iterates the lines of `text`.
    pub async fn run_text(&self, text: &str) -> Result<IterationReport> {
        let source = IterationSource::pull(LineSource::new(text));
        self.engine
            .run(source, run_context())
            .await
            .context("迭代执行失败")
    }

    /// Streams the lines of the file at `path`.
    pub async fn run_file(&self, path: &Path) -> Result<IterationReport> {
        let file = File::open(path)
            .await
            .with_context(|| format!("打开输入文件失败: {}", path.display()))?;
        let source = IterationSource::push(ReaderLineSource::new(BufReader::new(file)));
        self.engine
            .run(source, run_context())
            .await
            .context("迭代执行失败")
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if let Some(responder) = self.responder.take() {
            responder.abort();
        }
    }
}

/// Items of one run share the run id as their correlation id.
fn run_context() -> DispatchContext {
    let context = DispatchContext::new();
    let run_id = context.message_id().unwrap_or_default().to_string();
    context.with_correlation_id(run_id)
}

fn create_sender(config: &AppConfig) -> Result<SenderWiring> {
    let sender_config = &config.sender;
    let reply_timeout = Duration::from_millis(sender_config.reply_timeout_ms);

    let wiring = match sender_config.kind {
        SenderKind::Echo => SenderWiring {
            sender: Arc::new(EchoSender::new("")),
            listener: None,
            responder: None,
        },
        SenderKind::Shell => {
            let command = sender_config
                .command
                .clone()
                .context("shell发送器缺少command配置")?;
            SenderWiring {
                sender: Arc::new(
                    ShellSender::new("", command, sender_config.args.clone())
                        .with_timeout(reply_timeout),
                ),
                listener: None,
                responder: None,
            }
        }
        SenderKind::Queue => {
            // 进程内回环: 应答任务原样返回消息
            let queue = InMemoryQueue::new();
            let responder = queue.spawn_responder(|message| message.payload.clone())?;
            SenderWiring {
                sender: Arc::new(queue.sender("", config.dispatch.link_method)),
                listener: Some(Arc::new(queue.listener("", reply_timeout))),
                responder: Some(responder),
            }
        }
    };
    Ok(wiring)
}
