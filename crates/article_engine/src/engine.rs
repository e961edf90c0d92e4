use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_error, engine_info, ItemScope};

use crate::assemble::{ArticleAssembler, ProgressSink};
use crate::{EngineEvent, FeedItem, JobId, JobProgress, Stage, TransformContext};

enum EngineCommand {
    Enqueue {
        job_id: JobId,
        item: FeedItem,
        ctx: TransformContext,
    },
}

/// Runs feed item transforms off the caller's thread.
///
/// Items are independent, so each job gets its own slot on the runtime's
/// blocking pool; the redirect and lookup collaborators may block there.
pub struct ImportHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl ImportHandle {
    pub fn new(assembler: Arc<ArticleAssembler>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("failed to start import runtime: {err}");
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let assembler = assembler.clone();
                let event_tx = event_tx.clone();
                runtime.spawn_blocking(move || {
                    handle_command(assembler.as_ref(), command, event_tx);
                });
            }
            engine_info!("import handle closed");
        });

        Self { cmd_tx, event_rx }
    }

    pub fn enqueue(&self, job_id: JobId, item: FeedItem, ctx: TransformContext) {
        let _ = self.cmd_tx.send(EngineCommand::Enqueue { job_id, item, ctx });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

fn handle_command(
    assembler: &ArticleAssembler,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Enqueue { job_id, item, ctx } => {
            let _scope = ItemScope::enter(format!("job {job_id}"));
            let sink = ChannelProgressSink {
                tx: event_tx.clone(),
            };
            sink.emit(EngineEvent::Progress(JobProgress {
                job_id,
                stage: Stage::Queued,
            }));
            let document = assembler.assemble_job(job_id, &item, &ctx, &sink);
            let _ = event_tx.send(EngineEvent::JobCompleted { job_id, document });
        }
    }
}
