use crate::engine::EngineEvent;
use crate::events::{DataListener, MetadataListener, PlayerListener};
use crate::types::Technology;
use crate::Result;
use bytes::Bytes;
use tokio::sync::oneshot;

/// Everything the orchestrator task reacts to
pub enum Message {
    Command(Command),
    /// Native engine event, stamped with the generation of the engine's attempt
    Engine { generation: u64, event: EngineEvent },
    Probe(ProbeReport),
    Timer { kind: TimerKind, token: u64 },
    LatencySample { generation: u64 },
}

/// Host requests
pub enum Command {
    Play,
    Destroy,
    SetMuted(bool),
    IsMuted(oneshot::Sender<bool>),
    Source(oneshot::Sender<Option<String>>),
    Time(oneshot::Sender<Option<f64>>),
    SendData(Bytes, oneshot::Sender<bool>),
    SetPlayerListener(PlayerListener),
    SetDataListener(DataListener),
    SetMetadataListener(MetadataListener),
}

/// Result of an existence probe for one attempt
pub struct ProbeReport {
    pub generation: u64,
    pub technology: Technology,
    pub stream_id: String,
    pub outcome: Result<ResolvedResource>,
}

/// A resource that exists and the extension to play it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub url: String,
    pub extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Delayed move to the next technology
    Retry,
    /// End of the generic-error debounce window
    ErrorDebounce,
    /// Delayed restart of an adaptive HTTP stream that ended
    Replay,
    /// Resume after a resolution change
    ResolutionResume,
    /// Periodic backup stream attempt
    BackupTick,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Command(cmd) => write!(f, "Command({:?})", cmd),
            Message::Engine { generation, event } => f
                .debug_struct("Engine")
                .field("generation", generation)
                .field("event", event)
                .finish(),
            Message::Probe(report) => f
                .debug_struct("Probe")
                .field("generation", &report.generation)
                .field("technology", &report.technology)
                .field("stream_id", &report.stream_id)
                .field("found", &report.outcome.is_ok())
                .finish(),
            Message::Timer { kind, token } => f
                .debug_struct("Timer")
                .field("kind", kind)
                .field("token", token)
                .finish(),
            Message::LatencySample { generation } => f
                .debug_struct("LatencySample")
                .field("generation", generation)
                .finish(),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Play => "Play",
            Command::Destroy => "Destroy",
            Command::SetMuted(muted) => return write!(f, "SetMuted({})", muted),
            Command::IsMuted(_) => "IsMuted",
            Command::Source(_) => "Source",
            Command::Time(_) => "Time",
            Command::SendData(data, _) => return write!(f, "SendData({} bytes)", data.len()),
            Command::SetPlayerListener(_) => "SetPlayerListener",
            Command::SetDataListener(_) => "SetDataListener",
            Command::SetMetadataListener(_) => "SetMetadataListener",
        };
        f.write_str(name)
    }
}
