use futures::{Sink, SinkExt, Stream, StreamExt};
use livecap_caption::{CaptionSinkRef, CaptionUpdate};
use livecap_pcm::{encode_chunk, quantize, ChunkAssembler, CommitScheduler};
use livecap_protocol::{ClientEvent, ServerEvent, REALTIME_URL};
use livecap_transcript::{TranscriptInterpreter, TranscriptOutput};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use crate::timers::DelaySlot;
use crate::{fetch_token, Result, SessionConfig, SessionError};

/// Quiet period before an incremental caption update is published.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// How long a final subtitle stays up before the explicit clear.
pub const FINAL_DISPLAY_TIME: Duration = Duration::from_millis(700);

/// Audio frames queued between the capture callback and the session loop.
const FRAME_QUEUE_DEPTH: usize = 64;

/// One live capture-to-caption session.
///
/// Created by [`RealtimeSession::start`]; audio frames are pushed through
/// [`frame_sender`](Self::frame_sender) and captions come out of the
/// `CaptionSink` handed to `start`. All pipeline state is owned by a
/// single driver task, so there is exactly one writer for the PCM buffer,
/// the commit counters and the transcript state.
pub struct RealtimeSession {
    frames: mpsc::Sender<Vec<f32>>,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

impl RealtimeSession {
    /// Exchange the token, connect the socket, send the session
    /// configuration and spawn the driver loop.
    ///
    /// Token, connection and configuration failures surface here as a
    /// failed start; there is no automatic retry.
    pub async fn start(config: SessionConfig, sink: CaptionSinkRef) -> Result<Self> {
        let client = reqwest::Client::new();
        let token = fetch_token(&client, &config.backend_url).await?;

        let url = format!("{}?model={}", REALTIME_URL, config.realtime_model);
        let mut request = url
            .into_client_request()
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let protocols = format!(
            "realtime, openai-insecure-api-key.{}, openai-beta.realtime-v1",
            token.client_secret
        );
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            protocols
                .parse()
                .map_err(|_| SessionError::Connect("invalid session credential".into()))?,
        );

        let (ws, response) = connect_async(request).await?;
        tracing::info!(status = %response.status(), "realtime socket connected");

        let (mut ws_tx, ws_rx) = ws.split();
        let update = ClientEvent::SessionUpdate {
            session: config.session_update(),
        };
        ws_tx
            .send(Message::Text(serde_json::to_string(&update)?.into()))
            .await?;

        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(run_loop(
            ws_tx,
            ws_rx,
            frames_rx,
            sink,
            cancel.clone(),
        ));

        Ok(Self {
            frames: frames_tx,
            cancel,
            driver,
        })
    }

    /// Sender for captured audio frames (mono f32 at the target rate).
    ///
    /// The capture callback must only hand frames off here; sends never
    /// block the callback when used with `try_send`/`blocking_send` from
    /// a bridge thread.
    pub fn frame_sender(&self) -> mpsc::Sender<Vec<f32>> {
        self.frames.clone()
    }

    /// Stop the session: cancels pending caption timers, discards
    /// buffered audio and releases the socket. Completes once the driver
    /// task has fully torn down.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.driver.await;
    }
}

/// The single-writer session loop.
///
/// Two inbound sources (audio frames and server events) plus the two
/// caption timers are multiplexed through one `select!`, preserving FIFO
/// order within each source. Nothing here is shared with another task.
async fn run_loop<Tx, Rx>(
    mut ws_tx: Tx,
    mut ws_rx: Rx,
    mut frames: mpsc::Receiver<Vec<f32>>,
    sink: CaptionSinkRef,
    cancel: CancellationToken,
) where
    Tx: Sink<Message> + Unpin,
    Tx::Error: std::fmt::Display,
    Rx: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut assembler = ChunkAssembler::new();
    let mut scheduler = CommitScheduler::new();
    let mut interpreter = TranscriptInterpreter::new();
    let mut debounce = DelaySlot::idle();
    let mut clear = DelaySlot::idle();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                assembler.push(&quantize(&frame));
                send_ready_chunks(&mut assembler, &mut scheduler, &mut ws_tx).await;
            }

            event = ws_rx.next() => {
                match event {
                    Some(Ok(Message::Text(text))) => {
                        handle_server_text(
                            &text,
                            &mut interpreter,
                            &mut scheduler,
                            &mut debounce,
                            &mut clear,
                            &sink,
                        );
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "realtime socket closed by service");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "realtime socket error");
                        break;
                    }
                    None => {
                        tracing::info!("realtime socket stream ended");
                        break;
                    }
                }
            }

            _ = debounce.fired() => {
                // Payload is the word list as it stands now, not as it
                // stood when the update was scheduled.
                sink.publish(CaptionUpdate::incremental(interpreter.current_text()));
            }

            _ = clear.fired() => {
                sink.publish(CaptionUpdate::clear());
            }
        }
    }

    // Teardown in one cooperative step: no timer fires, no buffered audio
    // survives, the socket is released.
    debounce.cancel();
    clear.cancel();
    assembler.clear();
    scheduler.reset();
    interpreter.reset();
    frames.close();
    let _ = ws_tx.close().await;
    tracing::info!("session loop stopped");
}

/// Drain complete chunks to the socket, pacing commits behind them.
///
/// A chunk leaves the buffer only after its send succeeds; when the
/// socket is not ready the audio stays buffered for the next attempt
/// rather than being dropped.
async fn send_ready_chunks<Tx>(
    assembler: &mut ChunkAssembler,
    scheduler: &mut CommitScheduler,
    ws_tx: &mut Tx,
) where
    Tx: Sink<Message> + Unpin,
    Tx::Error: std::fmt::Display,
{
    loop {
        let Some((audio, len)) = assembler
            .front_chunk()
            .map(|chunk| (encode_chunk(chunk), chunk.len()))
        else {
            break;
        };

        let append = match serde_json::to_string(&ClientEvent::InputAudioBufferAppend { audio }) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode audio event");
                break;
            }
        };
        if let Err(e) = ws_tx.send(Message::Text(append.into())).await {
            tracing::warn!(error = %e, "socket not ready; keeping audio buffered");
            break;
        }
        assembler.pop_chunk();

        // Commit follows the chunk that crossed the threshold, never
        // precedes it.
        if scheduler.record(len) {
            match serde_json::to_string(&ClientEvent::InputAudioBufferCommit) {
                Ok(json) => {
                    if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                        tracing::warn!(error = %e, "failed to send commit");
                    } else {
                        tracing::debug!("audio commit sent");
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to encode commit event"),
            }
        }
    }
}

/// Parse one server frame and apply the interpreter's actions.
/// Malformed payloads are logged and dropped; they never abort the
/// session.
fn handle_server_text(
    text: &str,
    interpreter: &mut TranscriptInterpreter,
    scheduler: &mut CommitScheduler,
    debounce: &mut DelaySlot,
    clear: &mut DelaySlot,
    sink: &CaptionSinkRef,
) {
    let event: ServerEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed server event");
            return;
        }
    };

    for output in interpreter.handle(&event) {
        match output {
            TranscriptOutput::ScheduleIncremental => debounce.arm(DEBOUNCE_DELAY),
            TranscriptOutput::CancelIncremental => debounce.cancel(),
            TranscriptOutput::EmitFinal(text) => {
                debounce.cancel();
                sink.publish(CaptionUpdate::finalized(text));
            }
            TranscriptOutput::ScheduleClear => clear.arm(FINAL_DISPLAY_TIME),
            TranscriptOutput::ResetCommitCounters => scheduler.reset(),
            TranscriptOutput::ServiceError(err) => {
                tracing::error!(code = %err.code, message = %err.message, "realtime service error");
                sink.report_error(&err.to_string());
            }
        }
    }
}
