use actix_web::http::header;
use actix_web::{web, HttpResponse};
use tokio::sync::mpsc;

use agent_core::{Message, StreamEvent};
use agent_loop::run_streaming;

use crate::logging::Timer;
use crate::state::{AppState, RunGuard};

/// Run the loop in the background and stream its events as SSE frames.
///
/// The history is persisted once the loop ends, whatever the outcome. A
/// client that disconnects closes the event channel, which cancels the run.
pub fn respond(
    state: web::Data<AppState>,
    conversation_id: String,
    history: Vec<Message>,
    run: RunGuard,
) -> HttpResponse {
    log::info!("[{}] Stream started", conversation_id);

    let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(100);

    let state = state.into_inner();
    tokio::spawn(async move {
        let mut history = history;
        let timer = Timer::new("streaming_chat");

        let result = run_streaming(
            &mut history,
            &conversation_id,
            state.llm.clone(),
            state.registry.clone(),
            &state.loop_config,
            event_tx,
            run.token(),
        )
        .await;
        timer.debug(&conversation_id);

        if let Err(e) = &result {
            log::warn!("[{}] Stream ended with error: {}", conversation_id, e);
        }

        if let Err(e) = state
            .storage
            .save_messages(&conversation_id, &history)
            .await
        {
            log::error!("[{}] Failed to save conversation: {}", conversation_id, e);
        }

        drop(run);
    });

    HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/event-stream"))
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header((header::CONNECTION, "keep-alive"))
        .streaming(async_stream::stream! {
            while let Some(event) = event_rx.recv().await {
                let terminal = event.is_terminal();
                yield Ok::<_, actix_web::Error>(web::Bytes::from(event.to_sse_frame()));
                if terminal {
                    break;
                }
            }
        })
}
