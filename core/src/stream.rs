//! Push-stream worker: one socket, one run, one epoch.
//!
//! The worker only reports. It never decides whether to reconnect; every
//! outcome goes back to the view as a `ViewInput` tagged with the epoch the
//! socket was opened under.

use crate::{
    connection::EndCause,
    types::{Epoch, RunId},
    view::ViewInput,
};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message},
};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Connect to `url` and forward every text frame until the socket ends or
/// `stop` fires. A stop closes the socket politely and reports nothing.
pub async fn run_stream(
    url: String,
    run_id: RunId,
    epoch: Epoch,
    inbox: mpsc::UnboundedSender<ViewInput>,
    mut stop: oneshot::Receiver<()>,
) {
    let connect = tokio::select! {
        _ = &mut stop => return,
        result = connect_async(url.as_str()) => result,
    };
    let mut socket = match connect {
        Ok((socket, _response)) => socket,
        Err(err) => {
            log::warn!("run={run_id} stream connect to {url} failed: {err}");
            let _ = inbox.send(ViewInput::StreamEnded {
                run_id,
                epoch,
                cause: EndCause::Error(err.to_string()),
            });
            return;
        }
    };

    log::info!("run={run_id} connected to {url}");
    if inbox
        .send(ViewInput::StreamOpened {
            run_id: run_id.clone(),
            epoch,
        })
        .is_err()
    {
        return;
    }

    let cause = loop {
        let next = tokio::select! {
            _ = &mut stop => {
                log::debug!("run={run_id} closing stream on request");
                let _ = tokio::time::timeout(CLOSE_GRACE, socket.close(None)).await;
                return;
            }
            next = socket.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                let message = ViewInput::StreamMessage {
                    run_id: run_id.clone(),
                    epoch,
                    text,
                };
                if inbox.send(message).is_err() {
                    log::debug!("run={run_id} view gone; dropping stream");
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let clean = frame.as_ref().map_or(true, |f| f.code == CloseCode::Normal);
                log::debug!("run={run_id} close frame {frame:?}");
                break if clean {
                    EndCause::CleanClose
                } else {
                    EndCause::UncleanClose
                };
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                log::warn!("run={run_id} stream read error: {err}");
                break EndCause::Error(err.to_string());
            }
            None => break EndCause::UncleanClose,
        }
    };

    let _ = inbox.send(ViewInput::StreamEnded { run_id, epoch, cause });
}
