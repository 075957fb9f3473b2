use std::{future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;

use super::Dispatcher;
use crate::{
    error::{Error, Result},
    executor::{Executors, Subsystem},
    protocol::{
        media::Library,
        status::{CurrentlyPlaying, PlayState, Seek},
    },
    remote::ControlClient,
    response::AsyncResult,
};

/// Playback control, run on the control loop.
#[derive(Clone)]
pub struct ControlManager {
    dispatcher: Dispatcher,
    client: Arc<dyn ControlClient>,
}

impl ControlManager {
    #[must_use]
    pub fn new(executors: Arc<Executors>, client: Arc<dyn ControlClient>) -> Self {
        Self {
            dispatcher: Dispatcher::new(executors, Subsystem::Control),
            client,
        }
    }

    /// Returns a manager whose operations are cancelled with `token`.
    #[must_use]
    pub fn scoped(&self, token: &CancellationToken) -> Self {
        Self {
            dispatcher: self.dispatcher.scoped(token),
            client: Arc::clone(&self.client),
        }
    }

    fn run<F, Fut, T>(&self, operation: F) -> AsyncResult<T>
    where
        F: FnOnce(Arc<dyn ControlClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let client = Arc::clone(&self.client);
        self.dispatcher.submit(move || operation(client))
    }

    pub fn play_file(&self, path: impl Into<String>) -> AsyncResult<bool> {
        let path = path.into();
        self.run(move |client| async move { client.play_file(&path).await })
    }

    pub fn play_url(&self, url: impl Into<String>) -> AsyncResult<bool> {
        let url = url.into();
        self.run(move |client| async move { client.play_url(&url).await })
    }

    pub fn play_next(&self) -> AsyncResult<bool> {
        self.run(|client| async move { client.play_next().await })
    }

    pub fn play_previous(&self) -> AsyncResult<bool> {
        self.run(|client| async move { client.play_previous().await })
    }

    pub fn pause(&self) -> AsyncResult<bool> {
        self.run(|client| async move { client.pause().await })
    }

    pub fn stop(&self) -> AsyncResult<bool> {
        self.run(|client| async move { client.stop().await })
    }

    /// Toggles muting.
    pub fn mute(&self) -> AsyncResult<bool> {
        self.run(|client| async move { client.mute().await })
    }

    /// Seeks within the current item.
    ///
    /// Out of range requests fail without reaching the media center.
    pub fn seek(&self, seek: Seek) -> AsyncResult<bool> {
        if let Err(e) = seek.validate() {
            return AsyncResult::ready(Err(e));
        }
        self.run(move |client| async move { client.seek(seek).await })
    }

    pub fn set_volume(&self, volume: u8) -> AsyncResult<bool> {
        if volume > 100 {
            return AsyncResult::ready(Err(Error::out_of_range(format!(
                "volume {volume} exceeds 100"
            ))));
        }
        self.run(move |client| async move { client.set_volume(volume).await })
    }

    pub fn volume(&self) -> AsyncResult<u8> {
        self.run(|client| async move { client.volume().await })
    }

    /// Progress through the current item, from 0 to 100.
    pub fn position(&self) -> AsyncResult<u8> {
        self.run(|client| async move { client.position().await })
    }

    pub fn play_state(&self) -> AsyncResult<PlayState> {
        self.run(|client| async move { client.play_state().await })
    }

    pub fn currently_playing(&self) -> AsyncResult<CurrentlyPlaying> {
        self.run(|client| async move { client.currently_playing().await })
    }

    /// Appends a file or folder to the active playlist without starting
    /// playback.
    pub fn queue_path(&self, path: impl Into<String>) -> AsyncResult<bool> {
        let path = path.into();
        self.run(move |client| async move { client.queue_path(&path).await })
    }

    pub fn playlist_id(&self) -> AsyncResult<u8> {
        self.run(|client| async move { client.playlist_id().await })
    }

    pub fn set_playlist_id(&self, id: u8) -> AsyncResult<bool> {
        self.run(move |client| async move { client.set_playlist_id(id).await })
    }

    pub fn update_library(&self, library: Library) -> AsyncResult<bool> {
        self.run(move |client| async move {
            let started = client.update_library(library).await?;
            if started {
                info!("updating {library} library");
            }
            Ok(started)
        })
    }
}
