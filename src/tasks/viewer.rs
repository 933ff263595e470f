//! Terminal renderers. Each photo is announced on the output and held until
//! its display interval ends, a key arrives, or shutdown is requested.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{DisplayMode, Rotation};
use crate::events::NavigationEvent;
use crate::meta::{PhotoMeta, read_photo_meta};

#[async_trait]
pub trait Renderer: Send {
    /// Show `path` for at most `interval`. Returns `Next` when the interval
    /// runs out, the key's event when one arrives first, and `Exit` on
    /// shutdown.
    async fn display(
        &mut self,
        path: &Path,
        interval: Duration,
        rotation: Rotation,
    ) -> Result<NavigationEvent>;

    /// Nothing to show; wait up to `wait` while still accepting keys.
    async fn idle(&mut self, message: &str, wait: Duration) -> Result<NavigationEvent>;
}

/// Pick the renderer for `mode`.
pub fn renderer_for(
    mode: DisplayMode,
    out: Box<dyn Write + Send>,
    keys: Receiver<NavigationEvent>,
    cancel: CancellationToken,
) -> Box<dyn Renderer> {
    let screen = Screen::new(out, keys, cancel);
    match mode {
        DisplayMode::Simple => Box::new(SimpleRenderer { screen }),
        DisplayMode::Captioned => Box::new(CaptionedRenderer { screen }),
    }
}

/// Output sink plus the key and shutdown inputs shared by both renderers.
struct Screen {
    out: Box<dyn Write + Send>,
    keys: Receiver<NavigationEvent>,
    keys_open: bool,
    cancel: CancellationToken,
}

impl Screen {
    fn new(
        out: Box<dyn Write + Send>,
        keys: Receiver<NavigationEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            out,
            keys,
            keys_open: true,
            cancel,
        }
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}").context("failed to write to display")?;
        self.out.flush().context("failed to flush display")
    }

    /// Hold until the first key, the deadline, or cancellation.
    async fn hold(&mut self, wait: Duration) -> NavigationEvent {
        let deadline = Instant::now() + wait;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return NavigationEvent::Exit,
                key = self.keys.recv(), if self.keys_open => match key {
                    Some(event) => return event,
                    None => self.keys_open = false,
                },
                _ = tokio::time::sleep_until(deadline) => return NavigationEvent::Next,
            }
        }
    }
}

fn describe(meta: &PhotoMeta, rotation: Rotation) -> String {
    let mut line = format!(
        "{} ({}x{})",
        meta.path.display(),
        meta.display_w,
        meta.display_h
    );
    if rotation != Rotation::Deg0 {
        line.push_str(&format!(" rotated {}°", rotation.degrees()));
    }
    line
}

/// Path and displayed size only.
pub struct SimpleRenderer {
    screen: Screen,
}

#[async_trait]
impl Renderer for SimpleRenderer {
    async fn display(
        &mut self,
        path: &Path,
        interval: Duration,
        rotation: Rotation,
    ) -> Result<NavigationEvent> {
        let meta = read_photo_meta(path, rotation)?;
        self.screen.write_line(&describe(&meta, rotation))?;
        Ok(self.screen.hold(interval).await)
    }

    async fn idle(&mut self, message: &str, wait: Duration) -> Result<NavigationEvent> {
        self.screen.write_line(message)?;
        Ok(self.screen.hold(wait).await)
    }
}

/// Path and size followed by a caption from EXIF or the file name.
pub struct CaptionedRenderer {
    screen: Screen,
}

#[async_trait]
impl Renderer for CaptionedRenderer {
    async fn display(
        &mut self,
        path: &Path,
        interval: Duration,
        rotation: Rotation,
    ) -> Result<NavigationEvent> {
        let meta = read_photo_meta(path, rotation)?;
        self.screen.write_line(&describe(&meta, rotation))?;
        self.screen.write_line(&format!("  {}", meta.caption()))?;
        Ok(self.screen.hold(interval).await)
    }

    async fn idle(&mut self, message: &str, wait: Duration) -> Result<NavigationEvent> {
        self.screen.write_line(message)?;
        Ok(self.screen.hold(wait).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn photo(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("Lake_07_01-08-2021.png");
        image::RgbaImage::new(4, 3).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn interval_elapsing_means_next() {
        let dir = tempdir().unwrap();
        let path = photo(dir.path());
        let buf = SharedBuf::default();
        let (_tx, rx) = mpsc::channel(4);
        let mut r = renderer_for(
            DisplayMode::Simple,
            Box::new(buf.clone()),
            rx,
            CancellationToken::new(),
        );
        let event = r
            .display(&path, Duration::from_millis(20), Rotation::Deg0)
            .await
            .unwrap();
        assert_eq!(event, NavigationEvent::Next);
        assert!(buf.text().contains("(4x3)"));
    }

    #[tokio::test]
    async fn key_interrupts_display() {
        let dir = tempdir().unwrap();
        let path = photo(dir.path());
        let buf = SharedBuf::default();
        let (tx, rx) = mpsc::channel(4);
        tx.send(NavigationEvent::Back).await.unwrap();
        let mut r = renderer_for(
            DisplayMode::Captioned,
            Box::new(buf.clone()),
            rx,
            CancellationToken::new(),
        );
        let event = r
            .display(&path, Duration::from_secs(3600), Rotation::Deg90)
            .await
            .unwrap();
        assert_eq!(event, NavigationEvent::Back);
        let text = buf.text();
        assert!(text.contains("(3x4) rotated 90°"));
        assert!(text.contains("  Lake"));
    }

    #[tokio::test]
    async fn cancellation_means_exit() {
        let dir = tempdir().unwrap();
        let path = photo(dir.path());
        let (_tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut r = renderer_for(DisplayMode::Simple, Box::new(std::io::sink()), rx, cancel);
        let event = r
            .display(&path, Duration::from_secs(3600), Rotation::Deg0)
            .await
            .unwrap();
        assert_eq!(event, NavigationEvent::Exit);
    }

    #[tokio::test]
    async fn closed_key_channel_waits_out_interval() {
        let (tx, rx) = mpsc::channel(4);
        drop(tx);
        let mut r = renderer_for(
            DisplayMode::Simple,
            Box::new(std::io::sink()),
            rx,
            CancellationToken::new(),
        );
        let event = r.idle("nothing to show", Duration::from_millis(20)).await.unwrap();
        assert_eq!(event, NavigationEvent::Next);
    }

    #[tokio::test]
    async fn undecodable_photo_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"junk").unwrap();
        let (_tx, rx) = mpsc::channel(4);
        let mut r = renderer_for(
            DisplayMode::Captioned,
            Box::new(std::io::sink()),
            rx,
            CancellationToken::new(),
        );
        assert!(
            r.display(&path, Duration::from_secs(1), Rotation::Deg0)
                .await
                .is_err()
        );
    }
}
