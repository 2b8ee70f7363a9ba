// loader.rs — 读取全景源、解析 XMP 并解码图像（可在后台线程运行）

use crate::config::PanoramaSource;
use crate::error::{Result, ViewerError};
use crate::metadata::{resolve_metadata, PanoramaMetadata};
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// A decoded image together with the crop data that places it on the sphere.
#[derive(Debug, Clone)]
pub struct LoadedPanorama {
    pub metadata: PanoramaMetadata,
    pub image: DynamicImage,
}

pub fn read_source(source: &PanoramaSource) -> Result<Vec<u8>> {
    match source {
        PanoramaSource::Path(path) => {
            log::info!("reading panorama {:?}", path);
            Ok(std::fs::read(path)?)
        }
        PanoramaSource::Bytes(bytes) => Ok(bytes.clone()),
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ViewerError::Io)?;
    reader.no_limits();
    reader.decode().map_err(ViewerError::ImageDecode)
}

/// Metadata is read from the raw bytes before decoding, so both come from
/// the same fetch.
pub fn load_panorama(source: &PanoramaSource, use_metadata: bool) -> Result<LoadedPanorama> {
    let bytes = read_source(source)?;
    let image = decode_image(&bytes)?;
    let (w, h) = image.dimensions();
    log::info!("panorama decoded: {}x{}", w, h);

    let metadata = resolve_metadata(&bytes, use_metadata, w, h);
    Ok(LoadedPanorama { metadata, image })
}

type Tagged = (u64, Result<LoadedPanorama>);

/// Runs [`load_panorama`] on worker threads. Every request gets a new
/// generation; results from older requests are dropped when they arrive.
#[derive(Debug)]
pub struct BackgroundLoader {
    generation: u64,
    pending: bool,
    tx: Sender<Tagged>,
    rx: Receiver<Tagged>,
}

impl Default for BackgroundLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            generation: 0,
            pending: false,
            tx,
            rx,
        }
    }

    /// Starts loading `source`, superseding any load still in flight.
    pub fn start(&mut self, source: PanoramaSource, use_metadata: bool) {
        self.generation += 1;
        self.pending = true;
        let (generation, tx) = (self.generation, self.tx.clone());
        thread::spawn(move || {
            let result = load_panorama(&source, use_metadata);
            if tx.send((generation, result)).is_err() {
                log::error!("viewer went away before the panorama finished loading");
            }
        });
    }

    /// True until the newest request has reported back.
    pub fn is_loading(&self) -> bool {
        self.pending
    }

    /// Outcome of the newest request, once it is there.
    pub fn poll(&mut self) -> Option<Result<LoadedPanorama>> {
        while let Ok((generation, result)) = self.rx.try_recv() {
            if generation == self.generation {
                self.pending = false;
                return Some(result);
            }
            log::debug!("dropping result of superseded load #{}", generation);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::time::{Duration, Instant};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])))
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn loads_in_memory_image_with_fallback_metadata() {
        let loaded = load_panorama(&PanoramaSource::Bytes(png_bytes(30, 15)), true).unwrap();
        assert_eq!(loaded.metadata, PanoramaMetadata::from_image_dimensions(30, 15));
        assert_eq!(loaded.image.dimensions(), (30, 15));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = load_panorama(&PanoramaSource::Bytes(b"definitely not an image".to_vec()), true).unwrap_err();
        assert!(matches!(err, ViewerError::ImageDecode(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let src = PanoramaSource::Path("/nonexistent/panorama.jpg".into());
        assert!(matches!(load_panorama(&src, true), Err(ViewerError::Io(_))));
    }

    fn wait(loader: &mut BackgroundLoader) -> Result<LoadedPanorama> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = loader.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "background load never finished");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn background_load_reports_back() {
        let mut loader = BackgroundLoader::new();
        assert!(!loader.is_loading());
        loader.start(PanoramaSource::Bytes(png_bytes(4, 2)), false);
        assert!(loader.is_loading());
        let loaded = wait(&mut loader).unwrap();
        assert_eq!(loaded.metadata.full_width, 4);
        assert!(!loader.is_loading());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn superseded_load_is_dropped() {
        let mut loader = BackgroundLoader::new();
        loader.start(PanoramaSource::Path("/nonexistent/first.jpg".into()), true);
        loader.start(PanoramaSource::Bytes(png_bytes(8, 4)), true);

        let loaded = wait(&mut loader).unwrap();
        assert_eq!(loaded.metadata.full_width, 8);
        assert!(!loader.is_loading());

        // the failed first request may still be arriving
        thread::sleep(Duration::from_millis(50));
        assert!(loader.poll().is_none());
    }
}
