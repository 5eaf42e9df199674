use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::display::{self, IMAGE_FILE_NAME_KEY};
use crate::embedding::{reduce_dimensions, Embedding, EmbeddingReport};
use crate::encoder::{Encoder, EncoderFactory, ImageFetcher};
use crate::error::{EmbedError, EmbedResult};
use crate::model::ModelName;
use crate::request::{derive_file_name, EmbeddingRequest, ImageSource};

/// Knobs that apply to every request handled by one generator.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Where remote images are saved. `None` saves into the working directory
    /// under the bare file name.
    pub download_dir: Option<PathBuf>,
    /// Truncate each vector to this many components and re-normalize.
    pub dimensions: Option<usize>,
}

/// Turns text and image requests into embeddings and prints them to `out`.
///
/// Each call loads a fresh encoder from the factory; nothing is kept between
/// calls. Model names are plain strings: a name with no matching backend is
/// not an error, the call returns `Ok(None)` and logs a warning.
pub struct EmbeddingGenerator<'a, W: Write> {
    factory: &'a dyn EncoderFactory,
    fetcher: &'a dyn ImageFetcher,
    options: GeneratorOptions,
    out: W,
}

impl<'a, W: Write> EmbeddingGenerator<'a, W> {
    pub fn new(factory: &'a dyn EncoderFactory, fetcher: &'a dyn ImageFetcher, out: W) -> Self {
        Self {
            factory,
            fetcher,
            options: GeneratorOptions::default(),
            out,
        }
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn show_result<T: Serialize + ?Sized>(
        &mut self,
        embedding: &T,
        show: bool,
    ) -> EmbedResult<bool> {
        display::show_result(&mut self.out, embedding, show)
    }

    /// Embed a single text. On success the result holds exactly one vector.
    pub fn create_text_embedding(
        &mut self,
        text: &str,
        model_name: &str,
        show: bool,
    ) -> EmbedResult<Option<Vec<Embedding>>> {
        self.create_text_embeddings(&[text], model_name, show)
    }

    /// Embed several texts with one encoder instance, output in input order.
    pub fn create_text_embeddings(
        &mut self,
        texts: &[&str],
        model_name: &str,
        show: bool,
    ) -> EmbedResult<Option<Vec<Embedding>>> {
        let model = match model_name.parse::<ModelName>() {
            Ok(m) if m.supports_text() => m,
            _ => {
                warn!(model = model_name, "no text backend for model, nothing encoded");
                self.show_result(&None::<Vec<Embedding>>, show)?;
                return Ok(None);
            }
        };

        if texts.is_empty() {
            self.show_result(&Vec::<Embedding>::new(), show)?;
            return Ok(Some(Vec::new()));
        }

        let encoder = self.factory.load(model)?;
        debug!(
            model = %model,
            count = texts.len(),
            dims = encoder.dimensions(),
            "encoding text"
        );
        let vectors: Vec<Embedding> = encoder
            .encode_text(texts)?
            .into_iter()
            .map(|v| self.reduce(v))
            .collect();

        self.show_result(&vectors, show)?;
        Ok(Some(vectors))
    }

    /// Embed one image given either a local path or a remote URL.
    /// The local path wins when both are set; a URL is downloaded first.
    pub fn create_image_embedding(
        &mut self,
        local_image_path: Option<&Path>,
        remote_image_url: Option<&str>,
        model_name: &str,
        show: bool,
    ) -> EmbedResult<Option<Embedding>> {
        let reference = match self.resolve_image(local_image_path, remote_image_url) {
            Err(EmbedError::MissingImage) => {
                display::write_labeled(&mut self.out, IMAGE_FILE_NAME_KEY, &None::<String>)?;
                return Err(EmbedError::MissingImage);
            }
            other => other?,
        };
        self.announce(&reference)?;

        let embedding = match model_name.parse::<ModelName>() {
            Ok(model) => {
                check_decodable(model, &reference)?;
                let encoder = self.factory.load(model)?;
                Some(self.reduce(encoder.encode_image(&reference)?))
            }
            Err(_) => {
                warn!(model = model_name, "no image backend for model, nothing encoded");
                None
            }
        };

        self.show_result(&embedding, show)?;
        Ok(embedding)
    }

    /// Embed several images with one encoder instance. Each source is resolved,
    /// announced and encoded in turn; output is in input order.
    pub fn create_image_embeddings(
        &mut self,
        sources: &[ImageSource],
        model_name: &str,
        show: bool,
    ) -> EmbedResult<Option<Vec<Embedding>>> {
        let model = model_name.parse::<ModelName>().ok();
        if model.is_none() {
            warn!(model = model_name, "no image backend for model, nothing encoded");
        }

        let mut encoder: Option<Box<dyn Encoder>> = None;
        let mut vectors = Vec::with_capacity(sources.len());
        for source in sources {
            let (local, remote) = source.as_options();
            let reference = self.resolve_image(local, remote)?;
            self.announce(&reference)?;

            let Some(model) = model else { continue };
            check_decodable(model, &reference)?;
            if encoder.is_none() {
                encoder = Some(self.factory.load(model)?);
            }
            if let Some(encoder) = &encoder {
                let v = encoder.encode_image(&reference)?;
                vectors.push(self.reduce(v));
            }
        }

        let result = model.map(|_| vectors);
        self.show_result(&result, show)?;
        Ok(result)
    }

    fn announce(&mut self, reference: &Path) -> EmbedResult<()> {
        display::write_labeled(
            &mut self.out,
            IMAGE_FILE_NAME_KEY,
            &reference.display().to_string(),
        )?;
        display::write_status(&mut self.out, "Creating Embedding")
    }

    /// Turn the two optional inputs into a local file reference, downloading
    /// when only a URL is given.
    pub fn resolve_image(
        &mut self,
        local_image_path: Option<&Path>,
        remote_image_url: Option<&str>,
    ) -> EmbedResult<PathBuf> {
        match ImageSource::from_options(local_image_path, remote_image_url) {
            Some(ImageSource::LocalPath { path }) => Ok(path),
            Some(ImageSource::RemoteUrl { url }) => {
                display::write_status(&mut self.out, "Downloading Image")?;
                let file_name = derive_file_name(&url)?;
                let dest = match &self.options.download_dir {
                    Some(dir) => dir.join(&file_name),
                    None => PathBuf::from(&file_name),
                };
                info!(url = %url, dest = %dest.display(), "downloading image");
                self.fetcher.download(&url, &dest)?;
                Ok(dest)
            }
            None => Err(EmbedError::MissingImage),
        }
    }

    /// Run a typed request. Yields one report per produced vector.
    pub fn generate(
        &mut self,
        request: &EmbeddingRequest,
        show: bool,
    ) -> EmbedResult<Vec<EmbeddingReport>> {
        match request {
            EmbeddingRequest::Text { text, model_name } => Ok(self
                .create_text_embedding(text, model_name.as_str(), show)?
                .unwrap_or_default()
                .into_iter()
                .map(|v| EmbeddingReport::new(*model_name, v))
                .collect()),
            EmbeddingRequest::Image { source, model_name } => {
                let (local, remote) = source.as_options();
                Ok(self
                    .create_image_embedding(local, remote, model_name.as_str(), show)?
                    .map(|v| EmbeddingReport::new(*model_name, v))
                    .into_iter()
                    .collect())
            }
        }
    }

    fn reduce(&self, v: Embedding) -> Embedding {
        match self.options.dimensions {
            Some(dims) => reduce_dimensions(v, dims),
            None => v,
        }
    }
}

/// CLIP opens the bitmap before the encoder loads; imgbeddings takes the raw path.
fn check_decodable(model: ModelName, reference: &Path) -> EmbedResult<()> {
    if model == ModelName::ClipVitB32 {
        let (width, height) = image::image_dimensions(reference)?;
        debug!(path = %reference.display(), width, height, "opened image");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeEncoder {
        dims: usize,
    }

    impl Encoder for FakeEncoder {
        fn encode_text(&self, texts: &[&str]) -> EmbedResult<Vec<Embedding>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.5; self.dims];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }

        fn encode_image(&self, _image: &Path) -> EmbedResult<Embedding> {
            Ok(vec![0.25; self.dims])
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        loaded: RefCell<Vec<ModelName>>,
    }

    impl EncoderFactory for FakeFactory {
        fn load(&self, model: ModelName) -> EmbedResult<Box<dyn Encoder>> {
            self.loaded.borrow_mut().push(model);
            Ok(Box::new(FakeEncoder {
                dims: model.dimensions(),
            }))
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        fail: bool,
        calls: RefCell<Vec<(String, PathBuf)>>,
    }

    impl ImageFetcher for FakeFetcher {
        fn download(&self, url: &str, dest: &Path) -> EmbedResult<()> {
            self.calls
                .borrow_mut()
                .push((url.to_string(), dest.to_path_buf()));
            if self.fail {
                return Err(EmbedError::Download(format!("{url}: 404")));
            }
            Ok(())
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::new(4, 4).save(&path).unwrap();
        path
    }

    fn output(gen: EmbeddingGenerator<'_, Vec<u8>>) -> String {
        String::from_utf8(gen.into_output()).unwrap()
    }

    #[test]
    fn test_text_embedding_single_vector() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_text_embedding("hello world", "clip-ViT-B-32", false)
            .unwrap()
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 512);
        assert_eq!(*factory.loaded.borrow(), vec![ModelName::ClipVitB32]);
        assert!(output(gen).is_empty());
    }

    #[test]
    fn test_text_embedding_unknown_model_is_none() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_text_embedding("hello world", "unknown-model", true)
            .unwrap();
        assert!(result.is_none());
        assert!(factory.loaded.borrow().is_empty());

        let text = output(gen);
        assert_eq!(text.matches("\"embedding\"").count(), 1);
        assert!(text.contains("\"embedding\": null"));
    }

    #[test]
    fn test_text_embedding_image_only_model_is_none() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen.create_text_embedding("hi", "imgbeddings", false).unwrap();
        assert!(result.is_none());
        assert!(factory.loaded.borrow().is_empty());
        assert!(output(gen).is_empty());
    }

    #[test]
    fn test_text_unknown_model_silent_when_not_shown() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_text_embedding("hello world", "unknown-model", false)
            .unwrap();
        assert!(result.is_none());
        assert!(output(gen).is_empty());
    }

    #[test]
    fn test_text_batch_preserves_order() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_text_embeddings(&["a", "abc", "ab"], "clip-ViT-B-32", true)
            .unwrap()
            .unwrap();
        let firsts: Vec<f32> = result.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 2.0]);
        assert_eq!(factory.loaded.borrow().len(), 1);
        assert_eq!(output(gen).matches("\"embedding\"").count(), 1);
    }

    #[test]
    fn test_empty_text_batch_loads_nothing() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_text_embeddings(&[], "clip-ViT-B-32", false)
            .unwrap();
        assert_eq!(result, Some(Vec::new()));
        assert!(factory.loaded.borrow().is_empty());
    }

    #[test]
    fn test_remote_image_with_imgbeddings() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_image_embedding(None, Some("https://host/a/b/cat.png"), "imgbeddings", true)
            .unwrap()
            .unwrap();
        assert_eq!(result.len(), 768);

        let calls = fetcher.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://host/a/b/cat.png");
        assert_eq!(calls[0].1, PathBuf::from("cat.png"));
        assert_eq!(*factory.loaded.borrow(), vec![ModelName::Imgbeddings]);

        let text = output(gen);
        let download = text.find("Downloading Image").unwrap();
        let name = text.find("\"Image-File-Name\": \"cat.png\"").unwrap();
        let creating = text.find("Creating Embedding").unwrap();
        let embedding = text.find("\"embedding\"").unwrap();
        assert!(download < name && name < creating && creating < embedding);
        assert_eq!(text.matches("\"embedding\"").count(), 1);
    }

    #[test]
    fn test_local_image_with_clip_never_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let photo = write_png(dir.path(), "photo.png");
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_image_embedding(
                Some(&photo),
                Some("https://host/ignored.png"),
                "clip-ViT-B-32",
                false,
            )
            .unwrap()
            .unwrap();
        assert_eq!(result.len(), 512);
        assert!(fetcher.calls.borrow().is_empty());

        let text = output(gen);
        assert!(text.contains("Image-File-Name"));
        assert!(text.contains("photo.png"));
        assert!(!text.contains("\"embedding\""));
        assert!(!text.contains("Downloading Image"));
    }

    #[test]
    fn test_clip_rejects_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let err = gen
            .create_image_embedding(Some(&bogus), None, "clip-ViT-B-32", true)
            .unwrap_err();
        assert!(matches!(err, EmbedError::ImageDecode(_)));
        assert!(factory.loaded.borrow().is_empty());
    }

    #[test]
    fn test_image_unknown_model_still_prints_file_name() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_image_embedding(Some(Path::new("photo.png")), None, "resnet", true)
            .unwrap();
        assert!(result.is_none());
        assert!(factory.loaded.borrow().is_empty());

        let text = output(gen);
        assert!(text.contains("\"Image-File-Name\": \"photo.png\""));
        assert!(text.contains("Creating Embedding"));
        assert!(text.contains("\"embedding\": null"));
        assert_eq!(text.matches("\"embedding\"").count(), 1);
    }

    #[test]
    fn test_image_unknown_model_silent_when_not_shown() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_image_embedding(Some(Path::new("photo.png")), None, "resnet", false)
            .unwrap();
        assert!(result.is_none());

        let text = output(gen);
        assert!(text.contains("\"Image-File-Name\": \"photo.png\""));
        assert!(!text.contains("\"embedding\""));
    }

    #[test]
    fn test_missing_image_source() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let err = gen
            .create_image_embedding(None, None, "imgbeddings", true)
            .unwrap_err();
        assert!(matches!(err, EmbedError::MissingImage));
        assert!(factory.loaded.borrow().is_empty());

        let text = output(gen);
        assert!(text.contains("\"Image-File-Name\": null"));
        assert!(!text.contains("\"embedding\""));
    }

    #[test]
    fn test_image_batch_loads_once_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_png(dir.path(), "first.png");
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let sources = vec![
            ImageSource::LocalPath { path: first },
            ImageSource::RemoteUrl {
                url: "https://host/a/second.png".into(),
            },
            ImageSource::RemoteUrl {
                url: "https://host/b/third.jpg".into(),
            },
        ];
        let result = gen
            .create_image_embeddings(&sources, "imgbeddings", true)
            .unwrap()
            .unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|v| v.len() == 768));
        assert_eq!(*factory.loaded.borrow(), vec![ModelName::Imgbeddings]);

        let urls: Vec<String> = fetcher.calls.borrow().iter().map(|c| c.0.clone()).collect();
        assert_eq!(urls, vec!["https://host/a/second.png", "https://host/b/third.jpg"]);

        let text = output(gen);
        let first = text.find("first.png").unwrap();
        let second = text.find("\"Image-File-Name\": \"second.png\"").unwrap();
        let third = text.find("\"Image-File-Name\": \"third.jpg\"").unwrap();
        let embedding = text.find("\"embedding\"").unwrap();
        assert!(first < second && second < third && third < embedding);
        assert_eq!(text.matches("Creating Embedding").count(), 3);
        assert_eq!(text.matches("\"embedding\"").count(), 1);
    }

    #[test]
    fn test_empty_image_batch_loads_nothing() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let result = gen
            .create_image_embeddings(&[], "clip-ViT-B-32", false)
            .unwrap();
        assert_eq!(result, Some(Vec::new()));
        assert!(factory.loaded.borrow().is_empty());
    }

    #[test]
    fn test_image_batch_unknown_model_announces_each_image() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let sources = vec![
            ImageSource::LocalPath {
                path: PathBuf::from("a.png"),
            },
            ImageSource::LocalPath {
                path: PathBuf::from("b.png"),
            },
        ];
        let result = gen.create_image_embeddings(&sources, "resnet", true).unwrap();
        assert!(result.is_none());
        assert!(factory.loaded.borrow().is_empty());

        let text = output(gen);
        assert_eq!(text.matches("Image-File-Name").count(), 2);
        assert_eq!(text.matches("\"embedding\"").count(), 1);
        assert!(text.contains("\"embedding\": null"));
    }

    #[test]
    fn test_failed_download_loads_no_encoder() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher {
            fail: true,
            ..Default::default()
        };
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let err = gen
            .create_image_embedding(None, Some("https://host/x/dog.jpg"), "imgbeddings", true)
            .unwrap_err();
        assert!(matches!(err, EmbedError::Download(_)));
        assert!(factory.loaded.borrow().is_empty());
    }

    #[test]
    fn test_download_dir_option() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new()).with_options(
            GeneratorOptions {
                download_dir: Some(PathBuf::from("/tmp/images")),
                dimensions: None,
            },
        );

        let path = gen
            .resolve_image(None, Some("https://host/a/person_right.png"))
            .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/images/person_right.png"));
    }

    #[test]
    fn test_dimensions_option_reduces_vectors() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new()).with_options(
            GeneratorOptions {
                download_dir: None,
                dimensions: Some(64),
            },
        );

        let v = gen
            .create_image_embedding(Some(Path::new("photo.png")), None, "imgbeddings", false)
            .unwrap()
            .unwrap();
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_generate_reports() {
        let factory = FakeFactory::default();
        let fetcher = FakeFetcher::default();
        let mut gen = EmbeddingGenerator::new(&factory, &fetcher, Vec::new());

        let reports = gen
            .generate(
                &EmbeddingRequest::Text {
                    text: "hello".into(),
                    model_name: ModelName::ClipVitB32,
                },
                false,
            )
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].embedding_size, 512);

        let reports = gen
            .generate(
                &EmbeddingRequest::Image {
                    source: ImageSource::RemoteUrl {
                        url: "https://host/a/cat.png".into(),
                    },
                    model_name: ModelName::Imgbeddings,
                },
                false,
            )
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].model_name, ModelName::Imgbeddings);
        assert_eq!(fetcher.calls.borrow().len(), 1);
    }
}
