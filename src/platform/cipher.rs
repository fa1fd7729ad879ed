//! Signature deciphering and n-parameter rewriting of format URLs

use crate::core::format::{CipherArgs, ExtractedFunctions, MediaFormat, PlayerScript};
use crate::error::SigError;
use crate::platform::client::{FetchOptions, PlayerClient, ScriptFetcher};
use crate::platform::engine::{DenoEngine, ScriptEngine};
use crate::platform::extractor::{extract_functions, NCODE_VAR, SIGNATURE_VAR};
use crate::utils::cache::ScriptCache;
use crate::utils::url::{
    decode_component, decode_encoded_url, get_query_param, parse_url, set_query_param,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cipher behaviour settings
#[derive(Debug, Clone)]
pub struct CipherConfig {
    /// Abort a batch on the first format that fails to rewrite
    pub stop_on_error: bool,
    /// Maximum number of player scripts kept in the cache
    pub cache_capacity: Option<u64>,
    /// Options handed to the fetcher for every player request
    pub fetch_options: FetchOptions,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            cache_capacity: None,
            fetch_options: FetchOptions::default(),
        }
    }
}

/// Resolves player fragments and rewrites format URLs with them
pub struct Cipher {
    fetcher: Arc<dyn ScriptFetcher>,
    engine: Arc<dyn ScriptEngine>,
    cache: ScriptCache<Arc<ExtractedFunctions>>,
    shared_cache: bool,
    config: CipherConfig,
}

impl Cipher {
    /// Create a cipher using the HTTP player client and the V8 engine
    pub fn new() -> Result<Self, SigError> {
        Ok(Self::with_parts(
            Arc::new(PlayerClient::new()?),
            Arc::new(DenoEngine::new()),
        ))
    }

    /// Create a cipher from explicit collaborators
    pub fn with_parts(fetcher: Arc<dyn ScriptFetcher>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            fetcher,
            engine,
            cache: ScriptCache::new(),
            shared_cache: false,
            config: CipherConfig::default(),
        }
    }

    /// Apply configuration.
    ///
    /// A capacity setting replaces the private cache; a cache installed with
    /// [`Cipher::with_cache`] is kept regardless of call order.
    pub fn with_config(mut self, config: CipherConfig) -> Self {
        if let (Some(capacity), false) = (config.cache_capacity, self.shared_cache) {
            self.cache = ScriptCache::with_capacity(capacity);
        }
        self.config = config;
        self
    }

    /// Share a fragment cache between several ciphers
    pub fn with_cache(mut self, cache: ScriptCache<Arc<ExtractedFunctions>>) -> Self {
        self.cache = cache;
        self.shared_cache = true;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.config.fetch_options = options;
        self
    }

    pub fn config(&self) -> &CipherConfig {
        &self.config
    }

    pub fn cache(&self) -> &ScriptCache<Arc<ExtractedFunctions>> {
        &self.cache
    }

    /// Fragments for a player script, fetched and extracted at most once per
    /// URL. Concurrent callers for the same URL share one fetch.
    pub async fn get_functions(&self, player_url: &str) -> Result<Arc<ExtractedFunctions>, SigError> {
        debug!("Resolving player functions for {}", player_url);

        self.cache
            .get_or_try_insert_with(player_url, async {
                info!("Fetching player script {}", player_url);
                let text = self
                    .fetcher
                    .fetch_text(player_url, &self.config.fetch_options)
                    .await?;
                let script = PlayerScript::new(player_url, text);

                let functions = extract_functions(&script.text);
                if functions.is_empty() {
                    warn!("No functions found in player script {}", script.id);
                    return Err(SigError::ExtractionFailed(script.id));
                }

                info!(
                    "Extracted {} function(s) from {}",
                    functions.len(),
                    script.id
                );
                Ok::<_, SigError>(Arc::new(functions))
            })
            .await
            .map_err(SigError::from_shared)
    }

    /// Store already extracted fragments for a player script
    pub async fn prime(&self, player_url: &str, functions: ExtractedFunctions) {
        self.cache.set(player_url, Arc::new(functions)).await;
    }

    /// Number of player scripts with cached fragments
    pub async fn cached_scripts(&self) -> u64 {
        self.cache.len().await
    }

    /// Rewrite one format in place using already resolved fragments
    pub fn set_download_url(
        &self,
        format: &mut MediaFormat,
        functions: &ExtractedFunctions,
    ) -> Result<(), SigError> {
        set_download_url(
            format,
            functions.decipher.as_deref(),
            functions.n_transform.as_deref(),
            self.engine.as_ref(),
        )
    }

    /// Rewrite every format and index the results by final URL.
    ///
    /// Formats are processed in order; when two resolve to the same URL the
    /// later one wins. With `stop_on_error` unset, formats that fail are left
    /// untouched and omitted from the result.
    pub async fn decipher_formats(
        &self,
        formats: &mut [MediaFormat],
        player_url: &str,
    ) -> Result<HashMap<String, MediaFormat>, SigError> {
        let functions = self.get_functions(player_url).await?;
        let mut deciphered = HashMap::with_capacity(formats.len());

        for format in formats.iter_mut() {
            match self.set_download_url(format, &functions) {
                Ok(()) => {
                    if let Some(url) = &format.url {
                        deciphered.insert(url.clone(), format.clone());
                    }
                }
                Err(e) if !self.config.stop_on_error => {
                    warn!("Skipping format itag={:?}: {}", format.itag(), e);
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "Deciphered {} of {} format(s)",
            deciphered.len(),
            formats.len()
        );
        Ok(deciphered)
    }
}

/// Produce the final URL of `format` and store it in place.
///
/// A direct URL only goes through the n-transform; a cipher string is
/// deciphered first and the result then goes through the n-transform. An
/// empty `url` counts as absent. On success the cipher fields are removed.
/// On error `format` is unchanged.
pub fn set_download_url(
    format: &mut MediaFormat,
    decipher: Option<&str>,
    n_transform: Option<&str>,
    engine: &dyn ScriptEngine,
) -> Result<(), SigError> {
    let direct = format.url.as_deref().filter(|url| !url.is_empty());
    let url = match (direct, format.cipher_string()) {
        (Some(url), _) => {
            debug!("Format itag={:?} has a direct URL", format.itag());
            ncode_url(url, n_transform, engine)?
        }
        (None, Some(cipher)) => {
            debug!("Format itag={:?} is ciphered", format.itag());
            let deciphered = decipher_url(cipher, decipher, engine)?;
            ncode_url(&deciphered, n_transform, engine)?
        }
        (None, None) => return Err(SigError::MissingUrl),
    };

    format.url = Some(url);
    format.signature_cipher = None;
    format.cipher = None;
    Ok(())
}

/// Rebuild the media URL carried by a cipher string with its signature
/// deciphered. Without a signature or a decipher fragment the carried URL is
/// returned as is.
pub fn decipher_url(
    cipher: &str,
    decipher: Option<&str>,
    engine: &dyn ScriptEngine,
) -> Result<String, SigError> {
    let args = CipherArgs::parse(cipher)?;
    let (Some(signature), Some(code)) = (args.s.as_deref(), decipher) else {
        return Ok(args.url);
    };

    let signature = decode_component(signature)?;
    let mut components = parse_url(&decode_encoded_url(&args.url)?)?;
    let deciphered = engine.execute(code, &[(SIGNATURE_VAR, signature.as_str())])?;
    set_query_param(&mut components, args.signature_param(), &deciphered);
    Ok(components.into())
}

/// Replace the `n` query parameter with its transformed value. Without a
/// non-empty `n` parameter or an n-transform fragment the URL is returned
/// unchanged.
pub fn ncode_url(
    url: &str,
    n_transform: Option<&str>,
    engine: &dyn ScriptEngine,
) -> Result<String, SigError> {
    let Some(code) = n_transform else {
        return Ok(url.to_string());
    };

    let mut components = parse_url(&decode_encoded_url(url)?)?;
    let Some(n) = get_query_param(&components, "n").filter(|n| !n.is_empty()) else {
        return Ok(url.to_string());
    };

    let transformed = engine.execute(code, &[(NCODE_VAR, n.as_str())])?;
    set_query_param(&mut components, "n", &transformed);
    Ok(components.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::extractor::tests::{SAMPLE_DECIPHER, SAMPLE_N_TRANSFORM, SAMPLE_PLAYER};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Reverses signatures and maps every `n` to "NN", recording calls
    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<String>>,
    }

    impl ScriptEngine for FakeEngine {
        fn execute(&self, _source: &str, bindings: &[(&str, &str)]) -> Result<String, SigError> {
            let (name, value) = bindings[0];
            self.calls.lock().unwrap().push(name.to_string());
            match name {
                "sig" => Ok(value.chars().rev().collect()),
                "ncode" => Ok("NN".to_string()),
                other => Err(SigError::FragmentExecution(format!("unexpected {}", other))),
            }
        }
    }

    struct FailingEngine;

    impl ScriptEngine for FailingEngine {
        fn execute(&self, _source: &str, _bindings: &[(&str, &str)]) -> Result<String, SigError> {
            Err(SigError::FragmentExecution("TypeError: boom".to_string()))
        }
    }

    struct StaticFetcher {
        body: String,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScriptFetcher for StaticFetcher {
        async fn fetch_text(&self, _url: &str, _options: &FetchOptions) -> Result<String, SigError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.body.clone())
        }
    }

    const PLAYER_URL: &str = "https://www.youtube.com/s/player/0123abcd/player_ias.vflset/en_US/base.js";

    fn fake_cipher(fetcher: Arc<StaticFetcher>) -> Cipher {
        Cipher::with_parts(fetcher, Arc::new(FakeEngine::default()))
    }

    #[test]
    fn test_direct_url_without_n_is_untouched() {
        let engine = FakeEngine::default();
        let url = "https://x/y?itag=18&mime=video%2Fmp4&x=a+b";
        let mut format = MediaFormat::with_url(url);

        set_download_url(&mut format, Some("dec"), Some("nt"), &engine).unwrap();

        assert_eq!(format.url.as_deref(), Some(url));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_direct_url_gets_n_transform_only() {
        let engine = FakeEngine::default();
        let mut format = MediaFormat::with_url("https://x/y?n=abc&itag=18");

        set_download_url(&mut format, Some("dec"), Some("nt"), &engine).unwrap();

        assert_eq!(format.url.as_deref(), Some("https://x/y?n=NN&itag=18"));
        assert_eq!(*engine.calls.lock().unwrap(), vec!["ncode"]);
    }

    #[test]
    fn test_cipher_deciphers_then_transforms() {
        let engine = FakeEngine::default();
        let mut format =
            MediaFormat::with_signature_cipher("s=XYZ&url=https%3A%2F%2Fx%2Fy%3Fn%3Dabc&sp=sig");

        set_download_url(&mut format, Some("dec"), Some("nt"), &engine).unwrap();

        assert_eq!(format.url.as_deref(), Some("https://x/y?n=NN&sig=ZYX"));
        assert_eq!(format.signature_cipher, None);
        assert_eq!(*engine.calls.lock().unwrap(), vec!["sig", "ncode"]);
    }

    #[test]
    fn test_legacy_cipher_field_and_default_param() {
        let engine = FakeEngine::default();
        let mut format = MediaFormat {
            cipher: Some("s=ABC&url=https%3A%2F%2Fx%2Fy".to_string()),
            ..Default::default()
        };

        set_download_url(&mut format, Some("dec"), None, &engine).unwrap();

        assert_eq!(format.url.as_deref(), Some("https://x/y?signature=CBA"));
        assert_eq!(format.cipher, None);
    }

    #[test]
    fn test_missing_n_transform_leaves_n() {
        let engine = FakeEngine::default();
        let url = "https://x/y?n=abc";
        assert_eq!(ncode_url(url, None, &engine).unwrap(), url);
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_decipher_pass_through() {
        let engine = FakeEngine::default();
        assert_eq!(
            decipher_url("url=https%3A%2F%2Fx%2Fy&sp=sig", Some("dec"), &engine).unwrap(),
            "https://x/y"
        );
        assert_eq!(
            decipher_url("s=XYZ&url=https%3A%2F%2Fx%2Fy", None, &engine).unwrap(),
            "https://x/y"
        );
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_n_is_untouched() {
        let engine = FakeEngine::default();
        let url = "https://x/y?n=&itag=18";
        assert_eq!(ncode_url(url, Some("nt"), &engine).unwrap(), url);
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_signature_is_uri_decoded_before_binding() {
        let engine = FakeEngine::default();
        // form decoding leaves "ab%41"; the bound value is "abA"
        let url = decipher_url("s=ab%2541&sp=sig&url=https%3A%2F%2Fx%2Fy", Some("dec"), &engine)
            .unwrap();
        assert_eq!(url, "https://x/y?sig=Aba");
    }

    #[test]
    fn test_malformed_signature_encoding_is_rejected() {
        let engine = FakeEngine::default();
        let err = decipher_url("s=%25FF&url=https%3A%2F%2Fx%2Fy", Some("dec"), &engine).unwrap_err();
        assert!(matches!(err, SigError::InvalidUrl(_)));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_url_falls_back_to_cipher() {
        let engine = FakeEngine::default();
        let mut format = MediaFormat {
            url: Some(String::new()),
            signature_cipher: Some("s=XYZ&url=https%3A%2F%2Fx%2Fy&sp=sig".to_string()),
            ..Default::default()
        };

        set_download_url(&mut format, Some("dec"), None, &engine).unwrap();
        assert_eq!(format.url.as_deref(), Some("https://x/y?sig=ZYX"));
        assert_eq!(format.signature_cipher, None);

        let mut empty = MediaFormat::with_url("");
        let err = set_download_url(&mut empty, Some("dec"), None, &engine).unwrap_err();
        assert!(matches!(err, SigError::MissingUrl));
        assert_eq!(empty.url.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_url_fails_without_mutation() {
        let engine = FakeEngine::default();
        let mut format = MediaFormat::default();
        let err = set_download_url(&mut format, Some("dec"), Some("nt"), &engine).unwrap_err();
        assert!(matches!(err, SigError::MissingUrl));
        assert_eq!(format, MediaFormat::default());
    }

    #[test]
    fn test_execution_error_leaves_format_untouched() {
        let cipher_string = "s=XYZ&url=https%3A%2F%2Fx%2Fy";
        let mut format = MediaFormat::with_signature_cipher(cipher_string);

        let err = set_download_url(&mut format, Some("dec"), None, &FailingEngine).unwrap_err();

        assert!(err.is_execution_failure());
        assert_eq!(format.url, None);
        assert_eq!(format.signature_cipher.as_deref(), Some(cipher_string));
    }

    #[tokio::test]
    async fn test_get_functions_caches_per_player() {
        let fetcher = Arc::new(StaticFetcher::new(SAMPLE_PLAYER));
        let cipher = fake_cipher(fetcher.clone());

        let first = cipher.get_functions(PLAYER_URL).await.unwrap();
        let second = cipher.get_functions(PLAYER_URL).await.unwrap();

        assert_eq!(first.decipher.as_deref(), Some(SAMPLE_DECIPHER));
        assert_eq!(first.n_transform.as_deref(), Some(SAMPLE_N_TRANSFORM));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cipher.cached_scripts().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_fetch_once() {
        let fetcher = Arc::new(StaticFetcher {
            delay: Duration::from_millis(50),
            ..StaticFetcher::new(SAMPLE_PLAYER)
        });
        let cipher = Arc::new(fake_cipher(fetcher.clone()));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let cipher = cipher.clone();
            handles.push(tokio::spawn(async move {
                cipher.get_functions(PLAYER_URL).await.map(|f| f.len())
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_not_cached() {
        let fetcher = Arc::new(StaticFetcher::new("var nothing=function(a){return a};"));
        let cipher = fake_cipher(fetcher.clone());

        let err = cipher.get_functions(PLAYER_URL).await.unwrap_err();
        assert!(err.is_extraction_failure());
        assert!(err.to_string().contains("Could not extract functions"));

        let mut formats = vec![MediaFormat::with_url("https://x/y")];
        let err = cipher.decipher_formats(&mut formats, PLAYER_URL).await.unwrap_err();
        assert!(err.is_extraction_failure());

        assert_eq!(cipher.cached_scripts().await, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_primed_functions_skip_fetch() {
        let fetcher = Arc::new(StaticFetcher::new(""));
        let cipher = fake_cipher(fetcher.clone());
        cipher
            .prime(
                PLAYER_URL,
                ExtractedFunctions {
                    decipher: None,
                    n_transform: Some("nt".to_string()),
                },
            )
            .await;

        let mut formats = vec![MediaFormat::with_url("https://x/y?n=abc")];
        let result = cipher.decipher_formats(&mut formats, PLAYER_URL).await.unwrap();

        assert!(result.contains_key("https://x/y?n=NN"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_cache_survives_capacity_setting() {
        let shared: ScriptCache<Arc<ExtractedFunctions>> = ScriptCache::new();
        let cipher = fake_cipher(Arc::new(StaticFetcher::new(SAMPLE_PLAYER)))
            .with_cache(shared.clone())
            .with_config(CipherConfig {
                cache_capacity: Some(4),
                ..Default::default()
            });

        cipher.get_functions(PLAYER_URL).await.unwrap();
        assert!(shared.contains(PLAYER_URL));

        let private = fake_cipher(Arc::new(StaticFetcher::new(SAMPLE_PLAYER))).with_config(
            CipherConfig {
                cache_capacity: Some(4),
                ..Default::default()
            },
        );
        private.get_functions(PLAYER_URL).await.unwrap();
        assert_eq!(private.cached_scripts().await, 1);
    }

    #[tokio::test]
    async fn test_batch_collision_keeps_later_format() {
        let cipher = fake_cipher(Arc::new(StaticFetcher::new(SAMPLE_PLAYER)));

        let mut first = MediaFormat::with_url("https://x/y");
        first.extra.insert("itag".to_string(), json!(18));
        let mut second = MediaFormat::with_url("https://x/y");
        second.extra.insert("itag".to_string(), json!(22));
        let mut formats = vec![first, second];

        let result = cipher.decipher_formats(&mut formats, PLAYER_URL).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result["https://x/y"].itag(), Some(22));
    }

    #[tokio::test]
    async fn test_batch_rewrites_in_place() {
        let cipher = fake_cipher(Arc::new(StaticFetcher::new(SAMPLE_PLAYER)));
        let mut formats = vec![
            MediaFormat::with_signature_cipher("s=XYZ&url=https%3A%2F%2Fx%2Fa%3Fn%3D1&sp=sig"),
            MediaFormat::with_url("https://x/b"),
        ];

        let result = cipher.decipher_formats(&mut formats, PLAYER_URL).await.unwrap();

        assert_eq!(formats[0].url.as_deref(), Some("https://x/a?n=NN&sig=ZYX"));
        assert_eq!(formats[0].signature_cipher, None);
        assert_eq!(formats[1].url.as_deref(), Some("https://x/b"));
        assert_eq!(result.len(), 2);
        assert_eq!(result["https://x/a?n=NN&sig=ZYX"], formats[0]);
    }

    #[tokio::test]
    async fn test_batch_strict_and_lenient_modes() {
        let formats = || vec![MediaFormat::default(), MediaFormat::with_url("https://x/ok")];

        let strict = fake_cipher(Arc::new(StaticFetcher::new(SAMPLE_PLAYER)));
        let err = strict
            .decipher_formats(&mut formats(), PLAYER_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, SigError::MissingUrl));

        let lenient = fake_cipher(Arc::new(StaticFetcher::new(SAMPLE_PLAYER))).with_config(
            CipherConfig {
                stop_on_error: false,
                ..Default::default()
            },
        );
        let mut batch = formats();
        let result = lenient.decipher_formats(&mut batch, PLAYER_URL).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("https://x/ok"));
        assert_eq!(batch[0], MediaFormat::default());
    }

    #[tokio::test]
    async fn test_end_to_end_with_v8() {
        let cipher = Cipher::with_parts(
            Arc::new(StaticFetcher::new(SAMPLE_PLAYER)),
            Arc::new(DenoEngine::new()),
        );
        let mut formats = vec![MediaFormat::with_signature_cipher(
            "s=abcdef&sp=sig&url=https%3A%2F%2Fmedia.example%2Fvideoplayback%3Fitag%3D18%26n%3Dabc",
        )];

        let result = cipher.decipher_formats(&mut formats, PLAYER_URL).await.unwrap();

        let expected = "https://media.example/videoplayback?itag=18&n=cba_2&sig=edfba";
        assert_eq!(formats[0].url.as_deref(), Some(expected));
        assert!(result.contains_key(expected));
    }
}
