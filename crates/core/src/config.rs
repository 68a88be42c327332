//! Environment-derived settings
//!
//! All `CTCACHE_*` variables are read once into a [`Settings`] snapshot at
//! startup. Backends receive the nested settings struct for their own section.

use std::path::PathBuf;
use std::time::Duration;

/// Default folder (object key prefix) for object-storage backends.
pub const DEFAULT_OBJECT_FOLDER: &str = "clang-tidy-cache";

/// Default Redis key namespace.
pub const DEFAULT_REDIS_NAMESPACE: &str = "ctcache/";

/// Default REST service port.
pub const DEFAULT_REST_PORT: u16 = 5000;

/// Default Redis port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Name of the hash-input dump file written when dumping is enabled.
pub const DUMP_FILE_NAME: &str = "ctcache.dump";

/// Complete configuration snapshot for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Cache root directory
    pub cache_dir: PathBuf,
    /// Local tier and stats toggles
    pub local: LocalSettings,
    /// REST service backend, if `CTCACHE_HOST` is set
    pub rest: Option<RestSettings>,
    /// Redis backend, if `CTCACHE_REDIS_HOST` is set
    pub redis: Option<RedisSettings>,
    /// S3 backend, if `CTCACHE_S3_BUCKET` is set
    pub s3: Option<ObjectStoreSettings>,
    /// GCS backend, if `CTCACHE_GCS_BUCKET` is set
    pub gcs: Option<ObjectStoreSettings>,
    /// What gets stored for a run
    pub output: OutputSettings,
    /// Inputs to the fingerprint
    pub hashing: HashSettings,
    /// Diagnostics
    pub debug: DebugSettings,
}

/// Local tier configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSettings {
    /// Keep a local tier even when remote backends are configured
    pub force_local: bool,
    /// Skip stats decorators on both tiers
    pub no_stats: bool,
    /// Do not copy remote hits into the local tier
    pub no_writeback: bool,
}

/// REST service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSettings {
    /// Hostname of the cache service
    pub host: String,
    /// Port of the cache service
    pub port: u16,
    /// URL scheme, usually `http` or `https`
    pub proto: String,
    /// Never write to the service
    pub read_only: bool,
}

impl RestSettings {
    /// Base URL without a trailing slash, e.g. `http://cache:5000`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.proto, self.host, self.port)
    }
}

/// Redis configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RedisSettings {
    /// Redis hostname
    pub host: String,
    /// Redis port
    pub port: u16,
    /// Database index
    pub db: i64,
    /// ACL username, empty for none
    pub username: String,
    /// Password, empty for none
    pub password: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read/write timeout per command
    pub operation_timeout: Duration,
    /// Entry TTL; `None` keeps entries forever
    pub cache_ttl: Option<Duration>,
    /// Prefix prepended to every key
    pub namespace: String,
    /// Never write to Redis
    pub read_only: bool,
}

/// Configuration shared by the S3 and GCS backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreSettings {
    /// Bucket name
    pub bucket: String,
    /// Key prefix inside the bucket
    pub folder: String,
    /// Use anonymous access (implies no writes)
    pub no_credentials: bool,
    /// Never write to the bucket
    pub read_only: bool,
    /// Override of the service endpoint (emulators, MinIO)
    pub endpoint: Option<String>,
    /// Explicit OAuth access token (GCS only)
    pub access_token: Option<String>,
}

impl ObjectStoreSettings {
    /// Object key for a digest: `folder/shard/suffix`.
    #[must_use]
    pub fn object_key(&self, digest: &crate::Digest) -> String {
        let folder = self.folder.trim_end_matches('/');
        if folder.is_empty() {
            format!("{}/{}", digest.shard(), digest.suffix())
        } else {
            format!("{folder}/{}/{}", digest.shard(), digest.suffix())
        }
    }

    /// Whether stores must be skipped.
    #[must_use]
    pub const fn writes_disabled(&self) -> bool {
        self.no_credentials || self.read_only
    }
}

/// Output handling configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSettings {
    /// Store exit code and stdout instead of a bare marker
    pub save_output: bool,
    /// Treat non-empty stdout as success
    pub ignore_output: bool,
    /// Store results of failed runs as well
    pub save_all: bool,
}

impl OutputSettings {
    /// Failed runs are only worth storing when their exit code is kept.
    #[must_use]
    pub const fn save_even_without_success(&self) -> bool {
        self.save_all && self.save_output
    }
}

/// Fingerprint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashSettings {
    /// Regexes whose matches are removed from arguments (and optionally sources)
    pub strip_patterns: Vec<String>,
    /// Apply `strip_patterns` to source/preprocessed content too
    pub strip_src: bool,
    /// Chunks matching this regex (anchored at the start) are not hashed
    pub exclude_hash_regex: Option<String>,
    /// Drop user-specific lines from dumped configuration
    pub exclude_user_config: bool,
    /// Preserve comments when preprocessing
    pub keep_comments: bool,
}

/// Diagnostic output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSettings {
    /// Enable debug-level logging
    pub debug: bool,
    /// Log format name (`pretty`, `compact`, `json`)
    pub log_format: Option<String>,
    /// Append all hashed bytes to the dump file
    pub dump: bool,
    /// Directory that receives the dump file
    pub dump_dir: PathBuf,
}

impl DebugSettings {
    /// Full path of the dump file.
    #[must_use]
    pub fn dump_path(&self) -> PathBuf {
        self.dump_dir.join(DUMP_FILE_NAME)
    }
}

impl Settings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let temp_dir = std::env::temp_dir();

        let cache_dir = vars
            .non_empty("CTCACHE_DIR")
            .map_or_else(|| default_cache_dir(&temp_dir, &vars), PathBuf::from);

        let save_output = vars.flag("CTCACHE_SAVE_OUTPUT");

        Self {
            cache_dir,
            local: LocalSettings {
                force_local: vars.flag("CTCACHE_LOCAL"),
                no_stats: vars.flag("CTCACHE_NO_LOCAL_STATS"),
                no_writeback: vars.flag("CTCACHE_NO_LOCAL_WRITEBACK"),
            },
            rest: vars.non_empty("CTCACHE_HOST").map(|host| RestSettings {
                host,
                port: vars.parsed("CTCACHE_PORT").unwrap_or(DEFAULT_REST_PORT),
                proto: vars
                    .non_empty("CTCACHE_PROTO")
                    .unwrap_or_else(|| "http".to_string()),
                read_only: vars.flag("CTCACHE_HOST_READ_ONLY"),
            }),
            redis: vars
                .non_empty("CTCACHE_REDIS_HOST")
                .map(|host| RedisSettings {
                    host,
                    port: vars
                        .parsed("CTCACHE_REDIS_PORT")
                        .unwrap_or(DEFAULT_REDIS_PORT),
                    db: vars.parsed("CTCACHE_REDIS_DB").unwrap_or(0),
                    username: vars.get("CTCACHE_REDIS_USERNAME").unwrap_or_default(),
                    password: vars.get("CTCACHE_REDIS_PASSWORD").unwrap_or_default(),
                    connect_timeout: vars
                        .seconds("CTCACHE_REDIS_CONNECT_TIMEOUT")
                        .unwrap_or(Duration::from_millis(100)),
                    operation_timeout: vars
                        .seconds("CTCACHE_REDIS_OPERATION_TIMEOUT")
                        .unwrap_or(Duration::from_secs(10)),
                    cache_ttl: vars
                        .parsed::<i64>("CTCACHE_REDIS_CACHE_TTL")
                        .and_then(|ttl| u64::try_from(ttl).ok())
                        .filter(|ttl| *ttl > 0)
                        .map(Duration::from_secs),
                    namespace: vars
                        .get("CTCACHE_REDIS_NAMESPACE")
                        .unwrap_or_else(|| DEFAULT_REDIS_NAMESPACE.to_string()),
                    read_only: vars.flag("CTCACHE_REDIS_READ_ONLY"),
                }),
            s3: object_store(&vars, "S3"),
            gcs: object_store(&vars, "GCS"),
            output: OutputSettings {
                save_output,
                ignore_output: save_output || vars.present("CTCACHE_IGNORE_OUTPUT"),
                save_all: save_output || vars.present("CTCACHE_SAVE_ALL"),
            },
            hashing: HashSettings {
                strip_patterns: vars
                    .get("CTCACHE_STRIP")
                    .map(|value| split_path_list(&value))
                    .unwrap_or_default(),
                strip_src: vars.flag("CTCACHE_STRIP_SRC"),
                exclude_hash_regex: vars.non_empty("CTCACHE_EXCLUDE_HASH_REGEX"),
                exclude_user_config: vars.flag("CTCACHE_EXCLUDE_USER_CONFIG"),
                keep_comments: vars.flag("CTCACHE_KEEP_COMMENTS"),
            },
            debug: DebugSettings {
                debug: vars.flag("CTCACHE_DEBUG"),
                log_format: vars.non_empty("CTCACHE_LOG_FORMAT"),
                dump: vars.flag("CTCACHE_DUMP"),
                dump_dir: vars
                    .non_empty("CTCACHE_DUMP_DIR")
                    .map_or(temp_dir, PathBuf::from),
            },
        }
    }

    /// Whether any remote backend is configured.
    #[must_use]
    pub const fn has_remote(&self) -> bool {
        self.rest.is_some() || self.redis.is_some() || self.s3.is_some() || self.gcs.is_some()
    }

    /// Whether a local tier is used.
    #[must_use]
    pub const fn use_local(&self) -> bool {
        !self.has_remote() || self.local.force_local
    }
}

/// Interpret a boolean flag value.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "on"
    )
}

fn object_store(vars: &Vars<'_>, provider: &str) -> Option<ObjectStoreSettings> {
    let key = |name: &str| format!("CTCACHE_{provider}_{name}");
    vars.non_empty(&key("BUCKET"))
        .map(|bucket| ObjectStoreSettings {
            bucket,
            folder: vars
                .get(&key("FOLDER"))
                .unwrap_or_else(|| DEFAULT_OBJECT_FOLDER.to_string()),
            no_credentials: vars.flag(&key("NO_CREDENTIALS")),
            read_only: vars.flag(&key("READ_ONLY")),
            endpoint: vars.non_empty(&key("ENDPOINT")),
            access_token: vars.non_empty(&key("ACCESS_TOKEN")),
        })
}

fn default_cache_dir(temp_dir: &std::path::Path, vars: &Vars<'_>) -> PathBuf {
    let user = vars
        .non_empty("USER")
        .or_else(|| vars.non_empty("USERNAME"))
        .unwrap_or_else(|| "unknown".to_string());
    temp_dir.join(format!("ctcache-{user}"))
}

fn split_path_list(value: &str) -> Vec<String> {
    let separator = if cfg!(windows) { ';' } else { ':' };
    value
        .split(separator)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn present(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| parse_flag(&value))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.non_empty(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(variable = key, value = %raw, "Ignoring unparsable setting");
                None
            }
        }
    }

    fn seconds(&self, key: &str) -> Option<Duration> {
        self.parsed::<f64>(key)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
