use clap::{Args, ValueEnum};
use serde::Deserialize;

use pipeline::{BackoffStrategy, PipelineConfig, UnprocessedPolicy};

use super::error::WriterError;

/// Relative weight of the hot customer when `--hot-weight` is not given.
/// Against nine customers of weight 1.0 this routes 40% of orders to it.
const DEFAULT_HOT_WEIGHT: f64 = 6.0;

// ═══════════════════════════════════════════════════════════════
//  Kinds
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    #[default]
    Trade,
    UserBehavior,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Dynamodb,
    /// In-process table, no AWS access.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffArg {
    Fixed,
    Exponential,
}

impl From<BackoffArg> for BackoffStrategy {
    fn from(arg: BackoffArg) -> Self {
        match arg {
            BackoffArg::Fixed => BackoffStrategy::Fixed,
            BackoffArg::Exponential => BackoffStrategy::Exponential,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub table: Option<String>,
    pub record: Option<RecordKind>,
    pub backend: Option<BackendKind>,
    pub seed: Option<u64>,
    pub hot_weight: Option<f64>,
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub memory: MemorySection,
}

/// `[memory]`: settings of the in-process backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemorySection {
    pub partition_capacity: Option<usize>,
    pub throttle_attribute: Option<String>,
}

pub fn load_config(path: &str) -> Result<Config, WriterError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| WriterError::Config(format!("cannot read config {path}: {e}")))?;
    parse_config(&content).map_err(|e| WriterError::Config(format!("bad config {path}: {e}")))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct GenArgs {
    /// Путь к TOML-конфигу (необязателен)
    #[arg(long, env = "DDB_WRITER_CONFIG")]
    pub config: Option<String>,

    /// Target table name (required for the dynamodb backend)
    #[arg(short = 't', long, env = "DDB_TABLE_NAME")]
    pub table: Option<String>,

    /// Total records to generate [default: 100000]
    #[arg(short = 'n', long)]
    pub total: Option<u64>,

    /// Records per window, at most 2000000 [default: 100]
    #[arg(short = 'r', long)]
    pub rate: Option<u64>,

    /// Concurrent writer tasks [default: 10]
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Record shape to generate
    #[arg(long, value_enum)]
    pub record: Option<RecordKind>,

    /// Storage backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Seed для PRNG (по умолчанию: текущее время)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Items per backend call, 1..=25 [default: 25]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Backend calls per batch before giving up [default: 5]
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Keep retrying unprocessed items until the backend accepts them
    #[arg(long)]
    pub retry_until_clear: bool,

    /// Backoff schedule between retries
    #[arg(long, value_enum)]
    pub backoff: Option<BackoffArg>,

    #[arg(long)]
    pub backoff_base_ms: Option<u64>,

    #[arg(long)]
    pub backoff_multiplier: Option<f64>,

    #[arg(long)]
    pub backoff_max_ms: Option<u64>,

    /// Random spread of each delay, 0.0..=1.0
    #[arg(long)]
    pub jitter: Option<f64>,

    /// Weight of the hot customer (88888) in trade records; others weigh 1.0
    #[arg(long)]
    pub hot_weight: Option<f64>,

    /// Pacing window in milliseconds [default: 1000]
    #[arg(long)]
    pub window_ms: Option<u64>,

    /// Queue slots [default: 2 x rate]
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Custom DynamoDB endpoint (e.g. http://localhost:8000)
    #[arg(long)]
    pub endpoint_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: defaults < config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub table: Option<String>,
    pub record: RecordKind,
    pub backend: BackendKind,
    pub seed: u64,
    pub hot_weight: f64,
    pub endpoint_url: Option<String>,
    pub pipeline: PipelineConfig,
    pub memory: MemorySection,
}

impl Effective {
    pub fn new(args: &GenArgs) -> Result<Self, WriterError> {
        let cfg = match args.config.as_deref() {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        Self::merge(args, cfg)
    }

    pub fn merge(args: &GenArgs, cfg: Config) -> Result<Self, WriterError> {
        let mut pipeline = cfg.pipeline;
        if let Some(v) = args.total {
            pipeline.total = v;
        }
        if let Some(v) = args.rate {
            pipeline.rate = v;
        }
        if let Some(v) = args.workers {
            pipeline.workers = v;
        }
        if let Some(v) = args.batch_size {
            pipeline.batch_size = v;
        }
        if let Some(v) = args.window_ms {
            pipeline.window_ms = v;
        }
        if args.queue_capacity.is_some() {
            pipeline.queue_capacity = args.queue_capacity;
        }

        let retry = &mut pipeline.retry;
        if let Some(v) = args.max_attempts {
            retry.max_attempts = v;
        }
        if args.retry_until_clear {
            retry.unprocessed = UnprocessedPolicy::UntilClear;
        }
        if let Some(v) = args.backoff {
            retry.backoff.strategy = v.into();
        }
        if let Some(v) = args.backoff_base_ms {
            retry.backoff.base_ms = v;
        }
        if let Some(v) = args.backoff_multiplier {
            retry.backoff.multiplier = v;
        }
        if let Some(v) = args.backoff_max_ms {
            retry.backoff.max_ms = v;
        }
        if let Some(v) = args.jitter {
            retry.backoff.jitter = v;
        }

        pipeline.validate()?;

        let eff = Self {
            table: args.table.clone().or(cfg.table).filter(|t| !t.trim().is_empty()),
            record: args.record.or(cfg.record).unwrap_or_default(),
            backend: args.backend.or(cfg.backend).unwrap_or_default(),
            seed: args.seed.or(cfg.seed).unwrap_or_else(|| ingest_api::now_ms() as u64),
            hot_weight: args.hot_weight.or(cfg.hot_weight).unwrap_or(DEFAULT_HOT_WEIGHT),
            endpoint_url: args.endpoint_url.clone().or(cfg.endpoint_url),
            pipeline,
            memory: cfg.memory,
        };

        if eff.backend == BackendKind::Dynamodb && eff.table.is_none() {
            return Err(WriterError::Config(
                "table name is required for the dynamodb backend (-t/--table or DDB_TABLE_NAME)".into(),
            ));
        }
        if !eff.hot_weight.is_finite() || eff.hot_weight < 0.0 {
            return Err(WriterError::Config(format!("--hot-weight {} must be a finite value >= 0", eff.hot_weight)));
        }
        Ok(eff)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: GenArgs,
    }

    fn args(argv: &[&str]) -> GenArgs {
        let mut full = vec!["ddb-writer"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn defaults_with_memory_backend() {
        let eff = Effective::merge(&args(&["--backend", "memory", "--seed", "7"]), Config::default()).unwrap();
        assert_eq!(eff.backend, BackendKind::Memory);
        assert_eq!(eff.record, RecordKind::Trade);
        assert_eq!(eff.seed, 7);
        assert_eq!(eff.pipeline.total, 100_000);
        assert_eq!(eff.pipeline.rate, 100);
        assert_eq!(eff.pipeline.workers, 10);
        assert_eq!(eff.hot_weight, DEFAULT_HOT_WEIGHT);
    }

    #[test]
    fn dynamodb_requires_table() {
        let err = Effective::merge(&args(&[]), Config::default()).unwrap_err();
        assert!(err.to_string().contains("table"), "{err}");

        let eff = Effective::merge(&args(&["-t", "orders"]), Config::default()).unwrap();
        assert_eq!(eff.table.as_deref(), Some("orders"));
    }

    #[test]
    fn cli_overrides_file() {
        let cfg = parse_config(
            r#"
            table = "from-file"
            record = "user-behavior"
            hot_weight = 2.5

            [pipeline]
            total = 500
            rate = 50
            workers = 4

            [pipeline.retry]
            max_attempts = 3
            unprocessed = "until_clear"

            [pipeline.retry.backoff]
            strategy = "fixed"
            base_ms = 10
            "#,
        )
        .unwrap();

        let eff = Effective::merge(&args(&["-r", "200", "--record", "dashboard", "--backoff-base-ms", "20"]), cfg).unwrap();
        assert_eq!(eff.table.as_deref(), Some("from-file"));
        assert_eq!(eff.record, RecordKind::Dashboard);
        assert_eq!(eff.hot_weight, 2.5);
        assert_eq!(eff.pipeline.total, 500);
        assert_eq!(eff.pipeline.rate, 200);
        assert_eq!(eff.pipeline.workers, 4);
        assert_eq!(eff.pipeline.retry.max_attempts, 3);
        assert_eq!(eff.pipeline.retry.unprocessed, UnprocessedPolicy::UntilClear);
        assert_eq!(eff.pipeline.retry.backoff.strategy, BackoffStrategy::Fixed);
        assert_eq!(eff.pipeline.retry.backoff.base_ms, 20);
    }

    #[test]
    fn rate_ceiling_rejected_before_startup() {
        let err = Effective::merge(&args(&["--backend", "memory", "-r", "2000001"]), Config::default()).unwrap_err();
        assert!(matches!(err, WriterError::Pipeline(_)), "{err}");
    }

    #[test]
    fn retry_flags() {
        let eff = Effective::merge(
            &args(&["--backend", "memory", "--retry-until-clear", "--backoff", "fixed", "--max-attempts", "9"]),
            Config::default(),
        )
        .unwrap();
        assert_eq!(eff.pipeline.retry.unprocessed, UnprocessedPolicy::UntilClear);
        assert_eq!(eff.pipeline.retry.backoff.strategy, BackoffStrategy::Fixed);
        assert_eq!(eff.pipeline.retry.max_attempts, 9);
    }

    #[test]
    fn negative_hot_weight_rejected() {
        let err = Effective::merge(&args(&["--backend", "memory", "--hot-weight=-1"]), Config::default()).unwrap_err();
        assert!(matches!(err, WriterError::Config(_)));
    }

    #[test]
    fn memory_section_parsed() {
        let cfg = parse_config("[memory]\npartition_capacity = 3\n").unwrap();
        assert_eq!(cfg.memory.partition_capacity, Some(3));
        assert!(cfg.memory.throttle_attribute.is_none());
    }
}
