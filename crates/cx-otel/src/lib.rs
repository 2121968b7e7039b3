use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target the access-log middleware writes to.
pub const ACCESS_TARGET: &str = "http.access";

static ACCESS_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Minutely,
    Hourly,
    Daily,
}

/// Rolling file sink for access-log lines, enabled by `CX_ACCESS_LOG_ROLL=1`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AccessRoll {
    dir: String,
    prefix: String,
    rotation: Rotation,
}

impl AccessRoll {
    fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("CX_ACCESS_LOG_ROLL").as_deref() != Some("1") {
            return None;
        }
        let dir = lookup("CX_ACCESS_LOG_DIR")
            .or_else(|| lookup("CX_LOGS_DIR"))
            .unwrap_or_else(|| "logs".to_string());
        let prefix = lookup("CX_ACCESS_LOG_PREFIX").unwrap_or_else(|| "http-access".into());
        let rotation = match lookup("CX_ACCESS_LOG_ROTATION")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "hourly" => Rotation::Hourly,
            "minutely" => Rotation::Minutely,
            _ => Rotation::Daily,
        };
        Some(Self {
            dir,
            prefix,
            rotation,
        })
    }
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`) on a
/// console layer, plus the optional access-log file.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(fmt::layer().with_filter(filter));

    let Some(roll) = AccessRoll::from_lookup(|key| std::env::var(key).ok()) else {
        let _ = registry.try_init();
        return;
    };
    if std::fs::create_dir_all(&roll.dir).is_err() {
        tracing::warn!(directory = %roll.dir, "failed to create access log directory");
    }
    let writer = match roll.rotation {
        Rotation::Hourly => tracing_appender::rolling::hourly(&roll.dir, &roll.prefix),
        Rotation::Minutely => tracing_appender::rolling::minutely(&roll.dir, &roll.prefix),
        Rotation::Daily => tracing_appender::rolling::daily(&roll.dir, &roll.prefix),
    };
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let _ = ACCESS_GUARD.set(guard);
    let targets = Targets::new().with_target(ACCESS_TARGET, tracing::Level::INFO);
    let access_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(nb)
        .with_filter(targets);
    let _ = registry.with(access_layer).try_init();
}
